//! Engine benchmarks: cycle search and end-to-end trace throughput.

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use replidb_bench::{contended_trace, ring_graph};
use replidb_core::{Topology, TxId};
use replidb_sim::Simulation;

/// Benchmark the dangerous-structure search on rings of committed
/// transactions.
fn bench_cycle_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("dangerous_cycle");

    for size in [8_u64, 16, 32] {
        let graph = ring_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(graph.has_dangerous_cycle(TxId::new(0))));
        });
    }
    group.finish();
}

/// Benchmark full trace runs over contended replicated keys.
fn bench_trace_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace_run");

    for transactions in [10_u64, 50] {
        let trace = contended_trace(transactions);
        group.throughput(Throughput::Elements(trace.lines().count() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(transactions),
            &trace,
            |b, trace| {
                b.iter(|| {
                    let mut simulation = Simulation::new(Topology::default(), Vec::new());
                    simulation
                        .run(Cursor::new(trace.as_bytes()))
                        .expect("trace runs to completion");
                    black_box(simulation);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_cycle_search, bench_trace_run);
criterion_main!(benches);

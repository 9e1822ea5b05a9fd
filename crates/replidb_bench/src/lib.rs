//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use replidb_core::{ConflictKind, Tick, TransactionGraph, TxId};

/// Builds a ring of `size` committed transactions joined by RW edges,
/// with every second chord labeled WW. Dense enough to make the cycle
/// search do real work without tripping the dangerous-structure check
/// trivially.
#[must_use]
pub fn ring_graph(size: u64) -> TransactionGraph {
    let mut graph = TransactionGraph::new();
    for id in 0..size {
        graph.add_node(TxId::new(id), Tick::new(id as i64));
    }
    for id in 0..size {
        let next = (id + 1) % size;
        let kind = if id % 2 == 0 {
            ConflictKind::Rw
        } else {
            ConflictKind::Ww
        };
        graph
            .add_edge(TxId::new(id), TxId::new(next), kind)
            .expect("ring nodes exist");
    }
    graph
}

/// A conflict-heavy trace: `transactions` writers hammering the same
/// replicated keys with interleaved reads.
#[must_use]
pub fn contended_trace(transactions: u64) -> String {
    let mut script = replidb_testkit::TraceScript::new();
    for tx in 1..=transactions {
        script = script.begin(tx);
    }
    for tx in 1..=transactions {
        script = script
            .read(tx, 2 + (tx % 10) * 2)
            .write(tx, 2 + ((tx + 1) % 10) * 2, tx as i64);
    }
    for tx in 1..=transactions {
        script = script.end(tx);
    }
    script.build()
}

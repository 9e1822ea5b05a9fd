//! Run harness: executes a trace and hands back output plus engine
//! handles.

use std::io::Cursor;
use std::sync::Arc;

use replidb_core::{SiteCoordinator, Topology, TransactionManager};
use replidb_sim::{SimError, Simulation};

/// A completed simulation run.
pub struct SimRun {
    /// Everything the trace wrote to the sink.
    pub output: String,
    /// The cluster state after the run.
    pub coordinator: Arc<SiteCoordinator>,
    /// The transaction state after the run.
    pub manager: TransactionManager,
}

impl SimRun {
    /// The output split into lines.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

/// Runs `trace` against a fresh default cluster.
///
/// # Panics
///
/// Panics if the trace fails to run; use [`run_trace_err`] for traces
/// that are expected to halt.
#[must_use]
pub fn run_trace(trace: &str) -> SimRun {
    let mut simulation = Simulation::new(Topology::default(), Vec::new());
    simulation
        .run(Cursor::new(trace.as_bytes()))
        .expect("trace should run to completion");
    finish(simulation)
}

/// Runs `trace` expecting a halt; returns the output written before the
/// failure and the error.
///
/// # Panics
///
/// Panics if the trace unexpectedly succeeds.
pub fn run_trace_err(trace: &str) -> (SimRun, SimError) {
    let mut simulation = Simulation::new(Topology::default(), Vec::new());
    let err = simulation
        .run(Cursor::new(trace.as_bytes()))
        .expect_err("trace should halt");
    (finish(simulation), err)
}

fn finish(simulation: Simulation<Vec<u8>>) -> SimRun {
    let (coordinator, manager, out) = simulation.into_parts();
    SimRun {
        output: String::from_utf8(out).expect("trace output is UTF-8"),
        coordinator,
        manager,
    }
}

//! # ReplicaDB Testkit
//!
//! Test utilities for ReplicaDB.
//!
//! This crate provides:
//! - A fluent trace-script builder
//! - A run harness returning the rendered output plus live engine
//!   handles for state assertions
//! - Property-based trace generators using proptest, with a seeded
//!   one-shot sampler for smoke coverage

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod generators;
pub mod harness;
pub mod script;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::script::*;
}

pub use generators::{random_trace, trace_strategy, PropTestConfig, TraceOp};
pub use harness::{run_trace, run_trace_err, SimRun};
pub use script::TraceScript;

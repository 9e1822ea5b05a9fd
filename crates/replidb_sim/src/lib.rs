//! # ReplicaDB Simulation Driver
//!
//! The outer shell around the transaction engine:
//! - a tokenizer turning trace lines into typed commands,
//! - the log sink rendering per-operation outcomes,
//! - the tick-driven runner dispatching one command per tick.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod report;
pub mod runner;

mod error;

pub use command::{Command, CommandParser};
pub use error::{SimError, SimResult};
pub use report::TraceWriter;
pub use runner::Simulation;

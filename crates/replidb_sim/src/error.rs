//! Error types for the simulation driver.

use std::io;

use thiserror::Error;

use replidb_core::CoreError;

/// Result type for driver operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that halt a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// A trace line could not be parsed as a command.
    #[error("line {line}: could not parse command {text:?}")]
    Parse {
        /// 1-based line number in the input.
        line: u64,
        /// The offending line.
        text: String,
    },

    /// The engine rejected an operation (unknown transaction, illegal
    /// transition).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reading the trace or writing the log failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

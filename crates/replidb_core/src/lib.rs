//! # ReplicaDB Core
//!
//! Transaction engine for a simulated replicated key-value database.
//!
//! This crate provides:
//! - Per-site multi-version data managers
//! - A site coordinator owning placement, availability, and uptime history
//! - A transaction graph for serializable-snapshot-isolation cycle checks
//! - A transaction manager driving begin/read/write/end and
//!   recovery-driven replay
//!
//! Everything is in memory and tick-driven; one operation executes per
//! logical tick.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod graph;
pub mod site;
pub mod transaction;
pub mod types;

pub use config::Topology;
pub use error::{CoreError, CoreResult};
pub use graph::{ConflictKind, TransactionGraph};
pub use site::{DataManager, SiteCoordinator, SiteWriteStatus, UptimeInterval, UptimeLog};
pub use transaction::{
    AbortReason, AccessKind, EndOutcome, KeyAccess, PendingOp, ReadOutcome, ReplayAction,
    ReplayEvent, SiteWrite, Transaction, TransactionManager, TransactionState, WriteOutcome,
};
pub use types::{CommittedValue, KeyId, SiteId, Tick, TxId};

//! Transactions: per-transaction state and the manager that drives
//! their lifecycle.

mod manager;
mod state;

pub use manager::{ReplayAction, ReplayEvent, TransactionManager};
pub use state::{
    AbortReason, AccessKind, EndOutcome, KeyAccess, PendingOp, ReadOutcome, SiteWrite,
    Transaction, TransactionState, WriteOutcome,
};

//! Error types for the ReplicaDB core.

use thiserror::Error;

use crate::types::{KeyId, SiteId, TxId};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core engine operations.
///
/// Variants split into trace errors (the input referenced something that
/// does not exist) and invariant violations (an internal state
/// transition that must never be requested). Both halt the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An operation referenced a transaction that was never begun.
    #[error("transaction {tx} does not exist")]
    TransactionNotFound {
        /// The unknown transaction.
        tx: TxId,
    },

    /// `begin` was issued twice for the same transaction id.
    #[error("transaction {tx} already exists")]
    TransactionExists {
        /// The duplicated transaction.
        tx: TxId,
    },

    /// An operation referenced a site outside the topology.
    #[error("site {site} does not exist")]
    SiteNotFound {
        /// The unknown site.
        site: SiteId,
    },

    /// A read was attempted against a site that is currently down.
    #[error("site {site} is not active")]
    SiteUnavailable {
        /// The down site.
        site: SiteId,
    },

    /// A site was asked about a key it does not hold.
    #[error("key {key} is not resident at site {site}")]
    KeyNotResident {
        /// The requested key.
        key: KeyId,
        /// The site that does not hold it.
        site: SiteId,
    },

    /// A commit, abort, or wait was requested for a transaction that is
    /// not active.
    #[error("transaction {tx} is not active")]
    TransactionNotActive {
        /// The offending transaction.
        tx: TxId,
    },

    /// A reactivation was requested for a transaction that is not
    /// waiting.
    #[error("transaction {tx} is not waiting")]
    TransactionNotWaiting {
        /// The offending transaction.
        tx: TxId,
    },

    /// A graph edge referenced a transaction not present in the graph.
    #[error("transaction {tx} is not in the graph")]
    NotInGraph {
        /// The missing graph node.
        tx: TxId,
    },
}

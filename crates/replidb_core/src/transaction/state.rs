//! Transaction state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{KeyId, SiteId, Tick, TxId};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The transaction can perform operations.
    Active,
    /// The transaction is blocked on down sites; operations queue up.
    Waiting,
    /// The transaction has been aborted.
    Aborted,
    /// The transaction has been committed.
    Committed,
}

/// Whether a completed key access was a read or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// The transaction read the key.
    Read,
    /// The transaction wrote the key.
    Write,
}

/// One completed access to a key, retained for conflict derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAccess {
    /// Read or write.
    pub kind: AccessKind,
    /// The value read or written.
    pub value: i64,
    /// The tick the access executed at (the recovery tick for replayed
    /// operations).
    pub at: Tick,
}

impl KeyAccess {
    /// A completed read that observed `value`.
    #[must_use]
    pub const fn read(value: i64, at: Tick) -> Self {
        Self {
            kind: AccessKind::Read,
            value,
            at,
        }
    }

    /// A completed write of `value`.
    #[must_use]
    pub const fn write(value: i64, at: Tick) -> Self {
        Self {
            kind: AccessKind::Write,
            value,
            at,
        }
    }
}

/// A write recorded against one candidate site, pending commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteWrite {
    /// The written key.
    pub key: KeyId,
    /// The written value.
    pub value: i64,
    /// The tick the write executed at, used for certification.
    pub written_at: Tick,
}

/// An operation deferred while its transaction waits for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    /// A deferred read.
    Read {
        /// The key to read.
        key: KeyId,
        /// The tick the read was first attempted at.
        queued_at: Tick,
    },
    /// A deferred write.
    Write {
        /// The key to write.
        key: KeyId,
        /// The value to write.
        value: i64,
        /// The tick the write was first attempted at.
        queued_at: Tick,
    },
    /// A deferred commit attempt.
    End {
        /// The tick the end was first attempted at.
        queued_at: Tick,
    },
}

/// Why a transaction aborted at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A written-to site was down between the write and the commit.
    SiteDownSinceWrite {
        /// The failed site.
        site: SiteId,
        /// The written key.
        key: KeyId,
    },
    /// Another transaction committed the key first at this site.
    StaleWrite {
        /// The written key.
        key: KeyId,
        /// The site holding the newer commit.
        site: SiteId,
    },
    /// Committing would close a cycle with two consecutive RW edges.
    DangerousCycle {
        /// The rejected transaction.
        tx: TxId,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SiteDownSinceWrite { site, key } => {
                write!(f, "Site {site} was down between write to {key} and commit")
            }
            Self::StaleWrite { key, site } => {
                write!(f, "Write to {key} was stale at site {site}")
            }
            Self::DangerousCycle { tx } => {
                write!(f, "Tx: {}, RW cycle detected", tx.as_u64())
            }
        }
    }
}

/// Outcome of a read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read succeeded with this value.
    Value(i64),
    /// No site could ever serve the snapshot; the transaction aborted.
    Abort,
    /// Every candidate site is down; the transaction now waits.
    Wait,
    /// The transaction was already waiting; the read was queued.
    Waiting,
    /// The transaction was already aborted.
    AlreadyAborted,
}

impl ReadOutcome {
    /// Whether the read completed with a value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Outcome of a write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was recorded at these sites.
    Applied(Vec<SiteId>),
    /// No site holding the key is up; the transaction now waits.
    Wait,
    /// The transaction was already waiting; the write was queued.
    Waiting,
    /// The transaction was already aborted.
    AlreadyAborted,
}

impl WriteOutcome {
    /// Whether the write was recorded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Outcome of an end (commit attempt) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// All checks passed; writes are applied.
    Committed,
    /// Certification or the cycle check failed.
    Abort(AbortReason),
    /// The transaction was waiting; the end was queued.
    Waiting,
    /// The transaction already finished (aborted or committed).
    NotActive,
}

/// A single transaction's record.
///
/// Tracks, in the order the engine needs them:
/// - every write per candidate site (all are certified and applied),
/// - every completed read/write per key (feeds conflict derivation),
/// - operations deferred while waiting, and the sites whose return
///   could unblock them.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: TxId,
    started_at: Tick,
    state: TransactionState,
    ended_at: Option<Tick>,
    site_writes: BTreeMap<SiteId, Vec<SiteWrite>>,
    completed: BTreeMap<KeyId, Vec<KeyAccess>>,
    pending: Vec<PendingOp>,
    waiting_on: BTreeSet<SiteId>,
}

impl Transaction {
    /// Creates an active transaction started at `started_at`.
    #[must_use]
    pub fn new(id: TxId, started_at: Tick) -> Self {
        Self {
            id,
            started_at,
            state: TransactionState::Active,
            ended_at: None,
            site_writes: BTreeMap::new(),
            completed: BTreeMap::new(),
            pending: Vec::new(),
            waiting_on: BTreeSet::new(),
        }
    }

    /// The transaction id.
    #[must_use]
    pub const fn id(&self) -> TxId {
        self.id
    }

    /// The tick the transaction began at (its snapshot point).
    #[must_use]
    pub const fn started_at(&self) -> Tick {
        self.started_at
    }

    /// The commit tick, once committed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<Tick> {
        self.ended_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether the transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Writes recorded per site, in site order.
    #[must_use]
    pub const fn site_writes(&self) -> &BTreeMap<SiteId, Vec<SiteWrite>> {
        &self.site_writes
    }

    /// Completed accesses per key.
    #[must_use]
    pub const fn completed(&self) -> &BTreeMap<KeyId, Vec<KeyAccess>> {
        &self.completed
    }

    /// Operations deferred while waiting, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[PendingOp] {
        &self.pending
    }

    /// Sites whose recovery could unblock this transaction.
    #[must_use]
    pub const fn waiting_on(&self) -> &BTreeSet<SiteId> {
        &self.waiting_on
    }

    /// Whether this transaction waits on `site`.
    #[must_use]
    pub fn is_waiting_on(&self, site: SiteId) -> bool {
        self.waiting_on.contains(&site)
    }

    pub(crate) fn record_site_write(&mut self, site: SiteId, key: KeyId, value: i64, at: Tick) {
        self.site_writes.entry(site).or_default().push(SiteWrite {
            key,
            value,
            written_at: at,
        });
    }

    pub(crate) fn record_access(&mut self, key: KeyId, access: KeyAccess) {
        self.completed.entry(key).or_default().push(access);
    }

    pub(crate) fn enqueue(&mut self, op: PendingOp) {
        self.pending.push(op);
    }

    /// Drops every pending operation before `index`, keeping the one at
    /// `index` (the operation that re-blocked) and everything after it.
    pub(crate) fn retain_pending_from(&mut self, index: usize) {
        self.pending.drain(..index);
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Active -> Waiting, remembering the blocking sites.
    pub(crate) fn begin_wait(&mut self, sites: &[SiteId]) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(CoreError::TransactionNotActive { tx: self.id });
        }
        self.waiting_on.extend(sites.iter().copied());
        self.state = TransactionState::Waiting;
        Ok(())
    }

    /// Waiting -> Active, forgetting the blocking sites.
    pub(crate) fn end_wait(&mut self) -> CoreResult<()> {
        if self.state != TransactionState::Waiting {
            return Err(CoreError::TransactionNotWaiting { tx: self.id });
        }
        self.waiting_on.clear();
        self.state = TransactionState::Active;
        Ok(())
    }

    /// Active -> Committed at `at`.
    pub(crate) fn mark_committed(&mut self, at: Tick) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(CoreError::TransactionNotActive { tx: self.id });
        }
        self.state = TransactionState::Committed;
        self.ended_at = Some(at);
        Ok(())
    }

    /// Active -> Aborted.
    pub(crate) fn mark_aborted(&mut self) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(CoreError::TransactionNotActive { tx: self.id });
        }
        self.state = TransactionState::Aborted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reasons_render_the_exact_trace_strings() {
        let down = AbortReason::SiteDownSinceWrite {
            site: SiteId::new(3),
            key: KeyId::new(8),
        };
        assert_eq!(
            down.to_string(),
            "Site 3 was down between write to x8 and commit"
        );

        let stale = AbortReason::StaleWrite {
            key: KeyId::new(3),
            site: SiteId::new(4),
        };
        assert_eq!(stale.to_string(), "Write to x3 was stale at site 4");

        let cycle = AbortReason::DangerousCycle { tx: TxId::new(3) };
        assert_eq!(cycle.to_string(), "Tx: 3, RW cycle detected");
    }

    #[test]
    fn writes_accumulate_per_site_in_order() {
        let mut txn = Transaction::new(TxId::new(1), Tick::new(1));
        let site = SiteId::new(2);
        txn.record_site_write(site, KeyId::new(4), 10, Tick::new(2));
        txn.record_site_write(site, KeyId::new(4), 20, Tick::new(3));

        let writes = &txn.site_writes()[&site];
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].value, 10);
        assert_eq!(writes[1].value, 20);
    }

    #[test]
    fn pending_truncation_keeps_the_failing_op() {
        let mut txn = Transaction::new(TxId::new(1), Tick::new(1));
        txn.enqueue(PendingOp::Read {
            key: KeyId::new(2),
            queued_at: Tick::new(2),
        });
        txn.enqueue(PendingOp::Write {
            key: KeyId::new(4),
            value: 9,
            queued_at: Tick::new(3),
        });
        txn.enqueue(PendingOp::End {
            queued_at: Tick::new(4),
        });

        txn.retain_pending_from(1);
        assert_eq!(txn.pending().len(), 2);
        assert!(matches!(txn.pending()[0], PendingOp::Write { .. }));
    }

    #[test]
    fn wait_transitions_are_guarded() {
        let mut txn = Transaction::new(TxId::new(1), Tick::new(1));
        assert!(txn.end_wait().is_err());

        txn.begin_wait(&[SiteId::new(1), SiteId::new(2)]).unwrap();
        assert_eq!(txn.state(), TransactionState::Waiting);
        assert!(txn.is_waiting_on(SiteId::new(2)));
        assert!(txn.begin_wait(&[SiteId::new(3)]).is_err());

        txn.end_wait().unwrap();
        assert!(txn.is_active());
        assert!(txn.waiting_on().is_empty());
    }

    #[test]
    fn commit_only_from_active() {
        let mut txn = Transaction::new(TxId::new(1), Tick::new(1));
        txn.mark_aborted().unwrap();
        assert!(txn.mark_committed(Tick::new(5)).is_err());
        assert_eq!(txn.ended_at(), None);
    }
}

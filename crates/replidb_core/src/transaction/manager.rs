//! Transaction manager.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::graph::{ConflictKind, TransactionGraph};
use crate::site::{SiteCoordinator, SiteWriteStatus};
use crate::transaction::state::{
    AbortReason, AccessKind, EndOutcome, KeyAccess, PendingOp, ReadOutcome, SiteWrite,
    Transaction, TransactionState, WriteOutcome,
};
use crate::types::{KeyId, SiteId, Tick, TxId};

/// One operation executed during a recovery replay, with its outcome.
///
/// Replays run inside the `recover` call; the driver renders these
/// through the same sink as live operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEvent {
    /// The replayed transaction.
    pub tx: TxId,
    /// What ran and how it went.
    pub action: ReplayAction,
}

/// The operation half of a [`ReplayEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayAction {
    /// A deferred read ran.
    Read {
        /// The key read.
        key: KeyId,
        /// How the read went.
        outcome: ReadOutcome,
    },
    /// A deferred write ran.
    Write {
        /// The key written.
        key: KeyId,
        /// How the write went.
        outcome: WriteOutcome,
    },
    /// A deferred commit attempt ran.
    End {
        /// How the commit attempt went.
        outcome: EndOutcome,
    },
}

/// Drives transaction lifecycles: begin, read, write, end, and
/// recovery-driven replay.
///
/// The manager owns every transaction record, the waiting set, and the
/// conflict graph; it shares the [`SiteCoordinator`] with the driver.
/// Reads serve snapshot values as of the transaction's start tick;
/// commits certify every recorded site write (first committer wins) and
/// refuse serialization anomalies via the graph's dangerous-structure
/// check.
pub struct TransactionManager {
    coordinator: Arc<SiteCoordinator>,
    transactions: BTreeMap<TxId, Transaction>,
    waiting: BTreeSet<TxId>,
    graph: TransactionGraph,
}

impl TransactionManager {
    /// Creates a manager over `coordinator` with no transactions.
    #[must_use]
    pub fn new(coordinator: Arc<SiteCoordinator>) -> Self {
        Self {
            coordinator,
            transactions: BTreeMap::new(),
            waiting: BTreeSet::new(),
            graph: TransactionGraph::new(),
        }
    }

    /// The shared site coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<SiteCoordinator> {
        &self.coordinator
    }

    /// The conflict graph over committed transactions.
    #[must_use]
    pub const fn graph(&self) -> &TransactionGraph {
        &self.graph
    }

    /// Looks up a transaction by id.
    pub fn transaction(&self, id: TxId) -> CoreResult<&Transaction> {
        self.txn(id)
    }

    /// Whether `id` is in the waiting set.
    #[must_use]
    pub fn is_waiting(&self, id: TxId) -> bool {
        self.waiting.contains(&id)
    }

    /// Begins a new transaction at `at`.
    ///
    /// The transaction starts active with empty collections; the graph
    /// is untouched until commit time.
    pub fn begin(&mut self, id: TxId, at: Tick) -> CoreResult<()> {
        match self.transactions.entry(id) {
            Entry::Occupied(_) => Err(CoreError::TransactionExists { tx: id }),
            Entry::Vacant(slot) => {
                slot.insert(Transaction::new(id, at));
                Ok(())
            }
        }
    }

    /// Reads `key` within transaction `id` at tick `at`.
    ///
    /// The value served is the snapshot as of the transaction's start.
    /// Candidate sites are those whose copy is provably the snapshot
    /// version; the first one up serves the read. No candidate at all
    /// aborts the transaction (no site can ever serve it); candidates
    /// that are merely down make the transaction wait for them.
    pub fn read(&mut self, id: TxId, key: KeyId, at: Tick) -> CoreResult<ReadOutcome> {
        if self.waiting.contains(&id) {
            self.txn_mut(id)?
                .enqueue(PendingOp::Read { key, queued_at: at });
            return Ok(ReadOutcome::Waiting);
        }
        if self.txn(id)?.state() == TransactionState::Aborted {
            return Ok(ReadOutcome::AlreadyAborted);
        }
        let snapshot = self.txn(id)?.started_at();
        let candidates = self.coordinator.valid_sites_for_read(key, snapshot);
        if candidates.is_empty() {
            self.abort(id)?;
            return Ok(ReadOutcome::Abort);
        }
        for &site in &candidates {
            match self.coordinator.read_active(site, key, snapshot) {
                Ok(entry) => {
                    self.txn_mut(id)?
                        .record_access(key, KeyAccess::read(entry.value, at));
                    return Ok(ReadOutcome::Value(entry.value));
                }
                Err(CoreError::SiteUnavailable { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        self.park(id, &candidates)?;
        let txn = self.txn_mut(id)?;
        if txn.pending().is_empty() {
            txn.enqueue(PendingOp::Read { key, queued_at: at });
        }
        Ok(ReadOutcome::Wait)
    }

    /// Writes `value` to `key` within transaction `id` at tick `at`.
    ///
    /// The write is recorded against every currently-up site holding the
    /// key; nothing reaches a data manager until commit. With no site up
    /// the transaction waits on the key's full placement (any returning
    /// site could accept the write).
    pub fn write(&mut self, id: TxId, key: KeyId, value: i64, at: Tick) -> CoreResult<WriteOutcome> {
        if self.waiting.contains(&id) {
            self.txn_mut(id)?.enqueue(PendingOp::Write {
                key,
                value,
                queued_at: at,
            });
            return Ok(WriteOutcome::Waiting);
        }
        if self.txn(id)?.state() == TransactionState::Aborted {
            return Ok(WriteOutcome::AlreadyAborted);
        }
        let active = self.coordinator.active_sites_for_key(key);
        if active.is_empty() {
            let placement = self.coordinator.sites_for_key(key);
            self.park(id, &placement)?;
            let txn = self.txn_mut(id)?;
            if txn.pending().is_empty() {
                txn.enqueue(PendingOp::Write {
                    key,
                    value,
                    queued_at: at,
                });
            }
            return Ok(WriteOutcome::Wait);
        }
        let txn = self.txn_mut(id)?;
        for &site in &active {
            txn.record_site_write(site, key, value, at);
        }
        txn.record_access(key, KeyAccess::write(value, at));
        Ok(WriteOutcome::Applied(active))
    }

    /// Ends transaction `id` at tick `at`, committing if every check
    /// passes.
    ///
    /// In order: certify every recorded site write (an outage since the
    /// write or an earlier commit of the key aborts), prune the graph,
    /// derive conflict edges against committed transactions, reject
    /// dangerous structures, then fan the writes out and mark the
    /// transaction committed.
    pub fn end(&mut self, id: TxId, at: Tick) -> CoreResult<EndOutcome> {
        if self.waiting.contains(&id) {
            self.txn_mut(id)?.enqueue(PendingOp::End { queued_at: at });
            return Ok(EndOutcome::Waiting);
        }
        if self.txn(id)?.state() != TransactionState::Active {
            return Ok(EndOutcome::NotActive);
        }

        if let Some(reason) = self.certify_writes(id, at)? {
            self.abort(id)?;
            return Ok(EndOutcome::Abort(reason));
        }

        let earliest = self.earliest_active_start();
        self.graph.purge(earliest);

        let (incoming, outgoing) = self.derive_conflicts(id)?;
        if !self.graph.try_commit(id, at, &incoming, &outgoing)? {
            self.abort(id)?;
            return Ok(EndOutcome::Abort(AbortReason::DangerousCycle { tx: id }));
        }

        let writes: Vec<(SiteId, SiteWrite)> = self
            .txn(id)?
            .site_writes()
            .iter()
            .flat_map(|(&site, list)| list.iter().map(move |write| (site, *write)))
            .collect();
        for (site, write) in writes {
            self.coordinator
                .commit_site_write(site, write.key, write.value, at)?;
        }
        self.txn_mut(id)?.mark_committed(at)?;
        self.waiting.remove(&id);
        Ok(EndOutcome::Committed)
    }

    /// Reactivates and replays every transaction waiting on `site`.
    ///
    /// The waiting set is snapshotted first; each blocked transaction is
    /// reactivated and its pending operations replay in order, all at
    /// the recovery tick. A replayed read or write that does not succeed
    /// stops that transaction's replay and leaves the failing operation
    /// at the head of its queue; end outcomes are reported but never cut
    /// the replay short.
    pub fn recover(&mut self, site: SiteId, at: Tick) -> CoreResult<Vec<ReplayEvent>> {
        let parked: Vec<TxId> = self.waiting.iter().copied().collect();
        let mut events = Vec::new();
        for id in parked {
            if !self.waiting.contains(&id) {
                continue;
            }
            if !self.txn(id)?.is_waiting_on(site) {
                continue;
            }
            self.unpark(id)?;
            self.replay_pending(id, at, &mut events)?;
        }
        Ok(events)
    }

    fn replay_pending(
        &mut self,
        id: TxId,
        at: Tick,
        events: &mut Vec<ReplayEvent>,
    ) -> CoreResult<()> {
        let ops = self.txn(id)?.pending().to_vec();
        for (index, op) in ops.iter().enumerate() {
            match *op {
                PendingOp::Read { key, .. } => {
                    let outcome = self.read(id, key, at)?;
                    let success = outcome.is_success();
                    events.push(ReplayEvent {
                        tx: id,
                        action: ReplayAction::Read { key, outcome },
                    });
                    if !success {
                        self.txn_mut(id)?.retain_pending_from(index);
                        return Ok(());
                    }
                }
                PendingOp::Write { key, value, .. } => {
                    let outcome = self.write(id, key, value, at)?;
                    let success = outcome.is_success();
                    events.push(ReplayEvent {
                        tx: id,
                        action: ReplayAction::Write { key, outcome },
                    });
                    if !success {
                        self.txn_mut(id)?.retain_pending_from(index);
                        return Ok(());
                    }
                }
                PendingOp::End { .. } => {
                    let outcome = self.end(id, at)?;
                    events.push(ReplayEvent {
                        tx: id,
                        action: ReplayAction::End { outcome },
                    });
                }
            }
        }
        self.txn_mut(id)?.clear_pending();
        Ok(())
    }

    /// Checks every `(site, write)` pair against outages and competing
    /// commits, returning the first failure.
    fn certify_writes(&self, id: TxId, now: Tick) -> CoreResult<Option<AbortReason>> {
        let txn = self.txn(id)?;
        for (&site, writes) in txn.site_writes() {
            for write in writes {
                match self
                    .coordinator
                    .verify_site_write(site, write.key, write.written_at, now)?
                {
                    SiteWriteStatus::Ok => {}
                    SiteWriteStatus::Down => {
                        return Ok(Some(AbortReason::SiteDownSinceWrite {
                            site,
                            key: write.key,
                        }));
                    }
                    SiteWriteStatus::Stale => {
                        return Ok(Some(AbortReason::StaleWrite {
                            key: write.key,
                            site,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Derives conflict edges between `id` and every committed
    /// transaction still in the graph.
    ///
    /// For each of `id`'s completed accesses against each committed
    /// transaction's accesses to the same key:
    /// - write after write: incoming WW;
    /// - write after read: incoming RW;
    /// - read after write: incoming WR when the writer committed before
    ///   `id` started (the snapshot saw it), otherwise outgoing RW (the
    ///   snapshot missed it — an antidependency).
    ///
    /// Per counterpart, WW/WR keep the first label seen; RW always wins.
    fn derive_conflicts(
        &self,
        id: TxId,
    ) -> CoreResult<(BTreeMap<TxId, ConflictKind>, BTreeMap<TxId, ConflictKind>)> {
        let txn = self.txn(id)?;
        let committed: Vec<TxId> = self.graph.committed_ids().collect();
        let mut incoming = BTreeMap::new();
        let mut outgoing = BTreeMap::new();
        for (key, accesses) in txn.completed() {
            for access in accesses {
                for &other_id in &committed {
                    if other_id == id {
                        continue;
                    }
                    let other = self.txn(other_id)?;
                    let Some(past) = other.completed().get(key) else {
                        continue;
                    };
                    for past_access in past {
                        match (access.kind, past_access.kind) {
                            (AccessKind::Write, AccessKind::Write) => {
                                merge_edge(&mut incoming, other_id, ConflictKind::Ww);
                            }
                            (AccessKind::Write, AccessKind::Read) => {
                                merge_edge(&mut incoming, other_id, ConflictKind::Rw);
                            }
                            (AccessKind::Read, AccessKind::Write) => {
                                let saw_it = other
                                    .ended_at()
                                    .map_or(false, |ended| ended < txn.started_at());
                                if saw_it {
                                    merge_edge(&mut incoming, other_id, ConflictKind::Wr);
                                } else {
                                    merge_edge(&mut outgoing, other_id, ConflictKind::Rw);
                                }
                            }
                            (AccessKind::Read, AccessKind::Read) => {}
                        }
                    }
                }
            }
        }
        Ok((incoming, outgoing))
    }

    /// Earliest start tick among active or waiting transactions, or
    /// [`Tick::MIN`] (purges nothing) when none remain.
    fn earliest_active_start(&self) -> Tick {
        self.transactions
            .values()
            .filter(|txn| {
                matches!(
                    txn.state(),
                    TransactionState::Active | TransactionState::Waiting
                )
            })
            .map(Transaction::started_at)
            .min()
            .unwrap_or(Tick::MIN)
    }

    fn park(&mut self, id: TxId, sites: &[SiteId]) -> CoreResult<()> {
        if self.waiting.contains(&id) {
            return Ok(());
        }
        self.txn_mut(id)?.begin_wait(sites)?;
        self.waiting.insert(id);
        Ok(())
    }

    fn unpark(&mut self, id: TxId) -> CoreResult<()> {
        if !self.waiting.remove(&id) {
            return Err(CoreError::TransactionNotWaiting { tx: id });
        }
        self.txn_mut(id)?.end_wait()
    }

    fn abort(&mut self, id: TxId) -> CoreResult<()> {
        self.txn_mut(id)?.mark_aborted()?;
        self.waiting.remove(&id);
        Ok(())
    }

    fn txn(&self, id: TxId) -> CoreResult<&Transaction> {
        self.transactions
            .get(&id)
            .ok_or(CoreError::TransactionNotFound { tx: id })
    }

    fn txn_mut(&mut self, id: TxId) -> CoreResult<&mut Transaction> {
        self.transactions
            .get_mut(&id)
            .ok_or(CoreError::TransactionNotFound { tx: id })
    }
}

fn merge_edge(edges: &mut BTreeMap<TxId, ConflictKind>, tx: TxId, kind: ConflictKind) {
    match edges.entry(tx) {
        Entry::Vacant(slot) => {
            slot.insert(kind);
        }
        Entry::Occupied(mut slot) => {
            if kind == ConflictKind::Rw {
                slot.insert(ConflictKind::Rw);
            }
        }
    }
}

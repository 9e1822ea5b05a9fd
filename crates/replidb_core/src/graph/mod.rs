//! Transaction conflict graph.
//!
//! A multi-edge digraph over committed transactions. Nodes enter the
//! graph when their transaction commits; edges carry a conflict label.
//! Serializability under snapshot isolation is enforced by rejecting a
//! commit that would close a simple cycle containing two consecutive
//! RW antidependencies (a "dangerous structure").

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::types::{Tick, TxId};

/// Label on a conflict edge `u -> v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `u` and `v` both wrote the key.
    Ww,
    /// `v` read the value `u` committed.
    Wr,
    /// `u` read a key that `v` wrote but `u`'s snapshot did not see
    /// (antidependency).
    Rw,
}

#[derive(Debug, Clone)]
struct Node {
    committed_at: Tick,
    /// Outgoing edges; at most one per target, RW winning promotions.
    out: BTreeMap<TxId, ConflictKind>,
}

/// Digraph of committed transactions used for dangerous-structure
/// detection.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    nodes: BTreeMap<TxId, Node>,
}

impl TransactionGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph tracks no transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `tx` is present in the graph.
    #[must_use]
    pub fn contains(&self, tx: TxId) -> bool {
        self.nodes.contains_key(&tx)
    }

    /// Ids of all tracked transactions, ascending.
    pub fn committed_ids(&self) -> impl Iterator<Item = TxId> + '_ {
        self.nodes.keys().copied()
    }

    /// The label on the edge `from -> to`, if present.
    #[must_use]
    pub fn edge(&self, from: TxId, to: TxId) -> Option<ConflictKind> {
        self.nodes.get(&from)?.out.get(&to).copied()
    }

    /// Adds a node for a transaction committed at `committed_at`.
    /// Re-adding an existing node keeps its edges.
    pub fn add_node(&mut self, tx: TxId, committed_at: Tick) {
        self.nodes.entry(tx).or_insert(Node {
            committed_at,
            out: BTreeMap::new(),
        });
    }

    /// Removes a node and every edge that references it.
    pub fn remove_node(&mut self, tx: TxId) {
        self.nodes.remove(&tx);
        for node in self.nodes.values_mut() {
            node.out.remove(&tx);
        }
    }

    /// Adds the edge `from -> to`, or promotes an existing one.
    ///
    /// A pair keeps at most one edge. A second label only takes effect
    /// when it is RW: RW is the one label cycle detection cares about,
    /// so it wins promotions and is never demoted.
    pub fn add_edge(&mut self, from: TxId, to: TxId, kind: ConflictKind) -> CoreResult<()> {
        if !self.nodes.contains_key(&to) {
            return Err(CoreError::NotInGraph { tx: to });
        }
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or(CoreError::NotInGraph { tx: from })?;
        match node.out.get_mut(&to) {
            None => {
                node.out.insert(to, kind);
            }
            Some(existing) => {
                if kind == ConflictKind::Rw {
                    *existing = ConflictKind::Rw;
                }
            }
        }
        Ok(())
    }

    /// Atomically inserts `tx` with its conflict edges and checks for a
    /// dangerous structure.
    ///
    /// Returns `true` and keeps the node if the commit is admissible;
    /// removes the node and returns `false` when the insertion would
    /// close a cycle with two consecutive RW edges.
    pub fn try_commit(
        &mut self,
        tx: TxId,
        committed_at: Tick,
        incoming: &BTreeMap<TxId, ConflictKind>,
        outgoing: &BTreeMap<TxId, ConflictKind>,
    ) -> CoreResult<bool> {
        self.add_node(tx, committed_at);
        for (&from, &kind) in incoming {
            self.add_edge(from, tx, kind)?;
        }
        for (&to, &kind) in outgoing {
            self.add_edge(tx, to, kind)?;
        }
        if self.has_dangerous_cycle(tx) {
            self.remove_node(tx);
            return Ok(false);
        }
        Ok(true)
    }

    /// Whether some simple cycle through `tx` contains two consecutive
    /// RW edges.
    ///
    /// Enumerates simple cycles by DFS from `tx` back to `tx`, scanning
    /// each candidate as it closes. The last edge is treated as adjacent
    /// to the first only for cycles of length three or more; a
    /// two-cycle's pair of edges is already adjacent once.
    #[must_use]
    pub fn has_dangerous_cycle(&self, tx: TxId) -> bool {
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        self.search(tx, tx, &mut visited, &mut path)
    }

    fn search(
        &self,
        current: TxId,
        start: TxId,
        visited: &mut BTreeSet<TxId>,
        path: &mut Vec<ConflictKind>,
    ) -> bool {
        let Some(node) = self.nodes.get(&current) else {
            return false;
        };
        if current != start {
            visited.insert(current);
        }
        for (&next, &kind) in &node.out {
            path.push(kind);
            let dangerous = if next == start {
                path.len() > 1 && has_consecutive_rw(path)
            } else if !visited.contains(&next) {
                self.search(next, start, visited, path)
            } else {
                false
            };
            path.pop();
            if dangerous {
                return true;
            }
        }
        visited.remove(&current);
        false
    }

    /// Drops every node that committed before `earliest_active_start`.
    ///
    /// Such a node cannot sit on a future dangerous cycle: every future
    /// committer started no earlier, so no RW edge can point at it.
    /// Passing [`Tick::MIN`] removes nothing.
    pub fn purge(&mut self, earliest_active_start: Tick) {
        let stale: Vec<TxId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.committed_at < earliest_active_start)
            .map(|(&tx, _)| tx)
            .collect();
        for tx in stale {
            self.remove_node(tx);
        }
    }
}

/// Scans a cycle's edge labels for an RW immediately following an RW,
/// wrapping around only when the cycle has at least three edges.
fn has_consecutive_rw(cycle: &[ConflictKind]) -> bool {
    let n = cycle.len();
    let scans = if n > 2 { n + 1 } else { n };
    let mut previous_rw = false;
    for i in 0..scans {
        let rw = cycle[i % n] == ConflictKind::Rw;
        if previous_rw && rw {
            return true;
        }
        previous_rw = rw;
    }
    false
}

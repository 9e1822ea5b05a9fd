//! Per-site multi-version store.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::Topology;
use crate::types::{CommittedValue, KeyId, SiteId, Tick};

/// Owns the committed versions of every key resident at one site.
///
/// Each key maps to a non-empty, append-only sequence of committed
/// values ordered by commit tick; the seed value at [`Tick::INITIAL`]
/// is always present.
#[derive(Debug, Clone)]
pub struct DataManager {
    site: SiteId,
    committed: BTreeMap<KeyId, Vec<CommittedValue>>,
}

impl DataManager {
    /// Creates the store for `site`, seeded with the topology's initial
    /// value for every resident key.
    #[must_use]
    pub fn new(site: SiteId, topology: &Topology) -> Self {
        let committed = topology
            .resident_keys(site)
            .into_iter()
            .map(|key| {
                let seed = CommittedValue::new(topology.initial_value(key), Tick::INITIAL);
                (key, vec![seed])
            })
            .collect();
        Self { site, committed }
    }

    /// The site this store belongs to.
    #[must_use]
    pub const fn site(&self) -> SiteId {
        self.site
    }

    /// Whether `key` is resident at this site.
    #[must_use]
    pub fn holds(&self, key: KeyId) -> bool {
        self.committed.contains_key(&key)
    }

    /// The entry with the greatest commit tick `<= as_of`, or `None` if
    /// the key is not resident here.
    ///
    /// Resident keys always have the seed entry at [`Tick::INITIAL`], so
    /// `None` never means "no version old enough".
    #[must_use]
    pub fn read(&self, key: KeyId, as_of: Tick) -> Option<CommittedValue> {
        self.committed
            .get(&key)?
            .iter()
            .rev()
            .find(|entry| entry.committed_at <= as_of)
            .copied()
    }

    /// The most recently committed entry for `key`, or `None` if the key
    /// is not resident here.
    #[must_use]
    pub fn last_committed(&self, key: KeyId) -> Option<CommittedValue> {
        self.committed.get(&key)?.last().copied()
    }

    /// Appends a committed value for `key` at `committed_at`.
    ///
    /// The history stays commit-tick ordered because the driver's clock
    /// is monotonic; equal ticks (several writes applied by one commit)
    /// append in call order.
    pub fn commit(&mut self, key: KeyId, value: i64, committed_at: Tick) {
        let history = self.committed.entry(key).or_default();
        debug_assert!(
            history
                .last()
                .map_or(true, |last| last.committed_at <= committed_at),
            "commit ticks must be non-decreasing"
        );
        history.push(CommittedValue::new(value, committed_at));
    }

    /// One snapshot line for this site: `site N - x2: v2, x4: v4, ...`
    /// listing resident keys in ascending order.
    #[must_use]
    pub fn dump_line(&self) -> String {
        let mut line = format!("site {} - ", self.site);
        let mut first = true;
        for (key, history) in &self.committed {
            if !first {
                line.push_str(", ");
            }
            first = false;
            // Resident histories are never empty.
            let value = history.last().map_or(0, |entry| entry.value);
            let _ = write!(line, "{key}: {value}");
        }
        line
    }
}

//! Availability-aware coordination across all sites.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::config::Topology;
use crate::error::{CoreError, CoreResult};
use crate::site::data::DataManager;
use crate::site::uptime::UptimeLog;
use crate::types::{CommittedValue, KeyId, SiteId, Tick};

/// Outcome of certifying one pending site write at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteWriteStatus {
    /// The site stayed up since the write and nobody committed the key
    /// in between.
    Ok,
    /// The site was not continuously up between the write and the
    /// commit attempt.
    Down,
    /// Another transaction committed the key at or after the write tick
    /// (first committer wins).
    Stale,
}

struct Site {
    data: DataManager,
    uptime: UptimeLog,
}

/// Owns every site's data manager and uptime history.
///
/// The coordinator is shared between the driver (fail / recover / dump)
/// and the transaction manager (reads, certification, commit fan-out),
/// so it lives behind `Arc` and takes `&self` everywhere.
pub struct SiteCoordinator {
    topology: Topology,
    sites: RwLock<BTreeMap<SiteId, Site>>,
}

impl SiteCoordinator {
    /// Creates a coordinator with every site up and seeded.
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        let sites = topology
            .site_ids()
            .map(|site| {
                (
                    site,
                    Site {
                        data: DataManager::new(site, &topology),
                        uptime: UptimeLog::new(),
                    },
                )
            })
            .collect();
        Self {
            topology,
            sites: RwLock::new(sites),
        }
    }

    /// The topology this coordinator was built from.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Records a site failure at `at`. Idempotent while down.
    pub fn fail(&self, site: SiteId, at: Tick) -> CoreResult<()> {
        let mut sites = self.sites.write();
        let entry = sites
            .get_mut(&site)
            .ok_or(CoreError::SiteNotFound { site })?;
        entry.uptime.fail(at);
        Ok(())
    }

    /// Records a site recovery at `at`. Idempotent while up.
    pub fn recover(&self, site: SiteId, at: Tick) -> CoreResult<()> {
        let mut sites = self.sites.write();
        let entry = sites
            .get_mut(&site)
            .ok_or(CoreError::SiteNotFound { site })?;
        entry.uptime.recover(at);
        Ok(())
    }

    /// Whether `site` is currently up.
    pub fn is_up(&self, site: SiteId) -> CoreResult<bool> {
        let sites = self.sites.read();
        let entry = sites.get(&site).ok_or(CoreError::SiteNotFound { site })?;
        Ok(entry.uptime.is_up())
    }

    /// All sites holding `key`, up or not, in placement order.
    #[must_use]
    pub fn sites_for_key(&self, key: KeyId) -> Vec<SiteId> {
        self.topology.sites_for_key(key)
    }

    /// The subset of `sites_for_key` that is currently up.
    #[must_use]
    pub fn active_sites_for_key(&self, key: KeyId) -> Vec<SiteId> {
        let sites = self.sites.read();
        self.topology
            .sites_for_key(key)
            .into_iter()
            .filter(|site| {
                sites
                    .get(site)
                    .map_or(false, |entry| entry.uptime.is_up())
            })
            .collect()
    }

    /// Sites whose copy of `key` is guaranteed to be the snapshot
    /// version for a transaction that started at `tx_start`.
    ///
    /// An unreplicated key's one site is always valid (availability is
    /// checked separately at read time). A replicated copy is valid only
    /// if the site stayed up from the last commit at or before
    /// `tx_start` through `tx_start`; a site that failed and recovered
    /// in between may have missed writes and is skipped.
    #[must_use]
    pub fn valid_sites_for_read(&self, key: KeyId, tx_start: Tick) -> Vec<SiteId> {
        let placement = self.topology.sites_for_key(key);
        if placement.len() == 1 {
            return placement;
        }
        let sites = self.sites.read();
        placement
            .into_iter()
            .filter(|site| {
                let Some(entry) = sites.get(site) else {
                    return false;
                };
                entry
                    .data
                    .read(key, tx_start)
                    .map_or(false, |last| entry.uptime.covers(last.committed_at, tx_start))
            })
            .collect()
    }

    /// Reads the snapshot value of `key` as of `as_of` from `site`,
    /// failing if the site is down.
    pub fn read_active(&self, site: SiteId, key: KeyId, as_of: Tick) -> CoreResult<CommittedValue> {
        let sites = self.sites.read();
        let entry = sites.get(&site).ok_or(CoreError::SiteNotFound { site })?;
        if !entry.uptime.is_up() {
            return Err(CoreError::SiteUnavailable { site });
        }
        entry
            .data
            .read(key, as_of)
            .ok_or(CoreError::KeyNotResident { key, site })
    }

    /// Certifies a write made at `written_at` for commit at `now`.
    pub fn verify_site_write(
        &self,
        site: SiteId,
        key: KeyId,
        written_at: Tick,
        now: Tick,
    ) -> CoreResult<SiteWriteStatus> {
        let sites = self.sites.read();
        let entry = sites.get(&site).ok_or(CoreError::SiteNotFound { site })?;
        if !entry.uptime.covers(written_at, now) {
            return Ok(SiteWriteStatus::Down);
        }
        let last = entry
            .data
            .last_committed(key)
            .ok_or(CoreError::KeyNotResident { key, site })?;
        if last.committed_at < written_at {
            Ok(SiteWriteStatus::Ok)
        } else {
            Ok(SiteWriteStatus::Stale)
        }
    }

    /// Appends a committed value at `site` unconditionally.
    pub fn commit_site_write(
        &self,
        site: SiteId,
        key: KeyId,
        value: i64,
        committed_at: Tick,
    ) -> CoreResult<()> {
        let mut sites = self.sites.write();
        let entry = sites
            .get_mut(&site)
            .ok_or(CoreError::SiteNotFound { site })?;
        entry.data.commit(key, value, committed_at);
        Ok(())
    }

    /// The most recently committed value of `key` at `site`, regardless
    /// of availability. Intended for inspection and tests.
    pub fn last_committed(&self, site: SiteId, key: KeyId) -> CoreResult<CommittedValue> {
        let sites = self.sites.read();
        let entry = sites.get(&site).ok_or(CoreError::SiteNotFound { site })?;
        entry
            .data
            .last_committed(key)
            .ok_or(CoreError::KeyNotResident { key, site })
    }

    /// The full snapshot: one line per site, ascending site order.
    /// Never mutates state.
    #[must_use]
    pub fn dump(&self) -> String {
        let sites = self.sites.read();
        let lines: Vec<String> = sites.values().map(|entry| entry.data.dump_line()).collect();
        lines.join("\n")
    }
}

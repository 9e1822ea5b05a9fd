//! Topology configuration.
//!
//! The simulated universe is fixed by two numbers: how many sites exist
//! and how many keys exist. Placement, residency, and seed values are
//! all derived from them:
//!
//! - even-numbered keys are replicated at every site;
//! - odd key `k` lives only at site `1 + (k mod sites)`;
//! - key `xk` starts at value `10 * k`.

use crate::types::{KeyId, SiteId};

/// Shape of the simulated cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// Number of sites, numbered `1..=sites`.
    sites: u64,
    /// Number of keys, numbered `1..=keys`.
    keys: u64,
}

impl Default for Topology {
    fn default() -> Self {
        Self { sites: 10, keys: 20 }
    }
}

impl Topology {
    /// Creates the default 10-site, 20-key topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of sites.
    #[must_use]
    pub const fn with_sites(mut self, sites: u64) -> Self {
        self.sites = sites;
        self
    }

    /// Sets the number of keys.
    #[must_use]
    pub const fn with_keys(mut self, keys: u64) -> Self {
        self.keys = keys;
        self
    }

    /// Returns the number of sites.
    #[must_use]
    pub const fn site_count(&self) -> u64 {
        self.sites
    }

    /// Returns the number of keys.
    #[must_use]
    pub const fn key_count(&self) -> u64 {
        self.keys
    }

    /// Whether `site` exists in this topology.
    #[must_use]
    pub const fn contains_site(&self, site: SiteId) -> bool {
        site.as_u64() >= 1 && site.as_u64() <= self.sites
    }

    /// Iterates all sites in ascending order.
    pub fn site_ids(&self) -> impl Iterator<Item = SiteId> {
        (1..=self.sites).map(SiteId::new)
    }

    /// Iterates all keys in ascending order.
    pub fn key_ids(&self) -> impl Iterator<Item = KeyId> {
        (1..=self.keys).map(KeyId::new)
    }

    /// The single site an unreplicated (odd) key lives at.
    #[must_use]
    pub const fn home_site(&self, key: KeyId) -> SiteId {
        SiteId::new(1 + key.as_u64() % self.sites)
    }

    /// All sites holding `key`, in ascending site order.
    ///
    /// Replicated keys live everywhere; unreplicated keys at their home
    /// site only.
    #[must_use]
    pub fn sites_for_key(&self, key: KeyId) -> Vec<SiteId> {
        if key.is_replicated() {
            self.site_ids().collect()
        } else {
            vec![self.home_site(key)]
        }
    }

    /// All keys resident at `site`, in ascending key order.
    #[must_use]
    pub fn resident_keys(&self, site: SiteId) -> Vec<KeyId> {
        self.key_ids()
            .filter(|&key| key.is_replicated() || self.home_site(key) == site)
            .collect()
    }

    /// The seed value of `key` before any transaction commits.
    #[must_use]
    pub const fn initial_value(&self, key: KeyId) -> i64 {
        10 * key.as_u64() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicated_keys_live_everywhere() {
        let topology = Topology::default();
        let sites = topology.sites_for_key(KeyId::new(8));
        assert_eq!(sites.len(), 10);
        assert_eq!(sites[0], SiteId::new(1));
        assert_eq!(sites[9], SiteId::new(10));
    }

    #[test]
    fn odd_keys_live_at_their_home_site() {
        let topology = Topology::default();
        assert_eq!(topology.sites_for_key(KeyId::new(3)), vec![SiteId::new(4)]);
        assert_eq!(topology.sites_for_key(KeyId::new(9)), vec![SiteId::new(10)]);
        assert_eq!(topology.sites_for_key(KeyId::new(11)), vec![SiteId::new(2)]);
        assert_eq!(topology.sites_for_key(KeyId::new(19)), vec![SiteId::new(10)]);
    }

    #[test]
    fn even_sites_hold_their_two_odd_keys() {
        let topology = Topology::default();
        let keys = topology.resident_keys(SiteId::new(4));
        let expected: Vec<KeyId> = [2, 3, 4, 6, 8, 10, 12, 13, 14, 16, 18, 20]
            .into_iter()
            .map(KeyId::new)
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn odd_sites_hold_only_replicated_keys() {
        let topology = Topology::default();
        let keys = topology.resident_keys(SiteId::new(7));
        assert_eq!(keys.len(), 10);
        assert!(keys.iter().all(|k| k.is_replicated()));
    }

    #[test]
    fn seed_values_scale_with_the_key() {
        let topology = Topology::default();
        assert_eq!(topology.initial_value(KeyId::new(1)), 10);
        assert_eq!(topology.initial_value(KeyId::new(20)), 200);
    }

    #[test]
    fn builder_overrides_the_universe() {
        let topology = Topology::new().with_sites(4).with_keys(6);
        assert_eq!(topology.site_count(), 4);
        assert_eq!(topology.sites_for_key(KeyId::new(5)), vec![SiteId::new(2)]);
        assert_eq!(topology.sites_for_key(KeyId::new(6)).len(), 4);
    }
}

//! Site uptime history.

use crate::types::Tick;

/// One half-open span `[started_at, ended_at)` during which a site was
/// up. `ended_at == None` means the site is still up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeInterval {
    /// Tick at which the site came up.
    pub started_at: Tick,
    /// Tick at which the site went down, or `None` while it is up.
    pub ended_at: Option<Tick>,
}

/// Ordered uptime history of a single site.
///
/// Intervals only ever grow: a failure closes the trailing interval, a
/// recovery opens a new one. Duplicate failures and recoveries are
/// idempotent no-ops.
#[derive(Debug, Clone)]
pub struct UptimeLog {
    intervals: Vec<UptimeInterval>,
}

impl Default for UptimeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeLog {
    /// Creates a history for a site that has been up since before the
    /// first command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: vec![UptimeInterval {
                started_at: Tick::INITIAL,
                ended_at: None,
            }],
        }
    }

    /// Whether the site is currently up.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.intervals
            .last()
            .map_or(false, |interval| interval.ended_at.is_none())
    }

    /// Records a failure at `at`. No-op if the site is already down.
    pub fn fail(&mut self, at: Tick) {
        if let Some(interval) = self.intervals.last_mut() {
            if interval.ended_at.is_none() {
                interval.ended_at = Some(at);
            }
        }
    }

    /// Records a recovery at `at`. No-op if the site is already up.
    pub fn recover(&mut self, at: Tick) {
        if !self.is_up() {
            self.intervals.push(UptimeInterval {
                started_at: at,
                ended_at: None,
            });
        }
    }

    /// Whether the site was continuously up over `[from, until]`: some
    /// interval starts at or before `from` and does not end before
    /// `until`.
    #[must_use]
    pub fn covers(&self, from: Tick, until: Tick) -> bool {
        self.intervals.iter().any(|interval| {
            interval.started_at <= from
                && interval.ended_at.map_or(true, |ended| ended >= until)
        })
    }

    /// The recorded intervals, oldest first.
    #[must_use]
    pub fn intervals(&self) -> &[UptimeInterval] {
        &self.intervals
    }
}

//! Core type definitions for ReplicaDB.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Transaction ids come from the input trace (`begin(T7)` yields id 7)
/// and are never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub u64);

impl TxId {
    /// Creates a new transaction id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Identifier of a site (data replica), numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(pub u64);

impl SiteId {
    /// Creates a new site id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a key, numbered from 1 (`x1`, `x2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub u64);

impl KeyId {
    /// Creates a new key id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the key is replicated across every site.
    ///
    /// Even-numbered keys are replicated; odd keys live at exactly one
    /// site.
    #[must_use]
    pub const fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A point on the simulation's logical clock.
///
/// The driver assigns one tick per input command, starting at 1. The
/// seed values that exist before any command carry [`Tick::INITIAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub i64);

impl Tick {
    /// The tick of seed data, before the first command.
    pub const INITIAL: Self = Self(-1);

    /// A tick earlier than any other, usable as a "remove nothing"
    /// purge bound.
    pub const MIN: Self = Self(i64::MIN);

    /// Creates a new tick.
    #[must_use]
    pub const fn new(tick: i64) -> Self {
        Self(tick)
    }

    /// Returns the raw tick value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed value of one key at one site, tagged with its commit tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedValue {
    /// The committed value.
    pub value: i64,
    /// The tick at which the value committed.
    pub committed_at: Tick,
}

impl CommittedValue {
    /// Creates a new committed value.
    #[must_use]
    pub const fn new(value: i64, committed_at: Tick) -> Self {
        Self {
            value,
            committed_at,
        }
    }
}

//! Property-based test generators using proptest.
//!
//! Provides strategies for generating well-formed command traces.
//! Steps are generated abstractly (with [`Index`] picks instead of
//! concrete transaction ids) and resolved while rendering, so every
//! generated trace — and every shrink of one — maintains the trace
//! invariants: transactions are begun before use, ids are never
//! reused, and no operation targets a transaction after its `end` was
//! issued (the engine treats reads and writes on a committed
//! transaction while sites are down as a halting trace error).

use proptest::prelude::*;
use proptest::sample::Index;
use proptest::strategy::ValueTree;
use proptest::test_runner::{RngAlgorithm, TestRng, TestRunner};

use crate::script::TraceScript;

/// Strategy for valid key numbers.
pub fn key_strategy() -> impl Strategy<Value = u64> {
    1_u64..=20
}

/// Strategy for valid site numbers.
pub fn site_strategy() -> impl Strategy<Value = u64> {
    1_u64..=10
}

/// Strategy for written values.
pub fn value_strategy() -> impl Strategy<Value = i64> {
    0_i64..1000
}

/// One abstract trace step.
///
/// Transaction-targeting steps carry an [`Index`] into the pool of
/// transactions still live at render time rather than a concrete id.
#[derive(Debug, Clone)]
pub enum TraceOp {
    /// Begin the next fresh transaction.
    Begin,
    /// Read a key in a live transaction.
    Read {
        /// Pick into the live-transaction pool.
        tx: Index,
        /// The key to read.
        key: u64,
    },
    /// Write a key in a live transaction.
    Write {
        /// Pick into the live-transaction pool.
        tx: Index,
        /// The key to write.
        key: u64,
        /// The value to write.
        value: i64,
    },
    /// End a live transaction, retiring it from the pool.
    End {
        /// Pick into the live-transaction pool.
        tx: Index,
    },
    /// Fail a site.
    Fail {
        /// The failing site.
        site: u64,
    },
    /// Recover a site.
    Recover {
        /// The recovering site.
        site: u64,
    },
    /// Emit a snapshot.
    Dump,
}

/// Strategy for single trace steps.
pub fn trace_op_strategy() -> impl Strategy<Value = TraceOp> {
    prop_oneof![
        2 => Just(TraceOp::Begin),
        3 => (any::<Index>(), key_strategy()).prop_map(|(tx, key)| TraceOp::Read { tx, key }),
        2 => (any::<Index>(), key_strategy(), value_strategy())
            .prop_map(|(tx, key, value)| TraceOp::Write { tx, key, value }),
        1 => any::<Index>().prop_map(|tx| TraceOp::End { tx }),
        1 => site_strategy().prop_map(|site| TraceOp::Fail { site }),
        1 => site_strategy().prop_map(|site| TraceOp::Recover { site }),
        1 => Just(TraceOp::Dump),
    ]
}

/// Strategy for whole well-formed traces of `min_ops..max_ops` steps.
pub fn trace_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(trace_op_strategy(), min_ops..max_ops).prop_map(render_trace)
}

/// Renders abstract steps into a well-formed trace.
///
/// Steps that pick from an empty live-transaction pool degrade to
/// `begin` (reads and writes) or `dump` (ends); a trailing `dump` is
/// always appended.
#[must_use]
pub fn render_trace(ops: Vec<TraceOp>) -> String {
    let mut script = TraceScript::new();
    let mut live: Vec<u64> = Vec::new();
    let mut next_tx = 1_u64;

    for op in ops {
        match op {
            TraceOp::Begin => {
                script = script.begin(next_tx);
                live.push(next_tx);
                next_tx += 1;
            }
            TraceOp::Read { tx, key } => {
                if live.is_empty() {
                    script = script.begin(next_tx);
                    live.push(next_tx);
                    next_tx += 1;
                } else {
                    script = script.read(live[tx.index(live.len())], key);
                }
            }
            TraceOp::Write { tx, key, value } => {
                if live.is_empty() {
                    script = script.begin(next_tx);
                    live.push(next_tx);
                    next_tx += 1;
                } else {
                    script = script.write(live[tx.index(live.len())], key, value);
                }
            }
            TraceOp::End { tx } => {
                if live.is_empty() {
                    script = script.dump();
                } else {
                    script = script.end(live.remove(tx.index(live.len())));
                }
            }
            TraceOp::Fail { site } => script = script.fail(site),
            TraceOp::Recover { site } => script = script.recover(site),
            TraceOp::Dump => script = script.dump(),
        }
    }
    script.dump().build()
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

/// Samples [`trace_strategy`] once with a seeded rng: one well-formed
/// trace of `commands` steps. The same seed always yields the same
/// trace.
#[must_use]
pub fn random_trace(seed: u64, commands: usize) -> String {
    let mut seed_bytes = [0_u8; 32];
    seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &seed_bytes);
    let mut runner = TestRunner::new_with_rng(ProptestConfig::default(), rng);
    trace_strategy(commands, commands + 1)
        .new_tree(&mut runner)
        .expect("trace strategy never rejects")
        .current()
}

//! End-to-end trace scenarios.

use proptest::prelude::*;
use replidb_core::{KeyId, SiteId, Topology, TransactionState, TxId};
use replidb_sim::SimError;
use replidb_testkit::prelude::*;

/// Expected dump line for `site`, with `overrides` replacing initial
/// values by key.
fn dump_line(site: u64, overrides: &[(u64, i64)]) -> String {
    let topology = Topology::default();
    let entries: Vec<String> = topology
        .resident_keys(SiteId::new(site))
        .into_iter()
        .map(|key| {
            let value = overrides
                .iter()
                .find(|(k, _)| *k == key.as_u64())
                .map_or(topology.initial_value(key), |(_, v)| *v);
            format!("x{}: {}", key.as_u64(), value)
        })
        .collect();
    format!("site {site} - {}", entries.join(", "))
}

fn state_of(run: &SimRun, tx: u64) -> TransactionState {
    run.manager.transaction(TxId::new(tx)).unwrap().state()
}

fn value_at(run: &SimRun, site: u64, key: u64) -> i64 {
    run.coordinator
        .last_committed(SiteId::new(site), KeyId::new(key))
        .unwrap()
        .value
}

#[test]
fn unreplicated_write_lands_only_at_the_home_site() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .write(1, 3, 111)
            .end(1)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[0], "T1 writes x3: sites: [4]");
    assert_eq!(lines[1], "T1 commits");
    for site in 1..=10 {
        let overrides: &[(u64, i64)] = if site == 4 { &[(3, 111)] } else { &[] };
        assert_eq!(lines[1 + site as usize], dump_line(site, overrides));
    }
}

#[test]
fn replicated_write_lands_everywhere() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .write(1, 4, 111)
            .end(1)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[0], "T1 writes x4: sites: [1 2 3 4 5 6 7 8 9 10]");
    assert_eq!(lines[1], "T1 commits");
    for site in 1..=10 {
        assert_eq!(lines[1 + site as usize], dump_line(site, &[(4, 111)]));
    }
}

#[test]
fn first_committer_wins_between_concurrent_writers() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .begin(2)
            .write(1, 3, 111)
            .write(2, 3, 222)
            .end(2)
            .end(1)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[0], "T1 writes x3: sites: [4]");
    assert_eq!(lines[1], "T2 writes x3: sites: [4]");
    assert_eq!(lines[2], "T2 commits");
    assert_eq!(lines[3], "T1 aborts: Write to x3 was stale at site 4");
    assert_eq!(lines[4 + 3], dump_line(4, &[(3, 222)]));
    assert_eq!(state_of(&run, 1), TransactionState::Aborted);
    assert_eq!(state_of(&run, 2), TransactionState::Committed);
}

#[test]
fn snapshot_reads_are_pinned_to_the_transaction_start() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .write(1, 4, 111)
            .end(1)
            .begin(3)
            .begin(2)
            .write(2, 4, 222)
            .end(2)
            .begin(4)
            .read(3, 4)
            .read(4, 4)
            .build(),
    );
    let lines = run.lines();
    // T3 began between the two commits, T4 after both.
    assert_eq!(lines[lines.len() - 2], "x4: 111");
    assert_eq!(lines[lines.len() - 1], "x4: 222");
}

#[test]
fn read_waits_when_every_copy_is_down_and_replays_on_recovery() {
    let mut script = TraceScript::new().begin(2);
    for site in 1..=10 {
        script = script.fail(site);
    }
    let run = run_trace(&script.read(2, 8).recover(2).end(2).build());
    assert_eq!(run.lines(), vec!["T2 waits", "x8: 80", "T2 commits"]);
    assert_eq!(state_of(&run, 2), TransactionState::Committed);
}

#[test]
fn unreplicated_read_waits_for_its_one_site() {
    let run = run_trace(
        &TraceScript::new()
            .fail(10)
            .begin(2)
            .read(2, 9)
            .end(2)
            .recover(10)
            .build(),
    );
    // The queued read and end replay in order at the recovery tick.
    assert_eq!(
        run.lines(),
        vec!["T2 waits", "T2 waiting", "x9: 90", "T2 commits"]
    );
}

#[test]
fn operations_queued_while_waiting_replay_in_order() {
    let run = run_trace(
        &TraceScript::new()
            .fail(4)
            .fail(6)
            .begin(2)
            .write(2, 3, 333)
            .write(2, 5, 555)
            .recover(4)
            .recover(6)
            .end(2)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[0], "T2 waits");
    assert_eq!(lines[1], "T2 waiting");
    // recover(4): the x3 write lands, the x5 write re-blocks.
    assert_eq!(lines[2], "T2 writes x3: sites: [4]");
    assert_eq!(lines[3], "T2 waits");
    // recover(6): the x5 write lands.
    assert_eq!(lines[4], "T2 writes x5: sites: [6]");
    assert_eq!(lines[5], "T2 commits");
    assert_eq!(value_at(&run, 4, 3), 333);
    assert_eq!(value_at(&run, 6, 5), 555);
}

#[test]
fn dangerous_structure_aborts_the_closing_transaction() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .begin(2)
            .begin(3)
            .read(1, 2)
            .write(2, 2, 1)
            .read(2, 4)
            .write(3, 4, 1)
            .read(3, 6)
            .write(1, 6, 1)
            .end(1)
            .end(2)
            .end(3)
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[lines.len() - 3], "T1 commits");
    assert_eq!(lines[lines.len() - 2], "T2 commits");
    assert_eq!(lines[lines.len() - 1], "T3 aborts: Tx: 3, RW cycle detected");
    assert_eq!(state_of(&run, 3), TransactionState::Aborted);
    // The rejected write never reached a data manager.
    assert_eq!(value_at(&run, 1, 4), 40);
}

#[test]
fn outage_after_a_write_aborts_the_writer() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .write(1, 4, 91)
            .fail(2)
            .end(1)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[1], "T1 aborts: Site 2 was down between write to x4 and commit");
    assert_eq!(lines[2], dump_line(1, &[]));
    assert_eq!(value_at(&run, 1, 4), 40);
}

#[test]
fn aborted_writes_leave_no_trace_in_the_dump() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .begin(2)
            .write(1, 8, 91)
            .write(2, 8, 88)
            .end(1)
            .end(2)
            .dump()
            .build(),
    );
    let lines = run.lines();
    assert_eq!(lines[2], "T1 commits");
    assert_eq!(lines[3], "T2 aborts: Write to x8 was stale at site 1");
    for site in 1..=10 {
        assert_eq!(lines[3 + site as usize], dump_line(site, &[(8, 91)]));
    }
}

#[test]
fn reads_abort_when_every_replica_recovered_past_the_snapshot() {
    // Every copy of x2 failed and recovered after its last commit, so
    // no site can prove it holds the snapshot version.
    let mut script = TraceScript::new();
    for site in 1..=10 {
        script = script.fail(site);
    }
    for site in 1..=10 {
        script = script.recover(site);
    }
    let run = run_trace(&script.begin(2).read(2, 2).build());
    assert_eq!(run.lines(), vec!["T2 aborts"]);
    assert_eq!(state_of(&run, 2), TransactionState::Aborted);
}

#[test]
fn operations_on_a_finished_transaction_report_already_aborted() {
    let mut script = TraceScript::new();
    for site in 1..=10 {
        script = script.fail(site);
    }
    for site in 1..=10 {
        script = script.recover(site);
    }
    let run = run_trace(
        &script
            .begin(2)
            .read(2, 2)
            .read(2, 4)
            .write(2, 4, 1)
            .end(2)
            .build(),
    );
    assert_eq!(
        run.lines(),
        vec![
            "T2 aborts",
            "T2 already aborted",
            "T2 already aborted",
            "T2 already aborted",
        ]
    );
}

#[test]
fn duplicate_recoveries_are_idempotent() {
    let once = run_trace(
        &TraceScript::new()
            .fail(10)
            .begin(1)
            .read(1, 9)
            .recover(10)
            .dump()
            .build(),
    );
    let twice = run_trace(
        &TraceScript::new()
            .fail(10)
            .begin(1)
            .read(1, 9)
            .recover(10)
            .recover(10)
            .dump()
            .build(),
    );
    assert_eq!(once.output, twice.output);
}

#[test]
fn dump_never_mutates_state() {
    let run = run_trace(
        &TraceScript::new()
            .begin(1)
            .write(1, 4, 7)
            .end(1)
            .dump()
            .dump()
            .build(),
    );
    let lines = run.lines();
    let first: Vec<&str> = lines[2..12].to_vec();
    let second: Vec<&str> = lines[12..22].to_vec();
    assert_eq!(first, second);
}

#[test]
fn comments_and_blanks_are_free() {
    let run = run_trace(
        &TraceScript::new()
            .comment("warm-up")
            .blank()
            .raw("/*")
            .raw("ignored(T1)")
            .raw("*/")
            .begin(1)
            .read(1, 2)
            .build(),
    );
    assert_eq!(run.lines(), vec!["x2: 20"]);
}

#[test]
fn unknown_transactions_halt_the_run() {
    let (run, err) = run_trace_err(&TraceScript::new().read(7, 2).build());
    assert!(run.output.is_empty());
    assert!(matches!(err, SimError::Core(_)));
}

#[test]
fn random_traces_run_clean() {
    for seed in 0..6 {
        let trace = random_trace(seed, 250);
        let run = run_trace(&trace);
        // The trailing dump is stable when run again.
        let again = run_trace(&trace);
        assert_eq!(run.output, again.output, "seed {seed} diverged");
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn arbitrary_traces_run_clean(trace in trace_strategy(1, 120)) {
        // Well-formed traces never halt, and a rerun reproduces the
        // output byte for byte.
        let run = run_trace(&trace);
        let again = run_trace(&trace);
        prop_assert_eq!(run.output, again.output);
    }

    #[test]
    fn arbitrary_traces_keep_dumps_stable(trace in trace_strategy(1, 80)) {
        // Appending a second trailing dump adds exactly one repetition
        // of the last ten lines.
        let run = run_trace(&trace);
        let doubled = run_trace(&format!("{trace}dump\n"));
        let lines = run.lines();
        let site_lines = &lines[lines.len() - 10..];
        let doubled_lines = doubled.lines();
        prop_assert_eq!(site_lines, &doubled_lines[doubled_lines.len() - 10..]);
        prop_assert_eq!(doubled_lines.len(), lines.len() + 10);
    }
}

//! Tick-driven simulation runner.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::debug;

use replidb_core::{SiteCoordinator, Tick, Topology, TransactionManager};

use crate::command::{Command, CommandParser};
use crate::error::SimResult;
use crate::report::TraceWriter;

/// Owns the engine and the sink, and drives one command per tick.
///
/// The logical clock starts at 1 and advances by one per command; lines
/// that carry no command (blanks, comments) do not consume a tick. On
/// `recover` the coordinator is told first, then the transaction
/// manager replays blocked transactions and the replay outcomes are
/// rendered in order.
pub struct Simulation<W: Write> {
    coordinator: Arc<SiteCoordinator>,
    manager: TransactionManager,
    trace: TraceWriter<W>,
    echo: bool,
}

impl<W: Write> Simulation<W> {
    /// Creates a simulation over a fresh cluster, writing outcomes to
    /// `out`.
    #[must_use]
    pub fn new(topology: Topology, out: W) -> Self {
        let coordinator = Arc::new(SiteCoordinator::new(topology));
        let manager = TransactionManager::new(Arc::clone(&coordinator));
        Self {
            coordinator,
            manager,
            trace: TraceWriter::new(out),
            echo: false,
        }
    }

    /// Echo each input line to the sink before its outcome.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// The shared site coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<SiteCoordinator> {
        &self.coordinator
    }

    /// The transaction manager.
    #[must_use]
    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Tears the simulation apart for post-run inspection.
    #[must_use]
    pub fn into_parts(self) -> (Arc<SiteCoordinator>, TransactionManager, W) {
        (self.coordinator, self.manager, self.trace.into_inner())
    }

    /// Runs every command in `input` to completion.
    ///
    /// Stops at the first parse error, engine error, or sink failure.
    pub fn run<R: BufRead>(&mut self, input: R) -> SimResult<()> {
        let mut parser = CommandParser::new();
        let mut tick = 1_i64;
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            if self.echo {
                self.trace.line(&line)?;
            }
            let number = index as u64 + 1;
            let Some(command) = parser.parse_line(number, &line)? else {
                continue;
            };
            debug!(tick, ?command, "dispatch");
            self.dispatch(command, Tick::new(tick))?;
            tick += 1;
        }
        Ok(())
    }

    fn dispatch(&mut self, command: Command, at: Tick) -> SimResult<()> {
        match command {
            Command::Begin { tx } => {
                self.manager.begin(tx, at)?;
            }
            Command::End { tx } => {
                let outcome = self.manager.end(tx, at)?;
                self.trace.end_outcome(tx, &outcome)?;
            }
            Command::Write { tx, key, value } => {
                let outcome = self.manager.write(tx, key, value, at)?;
                self.trace.write_outcome(tx, key, &outcome)?;
            }
            Command::Read { tx, key } => {
                let outcome = self.manager.read(tx, key, at)?;
                self.trace.read_outcome(tx, key, &outcome)?;
            }
            Command::Fail { site } => {
                self.coordinator.fail(site, at)?;
            }
            Command::Recover { site } => {
                self.coordinator.recover(site, at)?;
                for event in self.manager.recover(site, at)? {
                    self.trace.replay_event(&event)?;
                }
            }
            Command::Dump => {
                self.trace.line(&self.coordinator.dump())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(trace: &str) -> String {
        let mut simulation = Simulation::new(Topology::default(), Vec::new());
        simulation.run(Cursor::new(trace)).unwrap();
        let (_, _, out) = simulation.into_parts();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn a_minimal_round_trip() {
        let out = run("begin(T1)\nR(T1, x2)\nend(T1)\n");
        assert_eq!(out, "x2: 20\nT1 commits\n");
    }

    #[test]
    fn comments_do_not_consume_ticks() {
        // With comments skipped, T1 still begins at tick 1 and its
        // write certifies against tick 3.
        let out = run("// preamble\nbegin(T1)\n\nW(T1, x3, 5)\n/* mid */\nend(T1)\n");
        assert_eq!(out, "T1 writes x3: sites: [4]\nT1 commits\n");
    }

    #[test]
    fn echo_reproduces_the_input() {
        let mut simulation = Simulation::new(Topology::default(), Vec::new()).with_echo(true);
        simulation.run(Cursor::new("begin(T1)\nend(T1)\n")).unwrap();
        let (_, _, out) = simulation.into_parts();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "begin(T1)\nend(T1)\nT1 commits\n"
        );
    }

    #[test]
    fn parse_errors_halt_the_run() {
        let mut simulation = Simulation::new(Topology::default(), Vec::new());
        let err = simulation
            .run(Cursor::new("begin(T1)\nnonsense\n"))
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Parse { line: 2, .. }));
    }

    #[test]
    fn unknown_transactions_halt_the_run() {
        let mut simulation = Simulation::new(Topology::default(), Vec::new());
        let err = simulation.run(Cursor::new("R(T5, x2)\n")).unwrap_err();
        assert!(matches!(err, crate::SimError::Core(_)));
    }
}

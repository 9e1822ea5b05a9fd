//! The log sink: renders per-operation outcomes as trace lines.
//!
//! One line per outcome, formats fixed by the trace contract:
//!
//! ```text
//! x4: 40
//! T1 writes x4: sites: [1 2 3 4 5 6 7 8 9 10]
//! T1 commits
//! T1 aborts
//! T1 aborts: Write to x3 was stale at site 4
//! T1 waits
//! T1 waiting
//! T1 already aborted
//! ```

use std::io::{self, Write};

use replidb_core::{
    EndOutcome, KeyId, ReadOutcome, ReplayAction, ReplayEvent, TxId, WriteOutcome,
};

/// Writes outcome lines to any sink.
#[derive(Debug)]
pub struct TraceWriter<W: Write> {
    out: W,
}

impl<W: Write> TraceWriter<W> {
    /// Creates a writer over `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consumes the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes one raw line (input echo, dump passthrough).
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    /// Renders a read outcome.
    pub fn read_outcome(&mut self, tx: TxId, key: KeyId, outcome: &ReadOutcome) -> io::Result<()> {
        match outcome {
            ReadOutcome::Value(value) => writeln!(self.out, "{key}: {value}"),
            ReadOutcome::Abort => writeln!(self.out, "{tx} aborts"),
            ReadOutcome::Wait => writeln!(self.out, "{tx} waits"),
            ReadOutcome::Waiting => writeln!(self.out, "{tx} waiting"),
            ReadOutcome::AlreadyAborted => writeln!(self.out, "{tx} already aborted"),
        }
    }

    /// Renders a write outcome.
    pub fn write_outcome(
        &mut self,
        tx: TxId,
        key: KeyId,
        outcome: &WriteOutcome,
    ) -> io::Result<()> {
        match outcome {
            WriteOutcome::Applied(sites) => {
                let sites: Vec<String> = sites.iter().map(ToString::to_string).collect();
                writeln!(self.out, "{tx} writes {key}: sites: [{}]", sites.join(" "))
            }
            WriteOutcome::Wait => writeln!(self.out, "{tx} waits"),
            WriteOutcome::Waiting => writeln!(self.out, "{tx} waiting"),
            WriteOutcome::AlreadyAborted => writeln!(self.out, "{tx} already aborted"),
        }
    }

    /// Renders an end outcome.
    pub fn end_outcome(&mut self, tx: TxId, outcome: &EndOutcome) -> io::Result<()> {
        match outcome {
            EndOutcome::Committed => writeln!(self.out, "{tx} commits"),
            EndOutcome::Abort(reason) => writeln!(self.out, "{tx} aborts: {reason}"),
            EndOutcome::Waiting => writeln!(self.out, "{tx} waiting"),
            EndOutcome::NotActive => writeln!(self.out, "{tx} already aborted"),
        }
    }

    /// Renders one replayed operation exactly like its live equivalent.
    pub fn replay_event(&mut self, event: &ReplayEvent) -> io::Result<()> {
        match &event.action {
            ReplayAction::Read { key, outcome } => self.read_outcome(event.tx, *key, outcome),
            ReplayAction::Write { key, outcome } => self.write_outcome(event.tx, *key, outcome),
            ReplayAction::End { outcome } => self.end_outcome(event.tx, outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replidb_core::{AbortReason, SiteId};

    fn rendered(write: impl FnOnce(&mut TraceWriter<Vec<u8>>)) -> String {
        let mut writer = TraceWriter::new(Vec::new());
        write(&mut writer);
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn read_lines() {
        let out = rendered(|w| {
            w.read_outcome(TxId::new(1), KeyId::new(4), &ReadOutcome::Value(40))
                .unwrap();
            w.read_outcome(TxId::new(2), KeyId::new(4), &ReadOutcome::Wait)
                .unwrap();
        });
        assert_eq!(out, "x4: 40\nT2 waits\n");
    }

    #[test]
    fn write_lines_list_sites_space_separated() {
        let sites = vec![SiteId::new(1), SiteId::new(2), SiteId::new(10)];
        let out = rendered(|w| {
            w.write_outcome(TxId::new(3), KeyId::new(6), &WriteOutcome::Applied(sites))
                .unwrap();
        });
        assert_eq!(out, "T3 writes x6: sites: [1 2 10]\n");
    }

    #[test]
    fn end_lines_carry_reasons() {
        let out = rendered(|w| {
            w.end_outcome(TxId::new(1), &EndOutcome::Committed).unwrap();
            w.end_outcome(
                TxId::new(2),
                &EndOutcome::Abort(AbortReason::StaleWrite {
                    key: KeyId::new(3),
                    site: SiteId::new(4),
                }),
            )
            .unwrap();
            w.end_outcome(TxId::new(3), &EndOutcome::NotActive).unwrap();
        });
        assert_eq!(
            out,
            "T1 commits\nT2 aborts: Write to x3 was stale at site 4\nT3 already aborted\n"
        );
    }
}

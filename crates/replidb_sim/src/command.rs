//! Trace command grammar and tokenizer.
//!
//! One command per line. Blank lines and `//` line comments are
//! skipped; `/*` opens a block comment that closes on a line ending
//! with `*/`. Skipped lines do not consume a tick.

use replidb_core::{KeyId, SiteId, TxId};

use crate::error::{SimError, SimResult};

/// A typed trace command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `begin(Ti)` — begin transaction `i`.
    Begin {
        /// The transaction to begin.
        tx: TxId,
    },
    /// `end(Ti)` — attempt to commit transaction `i`.
    End {
        /// The transaction to end.
        tx: TxId,
    },
    /// `W(Ti, xk, v)` — write `v` to key `k` in transaction `i`.
    Write {
        /// The writing transaction.
        tx: TxId,
        /// The written key.
        key: KeyId,
        /// The written value.
        value: i64,
    },
    /// `R(Ti, xk)` — read key `k` in transaction `i`.
    Read {
        /// The reading transaction.
        tx: TxId,
        /// The read key.
        key: KeyId,
    },
    /// `fail(s)` — site `s` fails.
    Fail {
        /// The failing site.
        site: SiteId,
    },
    /// `recover(s)` — site `s` recovers.
    Recover {
        /// The recovering site.
        site: SiteId,
    },
    /// `dump` — emit the full snapshot.
    Dump,
}

/// Line tokenizer with block-comment state.
#[derive(Debug, Default)]
pub struct CommandParser {
    in_block_comment: bool,
}

impl CommandParser {
    /// Creates a parser outside any block comment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes one line.
    ///
    /// Returns `Ok(None)` for lines that carry no command (blank,
    /// comments); `number` is the 1-based line number used in parse
    /// errors.
    pub fn parse_line(&mut self, number: u64, line: &str) -> SimResult<Option<Command>> {
        let trimmed = line.trim();
        if self.in_block_comment {
            if trimmed.ends_with("*/") {
                self.in_block_comment = false;
            }
            return Ok(None);
        }
        if let Some(rest) = trimmed.strip_prefix("/*") {
            // A block comment may open and close on one line.
            if !rest.ends_with("*/") {
                self.in_block_comment = true;
            }
            return Ok(None);
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            return Ok(None);
        }
        match parse_command(trimmed) {
            Some(command) => Ok(Some(command)),
            None => Err(SimError::Parse {
                line: number,
                text: line.to_string(),
            }),
        }
    }
}

fn parse_command(text: &str) -> Option<Command> {
    if text == "dump" {
        return Some(Command::Dump);
    }
    let (name, args) = split_call(text)?;
    match (name, args.as_slice()) {
        ("begin", [tx]) => Some(Command::Begin { tx: parse_tx(tx)? }),
        ("end", [tx]) => Some(Command::End { tx: parse_tx(tx)? }),
        ("W", [tx, key, value]) => Some(Command::Write {
            tx: parse_tx(tx)?,
            key: parse_key(key)?,
            value: value.parse().ok()?,
        }),
        ("R", [tx, key]) => Some(Command::Read {
            tx: parse_tx(tx)?,
            key: parse_key(key)?,
        }),
        ("fail", [site]) => Some(Command::Fail {
            site: parse_site(site)?,
        }),
        ("recover", [site]) => Some(Command::Recover {
            site: parse_site(site)?,
        }),
        _ => None,
    }
}

/// Splits `name(a, b, c)` into the name and trimmed arguments.
fn split_call(text: &str) -> Option<(&str, Vec<&str>)> {
    let open = text.find('(')?;
    let inner = text[open + 1..].strip_suffix(')')?;
    let name = text[..open].trim();
    let args = inner.split(',').map(str::trim).collect();
    Some((name, args))
}

fn parse_tx(arg: &str) -> Option<TxId> {
    arg.strip_prefix('T')?.parse().ok().map(TxId::new)
}

fn parse_key(arg: &str) -> Option<KeyId> {
    arg.strip_prefix('x')?.parse().ok().map(KeyId::new)
}

fn parse_site(arg: &str) -> Option<SiteId> {
    arg.parse().ok().map(SiteId::new)
}

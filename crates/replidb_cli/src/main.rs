//! ReplicaDB CLI
//!
//! Runs a command trace against a fresh simulated cluster and writes
//! each operation's outcome to stdout. Reads the trace from a file
//! when a path is given, from stdin otherwise.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use replidb_core::Topology;
use replidb_sim::Simulation;

/// Replicated key-value transaction simulator.
#[derive(Parser)]
#[command(name = "replidb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the command trace (stdin when omitted)
    trace: Option<PathBuf>,

    /// Echo each input line before its outcome
    #[arg(long)]
    echo: bool,

    /// Enable verbose diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let input = match open_input(cli.trace.as_deref()) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("replidb: {err}");
            return ExitCode::FAILURE;
        }
    };
    debug!(trace = ?cli.trace, "starting simulation");

    let stdout = io::stdout();
    let mut simulation =
        Simulation::new(Topology::default(), stdout.lock()).with_echo(cli.echo);
    match simulation.run(input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("replidb: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open_input(path: Option<&Path>) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

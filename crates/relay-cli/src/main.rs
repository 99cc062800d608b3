//! CLI entrypoint for the editor relay.
//!
//! Delegates to [`relay_cli::run`], which loads configuration, runs one
//! command against the configured editor and prints the result as JSON.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    relay_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}

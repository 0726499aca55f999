//! Quire - command-line static site builder

use std::process::ExitCode;

use quire::cli;

fn main() -> ExitCode {
    cli::run()
}

//! Cinder CLI entry point.
//!
//! `cinder <script>` runs a file; `cinder` alone starts the REPL. Exit
//! codes follow the BSD sysexits convention: 65 for compile errors, 70
//! for runtime errors, 74 for unreadable files.

use clap::Parser;
use cinder_cli::{driver, repl, Cli, CliError};

fn main() {
    let cli = Cli::parse();

    let result = match cli.script {
        Some(path) => driver::run_file(&path),
        None => repl::run_repl(),
    };

    if let Err(error) = result {
        // Interpreter failures have already been reported in detail.
        if let CliError::Io { .. } | CliError::Readline(_) = &error {
            eprintln!("{}", error);
        }
        std::process::exit(error.exit_code());
    }
}

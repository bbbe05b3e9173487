//! Cinder CLI library.
//!
//! Provides the argument definitions, the script driver, and the REPL
//! behind the `cinder` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod driver;
pub mod error;
pub mod repl;

pub use cli::Cli;
pub use error::{CliError, CliResult};

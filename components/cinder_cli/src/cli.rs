//! Command line argument definitions.

use clap::Parser;

/// The Cinder scripting language.
///
/// With a script path, compiles and runs it. Without arguments, starts
/// the interactive REPL.
#[derive(Debug, Parser)]
#[command(name = "cinder", version, about)]
pub struct Cli {
    /// Script file to execute
    pub script: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_path() {
        let cli = Cli::parse_from(["cinder", "demo.cin"]);
        assert_eq!(cli.script.as_deref(), Some("demo.cin"));
    }

    #[test]
    fn test_parse_no_arguments() {
        let cli = Cli::parse_from(["cinder"]);
        assert!(cli.script.is_none());
    }
}

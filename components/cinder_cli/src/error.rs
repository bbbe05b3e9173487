//! CLI error types and exit-code mapping.

use interpreter::InterpretError;

/// Conventional process exit codes (BSD sysexits, as used by the driver).
pub mod exit_code {
    /// Successful run
    pub const OK: i32 = 0;
    /// Command line usage error
    pub const USAGE: i32 = 64;
    /// Source failed to compile
    pub const COMPILE_ERROR: i32 = 65;
    /// Execution failed at runtime
    pub const RUNTIME_ERROR: i32 = 70;
    /// Script file could not be read
    pub const IO_ERROR: i32 = 74;
}

/// Errors surfaced by the CLI driver.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The script file could not be read
    #[error("Could not read file \"{path}\": {source}")]
    Io {
        /// Path the driver tried to read
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Compilation or execution failed
    #[error(transparent)]
    Interpret(#[from] InterpretError),

    /// The interactive editor failed
    #[error("readline error: {0}")]
    Readline(String),
}

impl CliError {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io { .. } => exit_code::IO_ERROR,
            CliError::Interpret(InterpretError::Compile(_)) => exit_code::COMPILE_ERROR,
            CliError::Interpret(InterpretError::Runtime(_)) => exit_code::RUNTIME_ERROR,
            CliError::Readline(_) => exit_code::USAGE,
        }
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::RuntimeError;

    #[test]
    fn test_exit_codes() {
        let compile = CliError::Interpret(InterpretError::Compile(vec![]));
        assert_eq!(compile.exit_code(), 65);

        let runtime = CliError::Interpret(InterpretError::Runtime(RuntimeError {
            message: "Stack overflow.".to_string(),
            backtrace: vec![],
        }));
        assert_eq!(runtime.exit_code(), 70);

        let io = CliError::Io {
            path: "missing.cin".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(io.exit_code(), 74);
    }
}

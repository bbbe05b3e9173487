//! Interpreter error types.

use core_types::{Diagnostic, RuntimeError};

/// The outcome of a failed [`crate::Vm::interpret`] call.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    /// The source did not compile; carries every collected diagnostic.
    #[error("compile error")]
    Compile(Vec<Diagnostic>),

    /// Execution failed at runtime; the VM has already reported the
    /// message and backtrace and reset its stack.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_is_transparent() {
        let error: InterpretError =
            RuntimeError { message: "Stack overflow.".to_string(), backtrace: vec![] }.into();
        assert_eq!(error.to_string(), "Stack overflow.");
    }
}

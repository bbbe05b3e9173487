//! Cinder error types.
//!
//! Compile errors are collected as [`Diagnostic`] values rendered in the
//! `[line N] Error at 'lexeme': message` form. Runtime failures are fatal
//! to the current run and carry a frame-by-frame backtrace.

use std::fmt;

/// Where in the token stream a compile error was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The error was reported at the end of the source.
    AtEnd,
    /// The error was reported at a token with this lexeme.
    At(String),
    /// The error came from an error token; no lexeme is shown.
    None,
}

/// A single compile error with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source line the offending token was on
    pub line: u32,
    /// Which token the error is attached to
    pub location: ErrorLocation,
    /// Human-readable error message
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            ErrorLocation::AtEnd => write!(f, " at end")?,
            ErrorLocation::At(lexeme) => write!(f, " at '{}'", lexeme)?,
            ErrorLocation::None => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// One frame of a runtime error backtrace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Source line of the instruction that was executing
    pub line: u32,
    /// Function name, or `None` for the top-level script
    pub function: Option<String>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A fatal runtime failure.
///
/// Runtime errors unwind every frame: the VM reports the message and the
/// backtrace, resets its stack, and returns this error to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// What went wrong
    pub message: String,
    /// Call frames at the point of failure, innermost first
    pub backtrace: Vec<TraceFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

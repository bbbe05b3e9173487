//! The Cinder compiler: source text to bytecode in a single pass.
//!
//! There is no syntax tree. The lexer hands tokens to a Pratt parser that
//! emits bytecode into the current function's chunk as it goes, resolving
//! names against lexical scope (locals, upvalues, globals) on the spot.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod lexer;
mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{compile, compile_with_roots};

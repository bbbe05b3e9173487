//! The Cinder virtual machine.
//!
//! Executes compiled bytecode on a value stack with call frames, closures
//! with upvalue capture, class and method dispatch, and a precise GC
//! driven from the VM's allocation safepoints.
//!
//! [`Vm::interpret`] is the single entry point: it compiles a source
//! buffer as a zero-arity script, wraps it in a closure, and runs it to
//! completion.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod call_frame;
mod error;
pub mod natives;
mod vm;

pub use error::InterpretError;
pub use vm::{Vm, VmOptions, FRAMES_MAX, STACK_MAX};

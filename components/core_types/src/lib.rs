//! Core Cinder value types and error handling.
//!
//! This crate provides the foundational types for the Cinder runtime,
//! including the tagged value representation, heap object handles, and
//! the error types shared by the compiler and the virtual machine.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of Cinder values
//! - [`ObjRef`] - Handle to a garbage-collected heap object
//! - [`Diagnostic`] - A compile error with its source location
//! - [`RuntimeError`] - A fatal runtime failure with a backtrace

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{Diagnostic, ErrorLocation, RuntimeError, TraceFrame};
pub use value::{format_number, ObjRef, Value};

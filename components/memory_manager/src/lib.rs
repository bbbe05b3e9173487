//! Memory management for the Cinder runtime.
//!
//! This crate owns every heap object the language can create. It provides:
//!
//! - The object model: tagged heap objects ([`Obj`]) behind [`core_types::ObjRef`]
//!   handles
//! - The [`Heap`]: a slot arena with a precise tri-color mark-sweep
//!   collector and a weak string-interning table
//! - [`Table`]: the open-addressed hash table keyed by interned strings,
//!   used for globals, class methods, instance fields, and interning
//! - The bytecode disassembler used by the tracing features
//!
//! Collection is initiated from allocation safepoints in the VM and the
//! compiler, which own the GC roots: they mark their roots, then drive
//! [`Heap::trace`] and [`Heap::finish_cycle`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod debug;
mod heap;
mod object;
mod table;

pub use heap::{Heap, GC_HEAP_GROW_FACTOR};
pub use object::{
    BoundMethodObj, ClassObj, ClosureObj, FunctionObj, InstanceObj, NativeContext, NativeFn,
    NativeObj, Obj, StringObj, UpvalueObj,
};
pub use table::{hash_bytes, Table};

//! Built-in native functions.
//!
//! Natives are plain host functions with the [`memory_manager::NativeFn`]
//! signature. They are registered through [`crate::Vm::define_native`],
//! which binds them as globals; none of them allocate on the heap.
//! Per-VM state reaches a native through the [`NativeContext`] the VM
//! passes at call time.

use core_types::Value;
use memory_manager::NativeContext;

/// `clock()` - seconds of monotonic time since the invoking VM was
/// constructed, as a number. Useful for benchmarking scripts.
pub fn clock(ctx: &NativeContext, _args: &[Value]) -> Value {
    Value::Number(ctx.started_at.elapsed().as_secs_f64())
}

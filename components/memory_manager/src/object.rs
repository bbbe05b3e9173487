//! Heap object variants.
//!
//! Every value that lives past a stack slot is one of these objects. The
//! heap stores them in slots addressed by [`ObjRef`] handles; the mark bit
//! lives on the slot, not in the object itself.

use std::time::Instant;

use bytecode_system::Chunk;
use core_types::{ObjRef, Value};

use crate::table::Table;

/// Engine state handed to native functions when they are invoked.
///
/// Natives are plain function pointers, so anything per-VM they need
/// comes through here rather than through process-global state.
#[derive(Debug, Clone, Copy)]
pub struct NativeContext {
    /// When the VM invoking the native was constructed
    pub started_at: Instant,
}

/// A host function callable from Cinder code.
///
/// The argument slice is the call's argument window on the value stack.
/// Natives must not allocate on the heap; heap-valued results go through
/// engine-provided constructors that respect the rooting discipline.
pub type NativeFn = fn(&NativeContext, &[Value]) -> Value;

/// An immutable interned string with its cached FNV-1a hash.
#[derive(Debug)]
pub struct StringObj {
    /// The string contents
    pub chars: String,
    /// FNV-1a-32 hash of the contents
    pub hash: u32,
}

/// A compiled function: its bytecode plus calling metadata.
#[derive(Debug)]
pub struct FunctionObj {
    /// Number of declared parameters (0-255)
    pub arity: u8,
    /// Number of upvalues the function captures
    pub upvalue_count: usize,
    /// The function body's bytecode
    pub chunk: Chunk,
    /// Function name, or `None` for the top-level script
    pub name: Option<ObjRef>,
}

/// A registered host function.
#[derive(Debug)]
pub struct NativeObj {
    /// The host function pointer
    pub function: NativeFn,
}

/// A function paired with its captured upvalues.
///
/// Closures are the only directly callable form of user code; a bare
/// `FunctionObj` is wrapped the moment it is pushed.
#[derive(Debug)]
pub struct ClosureObj {
    /// The wrapped function
    pub function: ObjRef,
    /// Captured upvalues, one handle per `upvalue_count`
    pub upvalues: Vec<ObjRef>,
}

/// A captured variable.
///
/// While the captured stack slot is live the upvalue is *open* and
/// `location` names the slot. When the slot is about to disappear the
/// value migrates into `closed` and reads go there instead.
#[derive(Debug)]
pub struct UpvalueObj {
    /// Index of the captured slot on the value stack
    pub location: usize,
    /// The migrated value once the upvalue is closed
    pub closed: Option<Value>,
    /// Next open upvalue in the VM's list (sorted by descending slot)
    pub next: Option<ObjRef>,
}

impl UpvalueObj {
    /// Whether this upvalue still points at a live stack slot.
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }
}

/// A class: a name and its method table.
#[derive(Debug)]
pub struct ClassObj {
    /// The class name
    pub name: ObjRef,
    /// Methods keyed by interned name
    pub methods: Table,
}

/// An instance of a class with its field table.
#[derive(Debug)]
pub struct InstanceObj {
    /// The instance's class
    pub class: ObjRef,
    /// Fields keyed by interned name
    pub fields: Table,
}

/// A method bound to its receiver, created lazily on property access.
#[derive(Debug)]
pub struct BoundMethodObj {
    /// The receiver instance
    pub receiver: Value,
    /// The bound closure
    pub method: ObjRef,
}

/// A heap object.
#[derive(Debug)]
pub enum Obj {
    /// Interned string
    String(StringObj),
    /// Compiled function
    Function(FunctionObj),
    /// Host function
    Native(NativeObj),
    /// Function plus captured environment
    Closure(ClosureObj),
    /// Captured variable
    Upvalue(UpvalueObj),
    /// Class definition
    Class(ClassObj),
    /// Class instance
    Instance(InstanceObj),
    /// Receiver-paired method
    BoundMethod(BoundMethodObj),
}

impl Obj {
    /// A short name for the object's kind, used by the GC log.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Obj::String(_) => "string",
            Obj::Function(_) => "function",
            Obj::Native(_) => "native",
            Obj::Closure(_) => "closure",
            Obj::Upvalue(_) => "upvalue",
            Obj::Class(_) => "class",
            Obj::Instance(_) => "instance",
            Obj::BoundMethod(_) => "bound method",
        }
    }

    /// Estimated heap footprint in bytes, used for the collection trigger.
    pub fn size_hint(&self) -> usize {
        let base = std::mem::size_of::<Obj>();
        base + match self {
            Obj::String(s) => s.chars.len(),
            Obj::Function(f) => {
                f.chunk.code.len()
                    + f.chunk.lines.len() * std::mem::size_of::<u32>()
                    + f.chunk.constants.len() * std::mem::size_of::<Value>()
            }
            Obj::Native(_) => 0,
            Obj::Closure(c) => c.upvalues.len() * std::mem::size_of::<ObjRef>(),
            Obj::Upvalue(_) => 0,
            Obj::Class(c) => c.methods.footprint(),
            Obj::Instance(i) => i.fields.footprint(),
            Obj::BoundMethod(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upvalue_open_and_closed() {
        let mut uv = UpvalueObj { location: 3, closed: None, next: None };
        assert!(uv.is_open());
        uv.closed = Some(Value::Number(1.0));
        assert!(!uv.is_open());
    }

    #[test]
    fn test_size_hint_grows_with_payload() {
        let small = Obj::String(StringObj { chars: "a".to_string(), hash: 0 });
        let large = Obj::String(StringObj { chars: "a".repeat(100), hash: 0 });
        assert!(large.size_hint() > small.size_hint());
    }
}

//! The garbage-collected heap.
//!
//! Objects live in a slot arena addressed by [`ObjRef`] handles; freed
//! slots go on a free list for reuse. The slot vector doubles as the
//! all-objects list that the sweep phase walks.
//!
//! Collection is a stop-the-world tri-color mark-sweep:
//!
//! 1. The owner of the roots (VM or compiler) marks them via
//!    [`Heap::mark_value`] / [`Heap::mark_object`] / [`Heap::mark_table`].
//! 2. [`Heap::trace`] drains the gray worklist, blackening each object by
//!    marking its referents.
//! 3. [`Heap::finish_cycle`] drops intern-table entries whose keys were
//!    never marked (weak references), sweeps unmarked slots, clears the
//!    mark bits on survivors, and sets the next collection threshold.
//!
//! The heap never initiates a collection itself; allocation safepoints in
//! the VM and the compiler do, because only they know the roots.

use core_types::{format_number, ObjRef, Value};

use crate::object::{Obj, StringObj};
use crate::table::{hash_bytes, Table};

/// After each collection the next threshold is the surviving byte count
/// times this factor.
pub const GC_HEAP_GROW_FACTOR: usize = 2;

/// Threshold for the first collection.
const FIRST_GC_AT: usize = 1024 * 1024;

#[derive(Debug)]
struct Slot {
    obj: Obj,
    marked: bool,
}

/// The object heap with its intern table and collection state.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    bytes_allocated: usize,
    next_gc: usize,
    gray: Vec<ObjRef>,
    /// String intern table; holds weak references (see `finish_cycle`)
    strings: Table,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            bytes_allocated: 0,
            next_gc: FIRST_GC_AT,
            gray: Vec::new(),
            strings: Table::new(),
        }
    }

    /// Bytes currently attributed to live objects.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether the next allocation safepoint should run a collection.
    pub fn should_collect(&self) -> bool {
        if cfg!(feature = "stress_gc") {
            return true;
        }
        self.bytes_allocated > self.next_gc
    }

    /// Allocate an object and return its handle.
    ///
    /// The caller must have passed its GC safepoint first; allocation
    /// itself never collects.
    pub fn alloc(&mut self, obj: Obj) -> ObjRef {
        self.bytes_allocated += obj.size_hint();
        let slot = Slot { obj, marked: false };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        let handle = ObjRef::new(index);
        #[cfg(feature = "log_gc")]
        eprintln!(
            "{:>4} allocate {} for {}",
            index,
            self.obj(handle).size_hint(),
            self.obj(handle).kind_name()
        );
        handle
    }

    /// Borrow the object behind a handle.
    pub fn obj(&self, handle: ObjRef) -> &Obj {
        match &self.slots[handle.index()] {
            Some(slot) => &slot.obj,
            None => unreachable!("dangling object handle"),
        }
    }

    /// Mutably borrow the object behind a handle.
    pub fn obj_mut(&mut self, handle: ObjRef) -> &mut Obj {
        match &mut self.slots[handle.index()] {
            Some(slot) => &mut slot.obj,
            None => unreachable!("dangling object handle"),
        }
    }

    /// Whether the handle survived the current mark phase.
    pub fn is_marked(&self, handle: ObjRef) -> bool {
        match &self.slots[handle.index()] {
            Some(slot) => slot.marked,
            None => false,
        }
    }

    // Typed accessors. The VM checks object kinds before dereferencing,
    // so a mismatch here is a corrupted-bytecode invariant violation.

    /// The string behind `handle`.
    pub fn string(&self, handle: ObjRef) -> &StringObj {
        match self.obj(handle) {
            Obj::String(s) => s,
            _ => unreachable!("expected string object"),
        }
    }

    /// The string contents behind `handle`.
    pub fn string_chars(&self, handle: ObjRef) -> &str {
        &self.string(handle).chars
    }

    /// Intern a borrowed string, returning the canonical handle.
    ///
    /// At most one string object exists per distinct byte sequence, so
    /// handle equality doubles as content equality.
    pub fn intern(&mut self, text: &str) -> ObjRef {
        let hash = hash_bytes(text.as_bytes());
        if let Some(existing) = self.strings.find_key(hash, |key| self.string_chars(key) == text) {
            return existing;
        }
        let handle = self.alloc(Obj::String(StringObj { chars: text.to_string(), hash }));
        // The insertion below allocates no heap objects, so the fresh
        // string cannot be collected out from under it.
        self.strings.set(handle, hash, Value::Nil);
        handle
    }

    /// Intern an owned string, consuming the buffer.
    ///
    /// On an intern hit the buffer is dropped and the existing handle is
    /// returned.
    pub fn intern_owned(&mut self, text: String) -> ObjRef {
        let hash = hash_bytes(text.as_bytes());
        if let Some(existing) = self.strings.find_key(hash, |key| self.string_chars(key) == text) {
            return existing;
        }
        let handle = self.alloc(Obj::String(StringObj { chars: text, hash }));
        self.strings.set(handle, hash, Value::Nil);
        handle
    }

    // ---- Collection ----------------------------------------------------

    /// Begin a collection cycle. Returns the byte count before collecting.
    pub fn begin_cycle(&mut self) -> usize {
        #[cfg(feature = "log_gc")]
        eprintln!("-- gc begin");
        self.bytes_allocated
    }

    /// Mark a value as a root if it references a heap object.
    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(handle) = value {
            self.mark_object(handle);
        }
    }

    /// Mark an object reachable and queue it for tracing.
    pub fn mark_object(&mut self, handle: ObjRef) {
        let slot = match &mut self.slots[handle.index()] {
            Some(slot) => slot,
            None => unreachable!("marking a freed object"),
        };
        if slot.marked {
            return;
        }
        slot.marked = true;
        #[cfg(feature = "log_gc")]
        eprintln!("{:>4} mark {}", handle.index(), slot.obj.kind_name());
        self.gray.push(handle);
    }

    /// Mark every key and value of a table owned outside the heap
    /// (the VM globals).
    pub fn mark_table(&mut self, table: &Table) {
        for (key, _, value) in table.iter() {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Drain the gray worklist, blackening each object.
    pub fn trace(&mut self) {
        while let Some(handle) = self.gray.pop() {
            self.blacken(handle);
        }
    }

    /// Mark everything an already-marked object refers to.
    fn blacken(&mut self, handle: ObjRef) {
        #[cfg(feature = "log_gc")]
        eprintln!("{:>4} blacken {}", handle.index(), self.obj(handle).kind_name());
        let mut children: Vec<Value> = Vec::new();
        match self.obj(handle) {
            Obj::String(_) | Obj::Native(_) => {}
            Obj::Function(function) => {
                if let Some(name) = function.name {
                    children.push(Value::Obj(name));
                }
                children.extend(function.chunk.constants.iter().copied());
            }
            Obj::Closure(closure) => {
                children.push(Value::Obj(closure.function));
                children.extend(closure.upvalues.iter().map(|&uv| Value::Obj(uv)));
            }
            Obj::Upvalue(upvalue) => {
                if let Some(closed) = upvalue.closed {
                    children.push(closed);
                }
            }
            Obj::Class(class) => {
                children.push(Value::Obj(class.name));
                for (key, _, value) in class.methods.iter() {
                    children.push(Value::Obj(key));
                    children.push(value);
                }
            }
            Obj::Instance(instance) => {
                children.push(Value::Obj(instance.class));
                for (key, _, value) in instance.fields.iter() {
                    children.push(Value::Obj(key));
                    children.push(value);
                }
            }
            Obj::BoundMethod(bound) => {
                children.push(bound.receiver);
                children.push(Value::Obj(bound.method));
            }
        }
        for child in children {
            self.mark_value(child);
        }
    }

    /// Finish a collection cycle: drop unmarked intern entries, sweep
    /// unmarked objects, and reset the growth threshold.
    pub fn finish_cycle(&mut self, bytes_before: usize) {
        self.remove_white_strings();
        self.sweep();
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
        #[cfg(feature = "log_gc")]
        eprintln!(
            "-- gc end\n   collected {} bytes (from {} to {}) next at {}",
            bytes_before - self.bytes_allocated,
            bytes_before,
            self.bytes_allocated,
            self.next_gc
        );
        #[cfg(not(feature = "log_gc"))]
        let _ = bytes_before;
    }

    /// The intern table holds weak references: remove entries whose keys
    /// did not survive the mark phase, before sweep frees them.
    fn remove_white_strings(&mut self) {
        let dead: Vec<(ObjRef, u32)> = self
            .strings
            .iter()
            .filter(|&(key, _, _)| !self.is_marked(key))
            .map(|(key, hash, _)| (key, hash))
            .collect();
        for (key, hash) in dead {
            self.strings.delete(key, hash);
        }
    }

    /// Free every unmarked slot and clear the mark bit on survivors.
    fn sweep(&mut self) {
        for index in 0..self.slots.len() {
            let dead = match &self.slots[index] {
                Some(slot) => !slot.marked,
                None => false,
            };
            if dead {
                if let Some(slot) = self.slots[index].take() {
                    #[cfg(feature = "log_gc")]
                    eprintln!("{:>4} free {}", index, slot.obj.kind_name());
                    self.bytes_allocated -= slot.obj.size_hint();
                    self.free.push(index);
                }
            } else if let Some(slot) = &mut self.slots[index] {
                slot.marked = false;
            }
        }
    }

    // ---- Formatting ----------------------------------------------------

    /// Render a value for `print` and the disassembler.
    pub fn format_value(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => if b { "true" } else { "false" }.to_string(),
            Value::Number(n) => format_number(n),
            Value::Obj(handle) => self.format_object(handle),
        }
    }

    fn format_object(&self, handle: ObjRef) -> String {
        match self.obj(handle) {
            Obj::String(s) => s.chars.clone(),
            Obj::Function(f) => self.format_function(f.name),
            Obj::Native(_) => "<native fn>".to_string(),
            Obj::Closure(c) => {
                let function = match self.obj(c.function) {
                    Obj::Function(f) => f,
                    _ => unreachable!("closure over a non-function"),
                };
                self.format_function(function.name)
            }
            Obj::Upvalue(_) => "upvalue".to_string(),
            Obj::Class(c) => self.string_chars(c.name).to_string(),
            Obj::Instance(i) => {
                let class = match self.obj(i.class) {
                    Obj::Class(c) => c,
                    _ => unreachable!("instance of a non-class"),
                };
                format!("{} instance", self.string_chars(class.name))
            }
            Obj::BoundMethod(b) => {
                let closure = match self.obj(b.method) {
                    Obj::Closure(c) => c,
                    _ => unreachable!("bound method over a non-closure"),
                };
                let function = match self.obj(closure.function) {
                    Obj::Function(f) => f,
                    _ => unreachable!("closure over a non-function"),
                };
                self.format_function(function.name)
            }
        }
    }

    fn format_function(&self, name: Option<ObjRef>) -> String {
        match name {
            Some(name) => format!("<fn {}>", self.string_chars(name)),
            None => "<script>".to_string(),
        }
    }
}

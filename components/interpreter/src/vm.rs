//! The bytecode interpreter.
//!
//! A `Vm` owns the value stack, the frame stack, the globals table, the
//! open-upvalue list, and the heap. It is the owner of every GC root, so
//! collections are initiated here: each allocation goes through a
//! safepoint that marks the roots and drives the heap's collection
//! phases when the heap asks for one.

use std::io::{self, Write};
use std::time::Instant;

use bytecode_system::OpCode;
use compiler::compile_with_roots;
use core_types::{ObjRef, RuntimeError, TraceFrame, Value};
use memory_manager::{
    BoundMethodObj, ClassObj, ClosureObj, Heap, InstanceObj, NativeContext, NativeFn, NativeObj,
    Obj, Table, UpvalueObj,
};

use crate::call_frame::CallFrame;
use crate::error::InterpretError;
use crate::natives;

/// Maximum call depth.
pub const FRAMES_MAX: usize = 64;
/// Value stack capacity: one full window per frame.
pub const STACK_MAX: usize = FRAMES_MAX * (u8::MAX as usize + 1);

/// Output streams for the VM.
///
/// `print` writes to `stdout`; runtime errors, backtraces, and the
/// tracing features write to `stderr`. Tests inject buffers here.
pub struct VmOptions {
    /// Destination for `print`
    pub stdout: Box<dyn Write>,
    /// Destination for error reports and traces
    pub stderr: Box<dyn Write>,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions { stdout: Box::new(io::stdout()), stderr: Box::new(io::stderr()) }
    }
}

/// How a callee should be invoked, read out of the heap before the
/// mutable call machinery runs.
enum CallAction {
    Bound(Value, ObjRef),
    Class,
    Closure,
    Native(NativeFn),
    NotCallable,
}

/// The Cinder virtual machine.
pub struct Vm {
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: Table,
    /// Head of the open-upvalue list, sorted by descending stack slot
    open_upvalues: Option<ObjRef>,
    heap: Heap,
    /// The interned `"init"` string, kept alive for constructor lookup
    init_string: ObjRef,
    /// Construction time, handed to natives such as `clock`
    start: Instant,
    opts: VmOptions,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

impl Vm {
    /// Create a VM with the given output streams and register the
    /// built-in natives.
    pub fn new(opts: VmOptions) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        let mut vm = Vm {
            frames: Vec::with_capacity(FRAMES_MAX),
            stack: Vec::with_capacity(STACK_MAX),
            globals: Table::new(),
            open_upvalues: None,
            heap,
            init_string,
            start: Instant::now(),
            opts,
        };
        vm.define_native("clock", natives::clock);
        vm
    }

    /// Compile and run a source buffer as a top-level script.
    ///
    /// Globals persist across calls, so a driver can feed a REPL line by
    /// line through the same VM.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        // The VM's persistent state must survive collections triggered
        // while compiling: the globals table and the "init" string. The
        // value stack is empty between runs, so it contributes nothing.
        let globals = &self.globals;
        let init_string = self.init_string;
        let function = compile_with_roots(source, &mut self.heap, &mut |heap| {
            heap.mark_table(globals);
            heap.mark_object(init_string);
        })
        .map_err(InterpretError::Compile)?;

        self.push(Value::Obj(function));
        let closure = self.alloc(Obj::Closure(ClosureObj { function, upvalues: Vec::new() }));
        self.pop();
        self.push(Value::Obj(closure));
        self.call_closure(closure, 0)?;

        self.run().map_err(InterpretError::Runtime)
    }

    /// Register a host function as a global.
    ///
    /// Both the name and the wrapper are kept on the stack across the
    /// second allocation so a collection cannot reclaim them.
    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        let name_ref = self.intern(name);
        self.push(Value::Obj(name_ref));
        let native = self.alloc(Obj::Native(NativeObj { function }));
        self.push(Value::Obj(native));
        let hash = self.heap.string(name_ref).hash;
        self.globals.set(name_ref, hash, Value::Obj(native));
        self.pop();
        self.pop();
    }

    /// Read a global by name, if bound. Primarily for embedding and tests.
    pub fn get_global(&mut self, name: &str) -> Option<Value> {
        let name_ref = self.intern(name);
        let hash = self.heap.string(name_ref).hash;
        self.globals.get(name_ref, hash)
    }

    /// The VM's heap, for embedders that need to inspect values.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    // ---- Stack ---------------------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("non-empty stack")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues = None;
    }

    // ---- GC safepoints -------------------------------------------------

    /// Allocate through a safepoint: collect first if the heap asks.
    fn alloc(&mut self, obj: Obj) -> ObjRef {
        self.safepoint();
        self.heap.alloc(obj)
    }

    fn intern(&mut self, text: &str) -> ObjRef {
        self.safepoint();
        self.heap.intern(text)
    }

    fn intern_owned(&mut self, text: String) -> ObjRef {
        self.safepoint();
        self.heap.intern_owned(text)
    }

    fn safepoint(&mut self) {
        if !self.heap.should_collect() {
            return;
        }
        self.collect_garbage();
    }

    /// Mark every root, then drive the heap through trace and sweep.
    ///
    /// Roots: every stack value, every frame's closure, the open-upvalue
    /// list, the globals table, and the interned `"init"` string. (The
    /// compiler marks its own chain during compilation.)
    fn collect_garbage(&mut self) {
        let before = self.heap.begin_cycle();

        for &value in &self.stack {
            self.heap.mark_value(value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        let mut upvalue = self.open_upvalues;
        while let Some(handle) = upvalue {
            self.heap.mark_object(handle);
            upvalue = self.upvalue(handle).next;
        }
        self.heap.mark_table(&self.globals);
        self.heap.mark_object(self.init_string);

        self.heap.trace();
        self.heap.finish_cycle(before);
    }

    // ---- Typed heap reads ----------------------------------------------

    fn function_arity(&self, function: ObjRef) -> usize {
        match self.heap.obj(function) {
            Obj::Function(f) => f.arity as usize,
            _ => unreachable!("expected function object"),
        }
    }

    fn closure_function(&self, closure: ObjRef) -> ObjRef {
        match self.heap.obj(closure) {
            Obj::Closure(c) => c.function,
            _ => unreachable!("expected closure object"),
        }
    }

    fn upvalue(&self, handle: ObjRef) -> &UpvalueObj {
        match self.heap.obj(handle) {
            Obj::Upvalue(u) => u,
            _ => unreachable!("expected upvalue object"),
        }
    }

    fn is_instance(&self, value: Value) -> Option<ObjRef> {
        match value {
            Value::Obj(handle) if matches!(self.heap.obj(handle), Obj::Instance(_)) => Some(handle),
            _ => None,
        }
    }

    fn is_class(&self, value: Value) -> Option<ObjRef> {
        match value {
            Value::Obj(handle) if matches!(self.heap.obj(handle), Obj::Class(_)) => Some(handle),
            _ => None,
        }
    }

    fn is_string(&self, value: Value) -> Option<ObjRef> {
        match value {
            Value::Obj(handle) if matches!(self.heap.obj(handle), Obj::String(_)) => Some(handle),
            _ => None,
        }
    }

    // ---- Bytecode fetch ------------------------------------------------

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active frame");
        let function = match self.heap.obj(frame.function) {
            Obj::Function(f) => f,
            _ => unreachable!("frame over a non-function"),
        };
        let byte = function.chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = self.frames.last().expect("no active frame");
        match self.heap.obj(frame.function) {
            Obj::Function(f) => f.chunk.constants[index],
            _ => unreachable!("frame over a non-function"),
        }
    }

    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(handle) => handle,
            _ => unreachable!("name constant must be a string"),
        }
    }

    // ---- Error reporting -----------------------------------------------

    /// Build, report, and return a fatal runtime error.
    ///
    /// Prints `Runtime Error: <msg>` and the backtrace (innermost frame
    /// first) to stderr, then resets the stack.
    fn runtime_error(&mut self, message: impl Into<String>) -> RuntimeError {
        let message = message.into();
        let mut backtrace = Vec::new();
        for frame in self.frames.iter().rev() {
            let function = match self.heap.obj(frame.function) {
                Obj::Function(f) => f,
                _ => unreachable!("frame over a non-function"),
            };
            // The ip has advanced past the failing instruction.
            let line = function.chunk.line_at(frame.ip - 1);
            let name = function.name.map(|n| self.heap.string_chars(n).to_string());
            backtrace.push(TraceFrame { line, function: name });
        }

        let _ = writeln!(self.opts.stderr, "Runtime Error: {}", message);
        for frame in &backtrace {
            let _ = writeln!(self.opts.stderr, "{}", frame);
        }

        self.reset_stack();
        RuntimeError { message, backtrace }
    }

    // ---- Calls ---------------------------------------------------------

    fn call_closure(&mut self, closure: ObjRef, arg_count: usize) -> Result<(), RuntimeError> {
        let function = self.closure_function(closure);
        let arity = self.function_arity(function);
        if arg_count != arity {
            let message = format!("Expected {} arguments but got {}.", arity, arg_count);
            return Err(self.runtime_error(message));
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }
        let slots = self.stack.len() - arg_count - 1;
        self.frames.push(CallFrame::new(closure, function, slots));
        Ok(())
    }

    fn call_value(&mut self, callee: Value, arg_count: usize) -> Result<(), RuntimeError> {
        let target = match callee {
            Value::Obj(handle) => handle,
            _ => return Err(self.runtime_error("Can only call functions and classes.")),
        };
        let action = match self.heap.obj(target) {
            Obj::BoundMethod(bound) => CallAction::Bound(bound.receiver, bound.method),
            Obj::Class(_) => CallAction::Class,
            Obj::Closure(_) => CallAction::Closure,
            Obj::Native(native) => CallAction::Native(native.function),
            _ => CallAction::NotCallable,
        };

        match action {
            CallAction::Bound(receiver, method) => {
                let slot = self.stack.len() - arg_count - 1;
                self.stack[slot] = receiver;
                self.call_closure(method, arg_count)
            }
            CallAction::Class => {
                // The class itself sits in the callee slot and stays
                // rooted there while the instance is allocated.
                let instance =
                    self.alloc(Obj::Instance(InstanceObj { class: target, fields: Table::new() }));
                let slot = self.stack.len() - arg_count - 1;
                self.stack[slot] = Value::Obj(instance);

                let init_hash = self.heap.string(self.init_string).hash;
                let initializer = match self.heap.obj(target) {
                    Obj::Class(class) => class.methods.get(self.init_string, init_hash),
                    _ => unreachable!("expected class object"),
                };
                match initializer {
                    Some(Value::Obj(init)) => self.call_closure(init, arg_count),
                    Some(_) => unreachable!("initializer must be a closure"),
                    None if arg_count != 0 => {
                        let message = format!("Expected 0 arguments but got {}.", arg_count);
                        Err(self.runtime_error(message))
                    }
                    None => Ok(()),
                }
            }
            CallAction::Closure => self.call_closure(target, arg_count),
            CallAction::Native(function) => {
                let context = NativeContext { started_at: self.start };
                let args_start = self.stack.len() - arg_count;
                let result = function(&context, &self.stack[args_start..]);
                self.stack.truncate(args_start - 1);
                self.push(result);
                Ok(())
            }
            CallAction::NotCallable => {
                Err(self.runtime_error("Can only call functions and classes."))
            }
        }
    }

    fn invoke(&mut self, name: ObjRef, arg_count: usize) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count);
        let instance = match self.is_instance(receiver) {
            Some(handle) => handle,
            None => return Err(self.runtime_error("Only instances have methods.")),
        };

        let hash = self.heap.string(name).hash;
        let (field, class) = match self.heap.obj(instance) {
            Obj::Instance(i) => (i.fields.get(name, hash), i.class),
            _ => unreachable!("expected instance object"),
        };

        // A field shadowing the method name is called as a plain value.
        if let Some(value) = field {
            let slot = self.stack.len() - arg_count - 1;
            self.stack[slot] = value;
            return self.call_value(value, arg_count);
        }

        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class: ObjRef,
        name: ObjRef,
        arg_count: usize,
    ) -> Result<(), RuntimeError> {
        let hash = self.heap.string(name).hash;
        let method = match self.heap.obj(class) {
            Obj::Class(c) => c.methods.get(name, hash),
            _ => unreachable!("expected class object"),
        };
        match method {
            Some(Value::Obj(closure)) => self.call_closure(closure, arg_count),
            Some(_) => unreachable!("method must be a closure"),
            None => {
                let message =
                    format!("Undefined property '{}'.", self.heap.string_chars(name));
                Err(self.runtime_error(message))
            }
        }
    }

    fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let hash = self.heap.string(name).hash;
        let method = match self.heap.obj(class) {
            Obj::Class(c) => c.methods.get(name, hash),
            _ => unreachable!("expected class object"),
        };
        let closure = match method {
            Some(Value::Obj(closure)) => closure,
            Some(_) => unreachable!("method must be a closure"),
            None => {
                let message =
                    format!("Undefined property '{}'.", self.heap.string_chars(name));
                return Err(self.runtime_error(message));
            }
        };

        let receiver = self.peek(0);
        let bound = self.alloc(Obj::BoundMethod(BoundMethodObj { receiver, method: closure }));
        self.pop();
        self.push(Value::Obj(bound));
        Ok(())
    }

    fn define_method(&mut self, name: ObjRef) {
        let method = self.peek(0);
        let class = match self.peek(1) {
            Value::Obj(handle) => handle,
            _ => unreachable!("method defined on a non-class"),
        };
        let hash = self.heap.string(name).hash;
        match self.heap.obj_mut(class) {
            Obj::Class(c) => {
                c.methods.set(name, hash, method);
            }
            _ => unreachable!("method defined on a non-class"),
        }
        self.pop();
    }

    // ---- Upvalues ------------------------------------------------------

    /// Find or create an open upvalue for a stack slot. The list is kept
    /// sorted by descending slot so the walk can stop early.
    fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        let mut prev: Option<ObjRef> = None;
        let mut current = self.open_upvalues;
        while let Some(handle) = current {
            let upvalue = self.upvalue(handle);
            if upvalue.location <= slot {
                break;
            }
            prev = Some(handle);
            current = upvalue.next;
        }

        if let Some(handle) = current {
            let upvalue = self.upvalue(handle);
            if upvalue.is_open() && upvalue.location == slot {
                return handle;
            }
        }

        let created =
            self.alloc(Obj::Upvalue(UpvalueObj { location: slot, closed: None, next: current }));
        match prev {
            None => self.open_upvalues = Some(created),
            Some(prev) => match self.heap.obj_mut(prev) {
                Obj::Upvalue(u) => u.next = Some(created),
                _ => unreachable!("expected upvalue object"),
            },
        }
        created
    }

    /// Close every open upvalue at or above `last`, migrating the stack
    /// value into the upvalue.
    fn close_upvalues(&mut self, last: usize) {
        while let Some(handle) = self.open_upvalues {
            let (location, next) = {
                let upvalue = self.upvalue(handle);
                (upvalue.location, upvalue.next)
            };
            if location < last {
                break;
            }
            let value = self.stack[location];
            match self.heap.obj_mut(handle) {
                Obj::Upvalue(u) => u.closed = Some(value),
                _ => unreachable!("expected upvalue object"),
            }
            self.open_upvalues = next;
        }
    }

    // ---- Binary operators ----------------------------------------------

    fn binary_number_op(
        &mut self,
        op: fn(f64, f64) -> Value,
    ) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(op(a, b));
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    /// String concatenation for `+`. Both operands stay on the stack
    /// until the result exists, so a collection at the safepoint sees
    /// them as roots.
    fn concatenate(&mut self, a: ObjRef, b: ObjRef) {
        let mut combined = String::with_capacity(
            self.heap.string_chars(a).len() + self.heap.string_chars(b).len(),
        );
        combined.push_str(self.heap.string_chars(a));
        combined.push_str(self.heap.string_chars(b));
        let result = self.intern_owned(combined);
        self.pop();
        self.pop();
        self.push(Value::Obj(result));
    }

    // ---- Dispatch loop -------------------------------------------------

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "trace_execution")]
            {
                let mut rendered = String::from("          ");
                for &value in &self.stack {
                    rendered.push_str(&format!("[ {} ]", self.heap.format_value(value)));
                }
                let _ = writeln!(self.opts.stderr, "{}", rendered);
                let frame = self.frames.last().expect("no active frame");
                if let Obj::Function(function) = self.heap.obj(frame.function) {
                    let _ = memory_manager::debug::disassemble_instruction(
                        &self.heap,
                        &function.chunk,
                        frame.ip,
                        &mut self.opts.stderr,
                    );
                }
            }

            let byte = self.read_byte();
            let op = match OpCode::try_from(byte) {
                Ok(op) => op,
                Err(byte) => {
                    let message = format!("Unknown opcode {}.", byte);
                    return Err(self.runtime_error(message));
                }
            };

            match op {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    self.push(constant);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().expect("no active frame").slots;
                    let value = self.stack[base + slot];
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().expect("no active frame").slots;
                    let value = self.peek(0);
                    self.stack[base + slot] = value;
                }

                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    match self.globals.get(name, hash) {
                        Some(value) => self.push(value),
                        None => {
                            let message = format!(
                                "Undefined variable '{}'.",
                                self.heap.string_chars(name)
                            );
                            return Err(self.runtime_error(message));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    let value = self.peek(0);
                    self.globals.set(name, hash, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    let value = self.peek(0);
                    if self.globals.set(name, hash, value) {
                        // A new key means the global was never defined;
                        // undo the binding and fail.
                        self.globals.delete(name, hash);
                        let message =
                            format!("Undefined variable '{}'.", self.heap.string_chars(name));
                        return Err(self.runtime_error(message));
                    }
                }

                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().expect("no active frame").closure;
                    let upvalue = match self.heap.obj(closure) {
                        Obj::Closure(c) => c.upvalues[slot],
                        _ => unreachable!("expected closure object"),
                    };
                    let value = match self.upvalue(upvalue).closed {
                        Some(closed) => closed,
                        None => self.stack[self.upvalue(upvalue).location],
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().expect("no active frame").closure;
                    let upvalue = match self.heap.obj(closure) {
                        Obj::Closure(c) => c.upvalues[slot],
                        _ => unreachable!("expected closure object"),
                    };
                    let value = self.peek(0);
                    if self.upvalue(upvalue).is_open() {
                        let location = self.upvalue(upvalue).location;
                        self.stack[location] = value;
                    } else {
                        match self.heap.obj_mut(upvalue) {
                            Obj::Upvalue(u) => u.closed = Some(value),
                            _ => unreachable!("expected upvalue object"),
                        }
                    }
                }

                OpCode::GetProperty => {
                    let name = self.read_string();
                    let instance = match self.is_instance(self.peek(0)) {
                        Some(handle) => handle,
                        None => {
                            return Err(self.runtime_error("Only instances have properties."))
                        }
                    };
                    let hash = self.heap.string(name).hash;
                    let (field, class) = match self.heap.obj(instance) {
                        Obj::Instance(i) => (i.fields.get(name, hash), i.class),
                        _ => unreachable!("expected instance object"),
                    };
                    match field {
                        // Fields shadow methods.
                        Some(value) => {
                            self.pop();
                            self.push(value);
                        }
                        None => self.bind_method(class, name)?,
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string();
                    let instance = match self.is_instance(self.peek(1)) {
                        Some(handle) => handle,
                        None => return Err(self.runtime_error("Only instances have fields.")),
                    };
                    let hash = self.heap.string(name).hash;
                    let value = self.peek(0);
                    match self.heap.obj_mut(instance) {
                        Obj::Instance(i) => {
                            i.fields.set(name, hash, value);
                        }
                        _ => unreachable!("expected instance object"),
                    }
                    let value = self.pop();
                    self.pop();
                    self.push(value);
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let superclass = match self.pop() {
                        Value::Obj(handle) => handle,
                        _ => unreachable!("superclass must be a class"),
                    };
                    self.bind_method(superclass, name)?;
                }

                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,

                OpCode::Add => {
                    let (a, b) = (self.peek(1), self.peek(0));
                    if let (Some(a), Some(b)) = (self.is_string(a), self.is_string(b)) {
                        self.concatenate(a, b);
                    } else if let (Value::Number(a), Value::Number(b)) = (a, b) {
                        self.pop();
                        self.pop();
                        self.push(Value::Number(a + b));
                    } else {
                        return Err(
                            self.runtime_error("Operands must be two numbers or two strings.")
                        );
                    }
                }
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,

                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => match self.peek(0) {
                    Value::Number(n) => {
                        self.pop();
                        self.push(Value::Number(-n));
                    }
                    _ => return Err(self.runtime_error("Operand must be a number.")),
                },

                OpCode::Print => {
                    let value = self.pop();
                    let rendered = self.heap.format_value(value);
                    let _ = writeln!(self.opts.stdout, "{}", rendered);
                }

                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("no active frame").ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().expect("no active frame").ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("no active frame").ip -= offset;
                }

                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    let callee = self.peek(arg_count);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte() as usize;
                    let superclass = match self.pop() {
                        Value::Obj(handle) => handle,
                        _ => unreachable!("superclass must be a class"),
                    };
                    self.invoke_from_class(superclass, name, arg_count)?;
                }

                OpCode::Closure => {
                    let function = match self.read_constant() {
                        Value::Obj(handle) => handle,
                        _ => unreachable!("closure constant must be a function"),
                    };
                    let upvalue_count = match self.heap.obj(function) {
                        Obj::Function(f) => f.upvalue_count,
                        _ => unreachable!("closure constant must be a function"),
                    };
                    let closure = self.alloc(Obj::Closure(ClosureObj {
                        function,
                        upvalues: Vec::with_capacity(upvalue_count),
                    }));
                    self.push(Value::Obj(closure));

                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_byte() as usize;
                        let upvalue = if is_local {
                            let base = self.frames.last().expect("no active frame").slots;
                            self.capture_upvalue(base + index)
                        } else {
                            let enclosing =
                                self.frames.last().expect("no active frame").closure;
                            match self.heap.obj(enclosing) {
                                Obj::Closure(c) => c.upvalues[index],
                                _ => unreachable!("expected closure object"),
                            }
                        };
                        match self.heap.obj_mut(closure) {
                            Obj::Closure(c) => c.upvalues.push(upvalue),
                            _ => unreachable!("expected closure object"),
                        }
                    }
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }

                OpCode::Return => {
                    let result = self.pop();
                    let slots = self.frames.last().expect("no active frame").slots;
                    self.close_upvalues(slots);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        // Pop the script closure and finish.
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(slots);
                    self.push(result);
                }

                OpCode::Class => {
                    let name = self.read_string();
                    let class =
                        self.alloc(Obj::Class(ClassObj { name, methods: Table::new() }));
                    self.push(Value::Obj(class));
                }
                OpCode::Inherit => {
                    let superclass = match self.is_class(self.peek(1)) {
                        Some(handle) => handle,
                        None => return Err(self.runtime_error("Superclass must be a class.")),
                    };
                    let subclass = match self.peek(0) {
                        Value::Obj(handle) => handle,
                        _ => unreachable!("subclass must be a class"),
                    };
                    // Copy-down inheritance: methods are flattened onto
                    // the subclass before its own methods are installed.
                    let methods: Vec<(ObjRef, u32, Value)> = match self.heap.obj(superclass) {
                        Obj::Class(c) => c.methods.iter().collect(),
                        _ => unreachable!("expected class object"),
                    };
                    for (key, hash, value) in methods {
                        match self.heap.obj_mut(subclass) {
                            Obj::Class(c) => {
                                c.methods.set(key, hash, value);
                            }
                            _ => unreachable!("expected class object"),
                        }
                    }
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    self.define_method(name);
                }
            }
        }
    }
}

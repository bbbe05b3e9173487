//! Bytecode opcodes for the Cinder stack VM.
//!
//! Every opcode occupies a single byte; operand widths are fixed per
//! opcode. Two-byte jump operands are big-endian.

/// Bytecode opcodes.
///
/// Stack effects are documented with the rightmost value on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Push `constants[u8]`
    Constant,
    /// Push `nil`
    Nil,
    /// Push `true`
    True,
    /// Push `false`
    False,
    /// Pop one value
    Pop,
    /// Push `frame.slots[u8]`
    GetLocal,
    /// Write top of stack into `frame.slots[u8]` (does not pop)
    SetLocal,
    /// Push the global named by `constants[u8]`; undefined name fails
    GetGlobal,
    /// Bind top of stack to the global named by `constants[u8]`, then pop
    DefineGlobal,
    /// Rebind an existing global; undefined name fails (does not pop)
    SetGlobal,
    /// Push the value seen through the closure's upvalue `u8`
    GetUpvalue,
    /// Write top of stack through the closure's upvalue `u8` (does not pop)
    SetUpvalue,
    /// Replace an instance with its field, or bind a method
    GetProperty,
    /// Store into an instance field, leaving the assigned value on top
    SetProperty,
    /// Pop a superclass and bind one of its methods on the receiver below
    GetSuper,
    /// Pop two values, push their equality
    Equal,
    /// Pop two numbers, push `a > b`
    Greater,
    /// Pop two numbers, push `a < b`
    Less,
    /// Numbers add; two strings concatenate; anything else fails
    Add,
    /// Pop two numbers, push `a - b`
    Subtract,
    /// Pop two numbers, push `a * b`
    Multiply,
    /// Pop two numbers, push `a / b`
    Divide,
    /// Pop a value, push its logical negation
    Not,
    /// Negate the number on top of the stack
    Negate,
    /// Pop a value and print it followed by a newline
    Print,
    /// `ip += u16`
    Jump,
    /// `ip += u16` if top of stack is falsey (does not pop)
    JumpIfFalse,
    /// `ip -= u16`
    Loop,
    /// Call `peek(u8)` with `u8` arguments
    Call,
    /// Fused method lookup and call: `u8` name index, `u8` arg count
    Invoke,
    /// Fused superclass method lookup and call
    SuperInvoke,
    /// Wrap `constants[u8]` in a closure; followed by upvalue descriptors
    Closure,
    /// Close the topmost open upvalue and pop the slot
    CloseUpvalue,
    /// Pop the result, close the frame's upvalues, unwind the frame
    Return,
    /// Push a new class named by `constants[u8]`
    Class,
    /// Copy superclass methods into the subclass on top, then pop it
    Inherit,
    /// Install the closure on top as a method of the class below
    Method,
}

impl OpCode {
    /// The disassembler mnemonic for this opcode.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::GetLocal => "OP_GET_LOCAL",
            OpCode::SetLocal => "OP_SET_LOCAL",
            OpCode::GetGlobal => "OP_GET_GLOBAL",
            OpCode::DefineGlobal => "OP_DEFINE_GLOBAL",
            OpCode::SetGlobal => "OP_SET_GLOBAL",
            OpCode::GetUpvalue => "OP_GET_UPVALUE",
            OpCode::SetUpvalue => "OP_SET_UPVALUE",
            OpCode::GetProperty => "OP_GET_PROPERTY",
            OpCode::SetProperty => "OP_SET_PROPERTY",
            OpCode::GetSuper => "OP_GET_SUPER",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Print => "OP_PRINT",
            OpCode::Jump => "OP_JUMP",
            OpCode::JumpIfFalse => "OP_JUMP_IF_FALSE",
            OpCode::Loop => "OP_LOOP",
            OpCode::Call => "OP_CALL",
            OpCode::Invoke => "OP_INVOKE",
            OpCode::SuperInvoke => "OP_SUPER_INVOKE",
            OpCode::Closure => "OP_CLOSURE",
            OpCode::CloseUpvalue => "OP_CLOSE_UPVALUE",
            OpCode::Return => "OP_RETURN",
            OpCode::Class => "OP_CLASS",
            OpCode::Inherit => "OP_INHERIT",
            OpCode::Method => "OP_METHOD",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            b if b == OpCode::Constant as u8 => OpCode::Constant,
            b if b == OpCode::Nil as u8 => OpCode::Nil,
            b if b == OpCode::True as u8 => OpCode::True,
            b if b == OpCode::False as u8 => OpCode::False,
            b if b == OpCode::Pop as u8 => OpCode::Pop,
            b if b == OpCode::GetLocal as u8 => OpCode::GetLocal,
            b if b == OpCode::SetLocal as u8 => OpCode::SetLocal,
            b if b == OpCode::GetGlobal as u8 => OpCode::GetGlobal,
            b if b == OpCode::DefineGlobal as u8 => OpCode::DefineGlobal,
            b if b == OpCode::SetGlobal as u8 => OpCode::SetGlobal,
            b if b == OpCode::GetUpvalue as u8 => OpCode::GetUpvalue,
            b if b == OpCode::SetUpvalue as u8 => OpCode::SetUpvalue,
            b if b == OpCode::GetProperty as u8 => OpCode::GetProperty,
            b if b == OpCode::SetProperty as u8 => OpCode::SetProperty,
            b if b == OpCode::GetSuper as u8 => OpCode::GetSuper,
            b if b == OpCode::Equal as u8 => OpCode::Equal,
            b if b == OpCode::Greater as u8 => OpCode::Greater,
            b if b == OpCode::Less as u8 => OpCode::Less,
            b if b == OpCode::Add as u8 => OpCode::Add,
            b if b == OpCode::Subtract as u8 => OpCode::Subtract,
            b if b == OpCode::Multiply as u8 => OpCode::Multiply,
            b if b == OpCode::Divide as u8 => OpCode::Divide,
            b if b == OpCode::Not as u8 => OpCode::Not,
            b if b == OpCode::Negate as u8 => OpCode::Negate,
            b if b == OpCode::Print as u8 => OpCode::Print,
            b if b == OpCode::Jump as u8 => OpCode::Jump,
            b if b == OpCode::JumpIfFalse as u8 => OpCode::JumpIfFalse,
            b if b == OpCode::Loop as u8 => OpCode::Loop,
            b if b == OpCode::Call as u8 => OpCode::Call,
            b if b == OpCode::Invoke as u8 => OpCode::Invoke,
            b if b == OpCode::SuperInvoke as u8 => OpCode::SuperInvoke,
            b if b == OpCode::Closure as u8 => OpCode::Closure,
            b if b == OpCode::CloseUpvalue as u8 => OpCode::CloseUpvalue,
            b if b == OpCode::Return as u8 => OpCode::Return,
            b if b == OpCode::Class as u8 => OpCode::Class,
            b if b == OpCode::Inherit as u8 => OpCode::Inherit,
            b if b == OpCode::Method as u8 => OpCode::Method,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_roundtrip() {
        let all = [
            OpCode::Constant,
            OpCode::Nil,
            OpCode::True,
            OpCode::False,
            OpCode::Pop,
            OpCode::GetLocal,
            OpCode::SetLocal,
            OpCode::GetGlobal,
            OpCode::DefineGlobal,
            OpCode::SetGlobal,
            OpCode::GetUpvalue,
            OpCode::SetUpvalue,
            OpCode::GetProperty,
            OpCode::SetProperty,
            OpCode::GetSuper,
            OpCode::Equal,
            OpCode::Greater,
            OpCode::Less,
            OpCode::Add,
            OpCode::Subtract,
            OpCode::Multiply,
            OpCode::Divide,
            OpCode::Not,
            OpCode::Negate,
            OpCode::Print,
            OpCode::Jump,
            OpCode::JumpIfFalse,
            OpCode::Loop,
            OpCode::Call,
            OpCode::Invoke,
            OpCode::SuperInvoke,
            OpCode::Closure,
            OpCode::CloseUpvalue,
            OpCode::Return,
            OpCode::Class,
            OpCode::Inherit,
            OpCode::Method,
        ];
        for op in all {
            assert_eq!(OpCode::try_from(op as u8), Ok(op));
        }
    }

    #[test]
    fn test_unknown_byte_is_rejected() {
        assert_eq!(OpCode::try_from(0xff), Err(0xff));
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::Constant.mnemonic(), "OP_CONSTANT");
        assert_eq!(OpCode::SuperInvoke.mnemonic(), "OP_SUPER_INVOKE");
    }
}

//! Bytecode disassembler.
//!
//! Renders a chunk one instruction per line: a 4-digit byte offset, the
//! source line (or `|` when unchanged), the opcode mnemonic, and any
//! operands. Constant operands are shown with the constant's value, which
//! requires heap access for object constants.

use std::io::{self, Write};

use bytecode_system::{Chunk, OpCode};
use core_types::Value;

use crate::heap::Heap;
use crate::object::Obj;

/// Disassemble an entire chunk under a `== name ==` header.
pub fn disassemble_chunk(
    heap: &Heap,
    chunk: &Chunk,
    name: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out, "== {} ==", name)?;
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(heap, chunk, offset, out)?;
    }
    Ok(())
}

/// Disassemble the instruction at `offset`, returning the next offset.
pub fn disassemble_instruction(
    heap: &Heap,
    chunk: &Chunk,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    write!(out, "{:04} ", offset)?;
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        write!(out, "   | ")?;
    } else {
        write!(out, "{:4} ", chunk.line_at(offset))?;
    }

    let op = match OpCode::try_from(chunk.code[offset]) {
        Ok(op) => op,
        Err(byte) => {
            writeln!(out, "Unknown opcode {}", byte)?;
            return Ok(offset + 1);
        }
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::GetProperty
        | OpCode::SetProperty
        | OpCode::GetSuper
        | OpCode::Class
        | OpCode::Method => constant_instruction(heap, chunk, op, offset, out),
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(chunk, op, offset, out),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, 1, offset, out),
        OpCode::Loop => jump_instruction(chunk, op, -1, offset, out),
        OpCode::Invoke | OpCode::SuperInvoke => invoke_instruction(heap, chunk, op, offset, out),
        OpCode::Closure => closure_instruction(heap, chunk, offset, out),
        _ => simple_instruction(op, offset, out),
    }
}

fn simple_instruction(op: OpCode, offset: usize, out: &mut dyn Write) -> io::Result<usize> {
    writeln!(out, "{}", op.mnemonic())?;
    Ok(offset + 1)
}

fn constant_instruction(
    heap: &Heap,
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let constant = chunk.code[offset + 1];
    writeln!(
        out,
        "{:<16} {:4} '{}'",
        op.mnemonic(),
        constant,
        heap.format_value(chunk.constants[constant as usize])
    )?;
    Ok(offset + 2)
}

fn byte_instruction(
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let slot = chunk.code[offset + 1];
    writeln!(out, "{:<16} {:4}", op.mnemonic(), slot)?;
    Ok(offset + 2)
}

fn jump_instruction(
    chunk: &Chunk,
    op: OpCode,
    sign: i64,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]) as i64;
    let target = offset as i64 + 3 + sign * jump;
    writeln!(out, "{:<16} {:4} -> {}", op.mnemonic(), offset, target)?;
    Ok(offset + 3)
}

fn invoke_instruction(
    heap: &Heap,
    chunk: &Chunk,
    op: OpCode,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let constant = chunk.code[offset + 1];
    let arg_count = chunk.code[offset + 2];
    writeln!(
        out,
        "{:<16} ({} args) {:4} '{}'",
        op.mnemonic(),
        arg_count,
        constant,
        heap.format_value(chunk.constants[constant as usize])
    )?;
    Ok(offset + 3)
}

fn closure_instruction(
    heap: &Heap,
    chunk: &Chunk,
    offset: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let mut offset = offset + 1;
    let constant = chunk.code[offset];
    offset += 1;
    let value = chunk.constants[constant as usize];
    writeln!(
        out,
        "{:<16} {:4} {}",
        OpCode::Closure.mnemonic(),
        constant,
        heap.format_value(value)
    )?;

    let upvalue_count = match value {
        Value::Obj(handle) => match heap.obj(handle) {
            Obj::Function(function) => function.upvalue_count,
            _ => 0,
        },
        _ => 0,
    };
    for _ in 0..upvalue_count {
        let is_local = chunk.code[offset];
        let index = chunk.code[offset + 1];
        writeln!(
            out,
            "{:04}      |                     {} {}",
            offset,
            if is_local != 0 { "local" } else { "upvalue" },
            index
        )?;
        offset += 2;
    }
    Ok(offset)
}

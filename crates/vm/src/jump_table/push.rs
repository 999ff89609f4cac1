// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! `PUSHBYTES1..75`, `PUSH0`, `PUSHM1`, `PUSH1..16`, `PUSHDATA1/2/4`.

use crate::op_code::OpCode;
use crate::{ExecutionEngine, StackItem, VmError, VmResult};

/// `PUSHBYTES1..75` (opcode byte itself is the literal's length).
pub fn push_bytes_literal(engine: &mut ExecutionEngine, opcode_byte: u8) -> VmResult<()> {
    let ctx = engine.current_context_mut().expect("frame present");
    let len = opcode_byte as usize;
    let data = ctx
        .peek_bytes(1, len)
        .ok_or(VmError::TruncatedOperand {
            opcode: opcode_byte,
            wanted: len,
        })?
        .to_vec();
    ctx.eval_stack.push(StackItem::bytes(data));
    ctx.advance(1 + len as i64);
    Ok(())
}

/// `PUSH1..16`.
pub fn push_small_int(engine: &mut ExecutionEngine, opcode_byte: u8) -> VmResult<()> {
    let ctx = engine.current_context_mut().expect("frame present");
    let n = (opcode_byte - 0x50) as i64;
    ctx.eval_stack.push(StackItem::int(n));
    ctx.advance(1);
    Ok(())
}

/// `PUSH0`, `PUSHM1`, `PUSHDATA1/2/4`.
pub fn dispatch(engine: &mut ExecutionEngine, opcode: OpCode) -> VmResult<()> {
    let ctx = engine.current_context_mut().expect("frame present");
    let opcode_byte = opcode.as_byte();
    match opcode {
        OpCode::Push0 => {
            ctx.eval_stack.push(StackItem::bytes(Vec::new()));
            ctx.advance(1);
        }
        OpCode::PushM1 => {
            ctx.eval_stack.push(StackItem::int(-1));
            ctx.advance(1);
        }
        OpCode::PushData1 => {
            let len = ctx
                .peek_byte(1)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: 1,
                })? as usize;
            let data = ctx
                .peek_bytes(2, len)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: len,
                })?
                .to_vec();
            ctx.eval_stack.push(StackItem::bytes(data));
            ctx.advance(2 + len as i64);
        }
        OpCode::PushData2 => {
            let lb = ctx
                .peek_bytes(1, 2)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: 2,
                })?;
            let len = u16::from_le_bytes([lb[0], lb[1]]) as usize;
            let data = ctx
                .peek_bytes(3, len)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: len,
                })?
                .to_vec();
            ctx.eval_stack.push(StackItem::bytes(data));
            ctx.advance(3 + len as i64);
        }
        OpCode::PushData4 => {
            let lb = ctx
                .peek_bytes(1, 4)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: 4,
                })?;
            let len = u32::from_le_bytes([lb[0], lb[1], lb[2], lb[3]]) as usize;
            let data = ctx
                .peek_bytes(5, len)
                .ok_or(VmError::TruncatedOperand {
                    opcode: opcode_byte,
                    wanted: len,
                })?
                .to_vec();
            ctx.eval_stack.push(StackItem::bytes(data));
            ctx.advance(5 + len as i64);
        }
        _ => unreachable!("push::dispatch called with non-push opcode"),
    }
    Ok(())
}

// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! `NOP`, the jump family, `CALL`/`RET`, and the exception opcodes.
//!
//! Jump targets follow the classic formula `new_ip = IP() + offset - 3`,
//! where `IP()` is the position of the jump opcode itself and `offset` is
//! its signed 16-bit little-endian operand.

use crate::execution_context::ExecutionContext;
use crate::op_code::OpCode;
use crate::{ExecutionEngine, VmError, VmResult};
use std::rc::Rc;

pub fn dispatch(engine: &mut ExecutionEngine, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::Nop => {
            engine.current_context_mut().expect("frame present").advance(1);
            Ok(())
        }
        OpCode::Jmp => jump(engine, None),
        OpCode::JmpIf => jump(engine, Some(true)),
        OpCode::JmpIfNot => jump(engine, Some(false)),
        OpCode::Call => call(engine),
        OpCode::Ret => ret(engine),
        OpCode::Throw => {
            let ctx = engine.current_context_mut().expect("frame present");
            let reason = ctx.eval_stack.pop()?;
            Err(VmError::UnhandledException(format!("{:?}", reason)))
        }
        OpCode::ThrowIfNot => {
            let ctx = engine.current_context_mut().expect("frame present");
            let condition = ctx.eval_stack.pop()?.as_bool();
            if condition {
                ctx.advance(1);
                Ok(())
            } else {
                Err(VmError::UnhandledException("THROWIFNOT condition was false".into()))
            }
        }
        _ => unreachable!("control::dispatch called with unrelated opcode"),
    }
}

/// Reads the jump target relative to the opcode's own position. `cond`
/// selects `JMP` (`None`), `JMPIF` (`Some(true)`), or `JMPIFNOT`
/// (`Some(false)`), popping and consuming the branch condition first.
fn jump(engine: &mut ExecutionEngine, cond: Option<bool>) -> VmResult<()> {
    let ctx = engine.current_context_mut().expect("frame present");
    let opcode_byte = ctx.peek_byte(0).expect("dispatcher already read this byte");
    let offset = read_offset(ctx, opcode_byte)?;
    let ip_pos = ctx.current_position();

    let take_branch = match cond {
        None => true,
        Some(expected) => ctx.eval_stack.pop()?.as_bool() == expected,
    };

    if take_branch {
        let target = ip_pos + offset - 3;
        validate_target(target, ctx.script.len())?;
        ctx.set_raw_ip(target - 1);
    } else {
        ctx.advance(3);
    }
    Ok(())
}

fn call(engine: &mut ExecutionEngine) -> VmResult<()> {
    let (script, target) = {
        let ctx = engine.current_context_mut().expect("frame present");
        let opcode_byte = ctx.peek_byte(0).expect("dispatcher already read this byte");
        let offset = read_offset(ctx, opcode_byte)?;
        let ip_pos = ctx.current_position();
        let target = ip_pos + offset - 3;
        validate_target(target, ctx.script.len())?;
        ctx.advance(3);
        (Rc::clone(&ctx.script), target)
    };
    let mut callee = ExecutionContext::new(script);
    callee.set_raw_ip(target - 1);
    engine.invocation_stack_mut().push(callee);
    Ok(())
}

fn ret(engine: &mut ExecutionEngine) -> VmResult<()> {
    let finished = engine
        .invocation_stack_mut()
        .pop()
        .ok_or(VmError::InvocationStackEmpty)?;
    match engine.current_context_mut() {
        Some(caller) => {
            for item in finished.into_eval_stack_items() {
                caller.eval_stack.push(item);
            }
            Ok(())
        }
        None => {
            engine.invocation_stack_mut().push(finished);
            Ok(())
        }
    }
}

fn read_offset(ctx: &ExecutionContext, opcode_byte: u8) -> VmResult<i64> {
    let bytes = ctx.peek_bytes(1, 2).ok_or(VmError::TruncatedOperand {
        opcode: opcode_byte,
        wanted: 2,
    })?;
    Ok(i16::from_le_bytes([bytes[0], bytes[1]]) as i64)
}

fn validate_target(target: i64, len: usize) -> VmResult<()> {
    if target < 0 || target as usize > len {
        Err(VmError::InvalidJumpTarget { target, len })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionEngine as Engine, NullSignatureVerifier, ScriptBuilder};
    use std::sync::Arc;

    fn engine() -> Engine {
        Engine::new(Arc::new(NullSignatureVerifier))
    }

    #[test]
    fn unconditional_jump_skips_instructions() {
        // JMP +3 over a Push1, landing on Push0. Offsets are relative to
        // the JMP opcode's own position, per the `IP() + offset - 3` rule.
        let mut b = ScriptBuilder::new();
        b.op(OpCode::Jmp).emit(0x07).emit(0x00); // jump 7 bytes forward from JMP
        b.push_int(1); // skipped
        b.push_int(0); // landing spot
        let script = b.into_bytes();
        let mut e = engine();
        e.load_script(script).unwrap();
        assert_eq!(e.execute(), crate::VMState::HALT);
        assert_eq!(e.result_stack().len(), 1);
        assert_eq!(
            e.result_stack().peek(0).unwrap().as_int().unwrap(),
            0.into()
        );
    }

    #[test]
    fn jump_past_end_of_script_faults() {
        let mut b = ScriptBuilder::new();
        b.op(OpCode::Jmp).emit(0x7F).emit(0x00);
        let script = b.into_bytes();
        let mut e = engine();
        e.load_script(script).unwrap();
        assert_eq!(e.execute(), crate::VMState::FAULT);
    }

    #[test]
    fn throw_faults_with_the_thrown_value() {
        let script = ScriptBuilder::new()
            .push_int(42)
            .op(OpCode::Throw)
            .into_bytes();
        let mut e = engine();
        e.load_script(script).unwrap();
        assert_eq!(e.execute(), crate::VMState::FAULT);
    }
}

// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Opcode handlers, grouped by instruction family. [`execute`] is the
//! single entry point the engine calls once per step; everything else in
//! this module (and its children) is private dispatch plumbing.

mod arithmetic;
mod bitwise;
mod compound;
mod control;
mod crypto_ops;
mod push;
mod stack_ops;

use crate::execution_engine::trace_step;
use crate::op_code::{OpCode, PUSHBYTES_RANGE, PUSH_RANGE};
use crate::{ExecutionEngine, VmError, VmResult};

/// Executes the single instruction at the current context's instruction
/// pointer, advancing it (or replacing it, for jumps/calls) as a side
/// effect. Never panics: any malformed bytecode turns into a `VmError`
/// that the caller converts into `VMState::FAULT`.
pub fn execute(engine: &mut ExecutionEngine) -> VmResult<()> {
    let (opcode_byte, ip) = {
        let ctx = engine
            .current_context()
            .expect("execute called with no active frame");
        let byte = ctx
            .peek_byte(0)
            .ok_or(VmError::InvalidInstructionPointer {
                ip: ctx.current_position(),
                len: ctx.script.len(),
            })?;
        (byte, ctx.current_position())
    };
    trace_step(opcode_byte, ip);

    if PUSHBYTES_RANGE.contains(&opcode_byte) {
        return push::push_bytes_literal(engine, opcode_byte);
    }
    if PUSH_RANGE.contains(&opcode_byte) {
        return push::push_small_int(engine, opcode_byte);
    }

    let opcode = OpCode::from_byte(opcode_byte).ok_or(VmError::UnknownOpcode { opcode: opcode_byte })?;

    use OpCode::*;
    match opcode {
        Push0 | PushData1 | PushData2 | PushData4 | PushM1 => push::dispatch(engine, opcode),

        Nop | Jmp | JmpIf | JmpIfNot | Call | Ret | Throw | ThrowIfNot => {
            control::dispatch(engine, opcode)
        }

        DupFromAltStack | ToAltStack | FromAltStack | XDrop | XSwap | XTuck | Depth | Drop
        | Dup | Nip | Over | Pick | Roll | Rot | Swap | Tuck => {
            let ctx = engine.current_context_mut().expect("frame present");
            stack_ops::dispatch(ctx, opcode)?;
            ctx.advance(1);
            Ok(())
        }

        Invert | And | Or | Xor | Equal => {
            let ctx = engine.current_context_mut().expect("frame present");
            bitwise::dispatch(ctx, opcode)?;
            ctx.advance(1);
            Ok(())
        }

        Inc | Dec | Sign | Negate | Abs | Not | Nz | Add | Sub | Mul | Div | Mod | Shl | Shr
        | NumEqual | Lt | Gt | Lte | Gte | Min | Max | Within => {
            let ctx = engine.current_context_mut().expect("frame present");
            arithmetic::dispatch(ctx, opcode)?;
            ctx.advance(1);
            Ok(())
        }

        Sha1 | Sha256 | Hash160 | Hash256 | CheckSig | CheckMultisig => {
            crypto_ops::dispatch(engine, opcode)?;
            engine
                .current_context_mut()
                .expect("frame present")
                .advance(1);
            Ok(())
        }

        ArraySize | PickItem | SetItem | NewArray | NewStruct | NewMap | Append | Remove
        | HasKey | Keys | Values => {
            let ctx = engine.current_context_mut().expect("frame present");
            compound::dispatch(ctx, opcode)?;
            ctx.advance(1);
            Ok(())
        }
    }
}

// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! `INVERT`, `AND`, `OR`, `XOR`, `EQUAL`. Bitwise ops work on the
//! little-endian two's-complement encoding of their integer operands,
//! sign-extended to a common length.

use crate::op_code::OpCode;
use num_bigint::BigInt;
use crate::{ExecutionContext, StackItem, VmResult};

pub fn dispatch(ctx: &mut ExecutionContext, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::Invert => {
            let a = ctx.eval_stack.pop()?.as_int()?;
            ctx.eval_stack.push(StackItem::int(-a - BigInt::from(1)));
        }
        OpCode::And => binary(ctx, |a, b| byte_zip(a, b, |x, y| x & y))?,
        OpCode::Or => binary(ctx, |a, b| byte_zip(a, b, |x, y| x | y))?,
        OpCode::Xor => binary(ctx, |a, b| byte_zip(a, b, |x, y| x ^ y))?,
        OpCode::Equal => {
            let b = ctx.eval_stack.pop()?;
            let a = ctx.eval_stack.pop()?;
            ctx.eval_stack.push(StackItem::Boolean(a.vm_equals(&b)?));
        }
        _ => unreachable!("bitwise::dispatch called with unrelated opcode"),
    }
    Ok(())
}

fn binary(
    ctx: &mut ExecutionContext,
    f: impl Fn(&BigInt, &BigInt) -> BigInt,
) -> VmResult<()> {
    let b = ctx.eval_stack.pop()?.as_int()?;
    let a = ctx.eval_stack.pop()?.as_int()?;
    ctx.eval_stack.push(StackItem::int(f(&a, &b)));
    Ok(())
}

/// Sign-extends both operands' little-endian two's-complement encoding to
/// the longer length, applies `f` byte by byte, and decodes the result.
fn byte_zip(a: &BigInt, b: &BigInt, f: impl Fn(u8, u8) -> u8) -> BigInt {
    let mut ab = a.to_signed_bytes_le();
    let mut bb = b.to_signed_bytes_le();
    let len = ab.len().max(bb.len());
    let a_fill = if a.sign() == num_bigint::Sign::Minus { 0xFF } else { 0x00 };
    let b_fill = if b.sign() == num_bigint::Sign::Minus { 0xFF } else { 0x00 };
    ab.resize(len, a_fill);
    bb.resize(len, b_fill);
    let out: Vec<u8> = ab.iter().zip(bb.iter()).map(|(x, y)| f(*x, *y)).collect();
    BigInt::from_signed_bytes_le(&out)
}

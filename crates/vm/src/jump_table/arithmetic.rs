// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Unary and binary integer arithmetic, plus the numeric comparisons.

use crate::op_code::OpCode;
use crate::{ExecutionContext, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

pub fn dispatch(ctx: &mut ExecutionContext, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::Inc => unary(ctx, |a| a + BigInt::from(1))?,
        OpCode::Dec => unary(ctx, |a| a - BigInt::from(1))?,
        OpCode::Negate => unary(ctx, |a| -a)?,
        OpCode::Abs => unary(ctx, |a| a.abs())?,
        OpCode::Sign => unary(ctx, |a| a.signum())?,
        OpCode::Not => {
            let a = ctx.eval_stack.pop()?;
            ctx.eval_stack.push(StackItem::Boolean(!a.as_bool()));
        }
        OpCode::Nz => {
            let a = ctx.eval_stack.pop()?.as_int()?;
            ctx.eval_stack.push(StackItem::Boolean(!a.is_zero()));
        }
        OpCode::Add => binary(ctx, |a, b| Ok(a + b))?,
        OpCode::Sub => binary(ctx, |a, b| Ok(a - b))?,
        OpCode::Mul => binary(ctx, |a, b| Ok(a * b))?,
        OpCode::Div => binary(ctx, |a, b| {
            if b.is_zero() {
                Err(VmError::DivideByZero)
            } else {
                Ok(a / b)
            }
        })?,
        OpCode::Mod => binary(ctx, |a, b| {
            if b.is_zero() {
                Err(VmError::DivideByZero)
            } else {
                Ok(a % b)
            }
        })?,
        OpCode::Shl => binary(ctx, |a, b| shift(a, b, true))?,
        OpCode::Shr => binary(ctx, |a, b| shift(a, b, false))?,
        OpCode::NumEqual => compare(ctx, |o| o == std::cmp::Ordering::Equal)?,
        OpCode::Lt => compare(ctx, |o| o == std::cmp::Ordering::Less)?,
        OpCode::Gt => compare(ctx, |o| o == std::cmp::Ordering::Greater)?,
        OpCode::Lte => compare(ctx, |o| o != std::cmp::Ordering::Greater)?,
        OpCode::Gte => compare(ctx, |o| o != std::cmp::Ordering::Less)?,
        OpCode::Min => binary(ctx, |a, b| Ok(a.min(b)))?,
        OpCode::Max => binary(ctx, |a, b| Ok(a.max(b)))?,
        OpCode::Within => {
            let max = ctx.eval_stack.pop()?.as_int()?;
            let min = ctx.eval_stack.pop()?.as_int()?;
            let x = ctx.eval_stack.pop()?.as_int()?;
            ctx.eval_stack
                .push(StackItem::Boolean(min <= x && x < max));
        }
        _ => unreachable!("arithmetic::dispatch called with unrelated opcode"),
    }
    Ok(())
}

fn unary(ctx: &mut ExecutionContext, f: impl Fn(BigInt) -> BigInt) -> VmResult<()> {
    let a = ctx.eval_stack.pop()?.as_int()?;
    ctx.eval_stack.push(StackItem::int(f(a)));
    Ok(())
}

fn binary(
    ctx: &mut ExecutionContext,
    f: impl Fn(BigInt, BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let b = ctx.eval_stack.pop()?.as_int()?;
    let a = ctx.eval_stack.pop()?.as_int()?;
    ctx.eval_stack.push(StackItem::int(f(a, b)?));
    Ok(())
}

fn compare(ctx: &mut ExecutionContext, f: impl Fn(std::cmp::Ordering) -> bool) -> VmResult<()> {
    let b = ctx.eval_stack.pop()?.as_int()?;
    let a = ctx.eval_stack.pop()?.as_int()?;
    ctx.eval_stack.push(StackItem::Boolean(f(a.cmp(&b))));
    Ok(())
}

fn shift(value: BigInt, amount: BigInt, left: bool) -> VmResult<BigInt> {
    let amount = amount
        .to_i64()
        .ok_or(VmError::InvalidShift(i64::MAX))?;
    if amount < 0 || amount > 1024 {
        return Err(VmError::InvalidShift(amount));
    }
    let amount = amount as usize;
    Ok(if left {
        value << amount
    } else {
        value >> amount
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Rc::new(vec![]))
    }

    #[test]
    fn add_sums_operands() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(2));
        c.eval_stack.push(StackItem::int(3));
        dispatch(&mut c, OpCode::Add).unwrap();
        assert_eq!(c.eval_stack.pop().unwrap().as_int().unwrap(), 5.into());
    }

    #[test]
    fn div_by_zero_faults() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(1));
        c.eval_stack.push(StackItem::int(0));
        assert!(matches!(dispatch(&mut c, OpCode::Div), Err(VmError::DivideByZero)));
    }

    #[test]
    fn within_is_half_open() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(5)); // x
        c.eval_stack.push(StackItem::int(0)); // min
        c.eval_stack.push(StackItem::int(5)); // max
        dispatch(&mut c, OpCode::Within).unwrap();
        assert!(!c.eval_stack.pop().unwrap().as_bool());
    }
}

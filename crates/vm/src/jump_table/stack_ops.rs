// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Plain and random-access stack manipulation: `DROP`, `DUP`, `NIP`,
//! `OVER`, `PICK`, `ROLL`, `ROT`, `SWAP`, `TUCK`, `XDROP`, `XSWAP`,
//! `XTUCK`, `DEPTH`, and the alt-stack transfers.

use crate::op_code::OpCode;
use crate::{ExecutionContext, StackItem, VmResult};

pub fn dispatch(ctx: &mut ExecutionContext, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::ToAltStack => {
            let item = ctx.eval_stack.pop()?;
            ctx.alt_stack.push(item);
        }
        OpCode::FromAltStack => {
            let item = ctx.alt_stack.pop()?;
            ctx.eval_stack.push(item);
        }
        OpCode::DupFromAltStack => {
            let item = ctx.alt_stack.peek(0)?.clone();
            ctx.eval_stack.push(item);
        }
        OpCode::Drop => {
            ctx.eval_stack.pop()?;
        }
        OpCode::Dup => {
            let item = ctx.eval_stack.peek(0)?.clone();
            ctx.eval_stack.push(item);
        }
        OpCode::Nip => {
            ctx.eval_stack.remove(1)?;
        }
        OpCode::Over => {
            let item = ctx.eval_stack.peek(1)?.clone();
            ctx.eval_stack.push(item);
        }
        OpCode::Pick => {
            let n = ctx.eval_stack.pop()?.as_index()?;
            let item = non_negative(n).and_then(|n| ctx.eval_stack.peek(n))?.clone();
            ctx.eval_stack.push(item);
        }
        OpCode::Roll => {
            let n = ctx.eval_stack.pop()?.as_index()?;
            let index = non_negative(n)?;
            let item = ctx.eval_stack.remove(index)?;
            ctx.eval_stack.push(item);
        }
        OpCode::Rot => {
            let item = ctx.eval_stack.remove(2)?;
            ctx.eval_stack.push(item);
        }
        OpCode::Swap => {
            ctx.eval_stack.swap(0, 1)?;
        }
        OpCode::Tuck => {
            let item = ctx.eval_stack.peek(0)?.clone();
            ctx.eval_stack.insert(2, item)?;
        }
        OpCode::XDrop => {
            let n = ctx.eval_stack.pop()?.as_index()?;
            ctx.eval_stack.remove(non_negative(n)?)?;
        }
        OpCode::XSwap => {
            let n = ctx.eval_stack.pop()?.as_index()?;
            ctx.eval_stack.swap(0, non_negative(n)?)?;
        }
        OpCode::XTuck => {
            let n = ctx.eval_stack.pop()?.as_index()?;
            let item = ctx.eval_stack.peek(0)?.clone();
            ctx.eval_stack.insert(non_negative(n)?, item)?;
        }
        OpCode::Depth => {
            ctx.eval_stack.push(StackItem::int(ctx.eval_stack.len() as i64));
        }
        _ => unreachable!("stack_ops::dispatch called with unrelated opcode"),
    }
    Ok(())
}

fn non_negative(n: i64) -> VmResult<usize> {
    if n < 0 {
        Err(crate::VmError::IndexOutOfBounds { index: n, len: 0 })
    } else {
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Rc::new(vec![]))
    }

    #[test]
    fn swap_exchanges_top_two() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(1));
        c.eval_stack.push(StackItem::int(2));
        dispatch(&mut c, OpCode::Swap).unwrap();
        assert_eq!(c.eval_stack.pop().unwrap().as_int().unwrap(), 1.into());
        assert_eq!(c.eval_stack.pop().unwrap().as_int().unwrap(), 2.into());
    }

    #[test]
    fn depth_reports_item_count() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(1));
        c.eval_stack.push(StackItem::int(2));
        dispatch(&mut c, OpCode::Depth).unwrap();
        assert_eq!(c.eval_stack.pop().unwrap().as_int().unwrap(), 2.into());
    }

    #[test]
    fn pick_copies_without_removing() {
        let mut c = ctx();
        c.eval_stack.push(StackItem::int(10));
        c.eval_stack.push(StackItem::int(20));
        c.eval_stack.push(StackItem::int(1)); // pick index 1 -> the 10
        dispatch(&mut c, OpCode::Pick).unwrap();
        assert_eq!(c.eval_stack.pop().unwrap().as_int().unwrap(), 10.into());
        assert_eq!(c.eval_stack.len(), 2);
    }
}

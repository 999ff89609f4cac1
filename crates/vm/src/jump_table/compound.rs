// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Array, struct, and map operations.

use crate::op_code::OpCode;
use crate::{ExecutionContext, StackItem, VmError, VmResult};

pub fn dispatch(ctx: &mut ExecutionContext, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::NewArray => {
            let top = ctx.eval_stack.pop()?;
            let items = match &top {
                StackItem::Array(a) | StackItem::Struct(a) => a.borrow().clone(),
                other => vec![StackItem::Boolean(false); non_negative(other.as_index()?)?],
            };
            ctx.eval_stack.push(StackItem::array(items));
        }
        OpCode::NewStruct => {
            let top = ctx.eval_stack.pop()?;
            let items = match &top {
                StackItem::Array(a) | StackItem::Struct(a) => a.borrow().clone(),
                other => vec![StackItem::Boolean(false); non_negative(other.as_index()?)?],
            };
            ctx.eval_stack.push(StackItem::new_struct(items));
        }
        OpCode::NewMap => {
            ctx.eval_stack.push(StackItem::map());
        }
        OpCode::ArraySize => {
            let top = ctx.eval_stack.pop()?;
            let len = match &top {
                StackItem::Array(a) | StackItem::Struct(a) => a.borrow().len(),
                StackItem::Map(m) => m.borrow().len(),
                _ => return Err(VmError::InvalidCast {
                    context: "ARRAYSIZE requires an array, struct, or map",
                }),
            };
            ctx.eval_stack.push(StackItem::int(len as i64));
        }
        OpCode::PickItem => {
            let key = ctx.eval_stack.pop()?;
            let container = ctx.eval_stack.pop()?;
            let value = match &container {
                StackItem::Array(a) | StackItem::Struct(a) => {
                    let items = a.borrow();
                    let index = bounds_checked(key.as_index()?, items.len())?;
                    items[index].clone()
                }
                StackItem::Map(m) => map_get(m, &key)?,
                _ => {
                    return Err(VmError::InvalidCast {
                        context: "PICKITEM requires an array, struct, or map",
                    })
                }
            };
            ctx.eval_stack.push(value);
        }
        OpCode::SetItem => {
            let value = ctx.eval_stack.pop()?;
            let key = ctx.eval_stack.pop()?;
            let container = ctx.eval_stack.pop()?;
            match &container {
                StackItem::Array(a) | StackItem::Struct(a) => {
                    let mut items = a.borrow_mut();
                    let index = bounds_checked(key.as_index()?, items.len())?;
                    items[index] = value;
                }
                StackItem::Map(m) => {
                    let mut entries = m.borrow_mut();
                    if let Some(slot) = entries.iter_mut().find(|(k, _)| matches_key(k, &key)) {
                        slot.1 = value;
                    } else {
                        entries.push((key, value));
                    }
                }
                _ => {
                    return Err(VmError::InvalidCast {
                        context: "SETITEM requires an array, struct, or map",
                    })
                }
            }
        }
        OpCode::Append => {
            let value = ctx.eval_stack.pop()?;
            let container = ctx.eval_stack.pop()?;
            let items = container.as_array_ref()?;
            items.borrow_mut().push(value);
        }
        OpCode::Remove => {
            let key = ctx.eval_stack.pop()?;
            let container = ctx.eval_stack.pop()?;
            match &container {
                StackItem::Array(a) | StackItem::Struct(a) => {
                    let mut items = a.borrow_mut();
                    let index = bounds_checked(key.as_index()?, items.len())?;
                    items.remove(index);
                }
                StackItem::Map(m) => {
                    let mut entries = m.borrow_mut();
                    entries.retain(|(k, _)| !matches_key(k, &key));
                }
                _ => {
                    return Err(VmError::InvalidCast {
                        context: "REMOVE requires an array, struct, or map",
                    })
                }
            }
        }
        OpCode::HasKey => {
            let key = ctx.eval_stack.pop()?;
            let container = ctx.eval_stack.pop()?;
            let found = match &container {
                StackItem::Array(a) | StackItem::Struct(a) => {
                    (key.as_index()? as usize) < a.borrow().len()
                }
                StackItem::Map(m) => m.borrow().iter().any(|(k, _)| matches_key(k, &key)),
                _ => {
                    return Err(VmError::InvalidCast {
                        context: "HASKEY requires an array, struct, or map",
                    })
                }
            };
            ctx.eval_stack.push(StackItem::Boolean(found));
        }
        OpCode::Keys => {
            let container = ctx.eval_stack.pop()?;
            let map = container.as_map_ref()?;
            let keys = map.borrow().iter().map(|(k, _)| k.clone()).collect();
            ctx.eval_stack.push(StackItem::array(keys));
        }
        OpCode::Values => {
            let container = ctx.eval_stack.pop()?;
            let values = match &container {
                StackItem::Map(m) => m.borrow().iter().map(|(_, v)| v.clone()).collect(),
                StackItem::Array(a) | StackItem::Struct(a) => a.borrow().clone(),
                _ => {
                    return Err(VmError::InvalidCast {
                        context: "VALUES requires an array, struct, or map",
                    })
                }
            };
            ctx.eval_stack.push(StackItem::array(values));
        }
        _ => unreachable!("compound::dispatch called with unrelated opcode"),
    }
    Ok(())
}

fn non_negative(n: i64) -> VmResult<usize> {
    if n < 0 {
        Err(VmError::IndexOutOfBounds { index: n, len: 0 })
    } else {
        Ok(n as usize)
    }
}

fn bounds_checked(index: i64, len: usize) -> VmResult<usize> {
    if index < 0 || index as usize >= len {
        Err(VmError::IndexOutOfBounds { index, len })
    } else {
        Ok(index as usize)
    }
}

fn matches_key(a: &StackItem, b: &StackItem) -> bool {
    a.vm_equals(b).unwrap_or(false)
}

fn map_get(map: &crate::stack_item::MapRef, key: &StackItem) -> VmResult<StackItem> {
    map.borrow()
        .iter()
        .find(|(k, _)| matches_key(k, key))
        .map(|(_, v)| v.clone())
        .ok_or(VmError::IndexOutOfBounds { index: 0, len: 0 })
}

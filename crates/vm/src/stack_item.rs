// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! The tagged value type that flows through the evaluation and alt stacks.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{VmError, VmResult};

/// Shared handle to a mutable compound value (array/struct/map).
///
/// Neo's arrays and structs are reference types: `APPEND`/`SETITEM` mutate
/// whatever the stack item points to, visible through every other
/// reference to the same object. `Rc<RefCell<_>>` models that without
/// requiring the VM to be `Send` (it never suspends, per spec §5).
pub type ArrayRef = Rc<RefCell<Vec<StackItem>>>;
/// Shared handle to a map's key/value pairs, searched linearly.
pub type MapRef = Rc<RefCell<Vec<(StackItem, StackItem)>>>;

/// A polymorphic VM value.
#[derive(Clone)]
pub enum StackItem {
    /// Arbitrary-precision signed integer.
    Integer(BigInt),
    /// `true`/`false`.
    Boolean(bool),
    /// An immutable byte string (also used for raw pushed data).
    ByteString(Vec<u8>),
    /// An ordered, mutable, reference-typed collection.
    Array(ArrayRef),
    /// Same representation as `Array`, compared and tagged distinctly.
    Struct(ArrayRef),
    /// An unordered key/value collection.
    Map(MapRef),
    /// An opaque handle to a host-side object (never serialized).
    InteropInterface(Rc<dyn Any>),
}

impl StackItem {
    /// Builds an array item from owned elements.
    pub fn array(items: Vec<StackItem>) -> Self {
        StackItem::Array(Rc::new(RefCell::new(items)))
    }

    /// Builds a struct item from owned elements.
    pub fn new_struct(items: Vec<StackItem>) -> Self {
        StackItem::Struct(Rc::new(RefCell::new(items)))
    }

    /// Builds an empty map item.
    pub fn map() -> Self {
        StackItem::Map(Rc::new(RefCell::new(Vec::new())))
    }

    /// Shorthand for a byte-string item.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        StackItem::ByteString(bytes.into())
    }

    /// Shorthand for an integer item.
    pub fn int(value: impl Into<BigInt>) -> Self {
        StackItem::Integer(value.into())
    }

    /// Boolean interpretation: empty bytearray or numeric zero is `false`,
    /// everything else is `true` (spec §4.2 edge-case policy).
    pub fn as_bool(&self) -> bool {
        match self {
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|byte| *byte != 0),
            StackItem::Array(_) | StackItem::Struct(_) | StackItem::Map(_) => true,
            StackItem::InteropInterface(_) => true,
        }
    }

    /// Converts to a little-endian two's-complement byte array, the form
    /// integer conversion from a bytearray expects (spec §4.2).
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::ByteString(b) => Ok(b.clone()),
            StackItem::Boolean(b) => Ok(vec![if *b { 1 } else { 0 }]),
            StackItem::Integer(i) => Ok(i.to_signed_bytes_le()),
            _ => Err(VmError::InvalidCast {
                context: "item cannot be converted to a byte array",
            }),
        }
    }

    /// Parses this item as an arbitrary-precision integer, per the
    /// little-endian two's-complement conversion rule.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::Boolean(b) => Ok(BigInt::from(if *b { 1 } else { 0 })),
            StackItem::ByteString(b) => {
                if b.is_empty() {
                    Ok(BigInt::zero())
                } else {
                    Ok(BigInt::from_signed_bytes_le(b))
                }
            }
            _ => Err(VmError::InvalidCast {
                context: "item cannot be converted to an integer",
            }),
        }
    }

    /// Borrows this item as an array/struct's backing `Rc`, failing for
    /// anything else.
    pub fn as_array_ref(&self) -> VmResult<&ArrayRef> {
        match self {
            StackItem::Array(a) | StackItem::Struct(a) => Ok(a),
            _ => Err(VmError::InvalidCast {
                context: "item is not an array or struct",
            }),
        }
    }

    /// Borrows this item as a map's backing `Rc`, failing for anything else.
    pub fn as_map_ref(&self) -> VmResult<&MapRef> {
        match self {
            StackItem::Map(m) => Ok(m),
            _ => Err(VmError::InvalidCast {
                context: "item is not a map",
            }),
        }
    }

    /// `EQUAL` semantics: bytearray equality (spec §4.2). Booleans and
    /// integers compare via their byte encoding like any other bytearray;
    /// compound types are never equal via `EQUAL`.
    pub fn vm_equals(&self, other: &StackItem) -> VmResult<bool> {
        match (self, other) {
            (StackItem::Array(_), _)
            | (StackItem::Struct(_), _)
            | (StackItem::Map(_), _)
            | (_, StackItem::Array(_))
            | (_, StackItem::Struct(_))
            | (_, StackItem::Map(_)) => Err(VmError::InvalidCast {
                context: "EQUAL does not support compound types",
            }),
            _ => Ok(self.as_bytes()? == other.as_bytes()?),
        }
    }

    /// Index into a fixed-point 32-bit count, used by e.g. `PICK`/`ROLL`.
    pub fn as_index(&self) -> VmResult<i64> {
        self.as_int()?.to_i64().ok_or(VmError::InvalidCast {
            context: "index does not fit in 64 bits",
        })
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackItem::Integer(i) => write!(f, "Integer({})", i),
            StackItem::Boolean(b) => write!(f, "Boolean({})", b),
            StackItem::ByteString(b) => write!(f, "ByteString(0x{})", hex_string(b)),
            StackItem::Array(a) => write!(f, "Array(len={})", a.borrow().len()),
            StackItem::Struct(a) => write!(f, "Struct(len={})", a.borrow().len()),
            StackItem::Map(m) => write!(f, "Map(len={})", m.borrow().len()),
            StackItem::InteropInterface(_) => write!(f, "InteropInterface"),
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_interpretation_matches_spec() {
        assert!(!StackItem::bytes(Vec::<u8>::new()).as_bool());
        assert!(!StackItem::int(0).as_bool());
        assert!(StackItem::int(1).as_bool());
        assert!(StackItem::bytes(vec![0, 0, 1]).as_bool());
    }

    #[test]
    fn equal_is_bytearray_equality() {
        let a = StackItem::int(5);
        let b = StackItem::bytes(vec![5]);
        assert!(a.vm_equals(&b).unwrap());
    }

    #[test]
    fn equal_rejects_compound_types() {
        let a = StackItem::array(vec![]);
        let b = StackItem::array(vec![]);
        assert!(a.vm_equals(&b).is_err());
    }
}

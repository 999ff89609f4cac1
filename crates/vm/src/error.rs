// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use thiserror::Error;

/// Every way a script execution step can FAULT.
///
/// Any handler that returns one of these leaves the engine in
/// [`crate::VMState::FAULT`]; none of them are recoverable within the same
/// run (the invocation stack is left exactly where execution stopped).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Popped (or peeked at an index into) an empty stack.
    #[error("stack underflow: {context}")]
    StackUnderflow { context: &'static str },

    /// Instruction pointer left the bounds of the current script.
    #[error("instruction pointer {ip} out of script bounds [0, {len})")]
    InvalidInstructionPointer { ip: i64, len: usize },

    /// A jump target landed outside the script.
    #[error("jump target {target} out of script bounds [0, {len}]")]
    InvalidJumpTarget { target: i64, len: usize },

    /// An unrecognized opcode byte was read.
    #[error("unknown opcode 0x{opcode:02x}")]
    UnknownOpcode { opcode: u8 },

    /// A PUSHDATA/PUSHBYTES ran out of script before reading its operand.
    #[error("truncated operand for opcode 0x{opcode:02x}: wanted {wanted} bytes")]
    TruncatedOperand { opcode: u8, wanted: usize },

    /// RET was executed with no caller frame to return to.
    #[error("RET with empty invocation stack")]
    InvocationStackEmpty,

    /// A THROW (or a faulting builtin) with no handler.
    #[error("unhandled exception: {0}")]
    UnhandledException(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivideByZero,

    /// A shift amount was negative or otherwise out of range.
    #[error("invalid shift amount {0}")]
    InvalidShift(i64),

    /// An item could not be converted to the type an opcode required.
    #[error("invalid cast: {context}")]
    InvalidCast { context: &'static str },

    /// A collection index was out of bounds.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// A configured limit (stack depth, item size, array size) was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! The dispatch loop: reads one opcode from the current frame, looks it up
//! in [`crate::jump_table`], and applies the result, faulting the whole
//! engine on the first error (spec §4.2/§8).

use crate::execution_context::ExecutionContext;
use crate::{jump_table, SignatureVerifier, Stack, VMState, VmError, VmResult};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{trace, warn};

/// Configurable resource ceilings. The spec calls these "implementation
/// parameters" (§4.2 edge-case policy); defaults are generous enough not
/// to bite ordinary verification scripts.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum combined depth of every frame's evaluation + alt stack.
    pub max_stack_size: usize,
    /// Maximum byte length of a single bytearray/integer item.
    pub max_item_size: usize,
    /// Maximum depth of the invocation stack (bounds recursive `CALL`).
    pub max_invocation_stack_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stack_size: 2 * 1024,
            max_item_size: 1024 * 1024,
            max_invocation_stack_depth: 1024,
        }
    }
}

/// A synchronous stack-machine run. Never suspends; constructed, loaded
/// with a script, and driven to completion within one call (spec §5).
pub struct ExecutionEngine {
    invocation_stack: Vec<ExecutionContext>,
    state: VMState,
    result_stack: Stack,
    pub(crate) crypto: Arc<dyn SignatureVerifier>,
    /// The hashable bytes `CHECKSIG`/`CHECKMULTISIG` verify against
    /// (typically a transaction's signing payload). Empty until set by the
    /// caller driving a witness check.
    pub message: Vec<u8>,
    pub limits: Limits,
}

impl ExecutionEngine {
    /// Creates an idle engine using `crypto` for signature opcodes.
    pub fn new(crypto: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            invocation_stack: Vec::new(),
            state: VMState::NONE,
            result_stack: Stack::new(),
            crypto,
            message: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// Pushes a new frame executing `script` onto the invocation stack.
    pub fn load_script(&mut self, script: Vec<u8>) -> VmResult<()> {
        if self.invocation_stack.len() >= self.limits.max_invocation_stack_depth {
            return Err(VmError::LimitExceeded("invocation stack depth"));
        }
        self.invocation_stack
            .push(ExecutionContext::new(Rc::new(script)));
        Ok(())
    }

    /// Current VM state.
    pub fn state(&self) -> VMState {
        self.state
    }

    /// The top frame, if any is loaded.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// Mutable access to the top frame.
    pub fn current_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.invocation_stack.last_mut()
    }

    /// The whole call stack, outermost first.
    pub fn invocation_stack(&self) -> &[ExecutionContext] {
        &self.invocation_stack
    }

    /// Mutable access to the whole call stack.
    pub fn invocation_stack_mut(&mut self) -> &mut Vec<ExecutionContext> {
        &mut self.invocation_stack
    }

    /// The final frame's evaluation stack, populated once the engine HALTs.
    pub fn result_stack(&self) -> &Stack {
        &self.result_stack
    }

    /// Drives the engine to HALT, FAULT, or BREAK, running [`Self::step`]
    /// until it stops returning `NONE`.
    pub fn execute(&mut self) -> VMState {
        if self.state == VMState::NONE && self.invocation_stack.is_empty() {
            self.state = VMState::HALT;
            return self.state;
        }
        loop {
            let state = self.step();
            if state != VMState::NONE {
                return state;
            }
        }
    }

    /// Runs exactly one instruction (or one frame-unload), returning the
    /// resulting state. Returns `NONE` while execution should continue.
    pub fn step(&mut self) -> VMState {
        if self.state.is_halt() || self.state.is_fault() {
            return self.state;
        }

        let frame_done = match self.current_context() {
            None => true,
            Some(ctx) => ctx.at_end(),
        };

        if frame_done {
            let finished = self.invocation_stack.pop();
            if self.invocation_stack.is_empty() {
                if let Some(ctx) = finished {
                    self.result_stack = ctx.eval_stack;
                }
                self.state = VMState::HALT;
            }
            return self.state;
        }

        match jump_table::execute(self) {
            Ok(()) => VMState::NONE,
            Err(err) => {
                warn!(error = %err, "script faulted");
                self.state = VMState::FAULT;
                self.state
            }
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("state", &self.state)
            .field("depth", &self.invocation_stack.len())
            .finish()
    }
}

pub(crate) fn trace_step(opcode: u8, ip: i64) {
    trace!(opcode = format!("0x{:02x}", opcode), ip, "executing instruction");
}

// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! VM execution state flags.

use bitflags::bitflags;

bitflags! {
    /// Indicates the status of the virtual machine.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct VMState: u8 {
        /// Execution has not started, or a step just completed normally.
        const NONE = 0;
        /// Execution completed successfully (instruction pointer ran off the script).
        const HALT = 1 << 0;
        /// Execution terminated because of an unhandled fault.
        const FAULT = 1 << 1;
        /// Execution is paused at a breakpoint.
        const BREAK = 1 << 2;
    }
}

impl VMState {
    /// `true` once the VM has halted successfully.
    pub fn is_halt(self) -> bool {
        self.contains(VMState::HALT)
    }

    /// `true` once the VM has faulted.
    pub fn is_fault(self) -> bool {
        self.contains(VMState::FAULT)
    }

    /// `true` while execution is still progressing (neither halted nor faulted).
    pub fn is_running(self) -> bool {
        !self.is_halt() && !self.is_fault()
    }
}

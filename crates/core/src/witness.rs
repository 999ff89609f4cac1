// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

/// A verification/invocation script pair attached to a signed object.
///
/// Evaluated by the Script VM (`neo-vm`) against a `Ledger::verify_witness`
/// call; constructing and checking signatures is outside this crate's scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness {
    /// Bytecode that produces the arguments consumed by `verification_script`.
    pub invocation_script: Vec<u8>,
    /// Bytecode that must evaluate to `true` on the top of the stack.
    pub verification_script: Vec<u8>,
}

impl Witness {
    /// Creates a witness from its two scripts.
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }
}

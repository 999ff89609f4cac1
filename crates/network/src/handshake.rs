// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! The four-bit handshake state machine (spec §3, §4.3).
//!
//! Modeled as a tagged struct with guarded transitions rather than raw
//! boolean flags, so illegal orderings (a second Version, a VerAck before
//! both Versions) are caught at the point of the attempted transition
//! instead of by inspecting the bitset after the fact.

use crate::error::NetworkError;

/// Tracks which of the four handshake messages have been exchanged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeState {
    version_sent: bool,
    version_received: bool,
    verack_sent: bool,
    verack_received: bool,
}

impl HandshakeState {
    /// A fresh, pre-handshake state.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once all four bits are set.
    pub fn is_handshaked(&self) -> bool {
        self.version_sent && self.version_received && self.verack_sent && self.verack_received
    }

    /// Records that we sent our Version. Fails on a duplicate send.
    pub fn send_version(&mut self) -> Result<(), NetworkError> {
        if self.version_sent {
            return Err(NetworkError::HandshakeViolation("Version already sent"));
        }
        self.version_sent = true;
        Ok(())
    }

    /// Records the peer's Version. Fails on a duplicate receive.
    pub fn receive_version(&mut self) -> Result<(), NetworkError> {
        if self.version_received {
            return Err(NetworkError::HandshakeViolation("Version already received"));
        }
        self.version_received = true;
        Ok(())
    }

    /// Records that we sent VerAck. Requires both Version flags set first.
    pub fn send_verack(&mut self) -> Result<(), NetworkError> {
        if !(self.version_sent && self.version_received) {
            return Err(NetworkError::HandshakeViolation(
                "VerAck sent before both Versions were exchanged",
            ));
        }
        if self.verack_sent {
            return Err(NetworkError::HandshakeViolation("VerAck already sent"));
        }
        self.verack_sent = true;
        Ok(())
    }

    /// Records the peer's VerAck. Requires both Version flags set first.
    pub fn receive_verack(&mut self) -> Result<(), NetworkError> {
        if !(self.version_sent && self.version_received) {
            return Err(NetworkError::HandshakeViolation(
                "VerAck received before both Versions were exchanged",
            ));
        }
        if self.verack_received {
            return Err(NetworkError::HandshakeViolation("VerAck already received"));
        }
        self.verack_received = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_handshake_in_either_send_receive_order() {
        let mut s = HandshakeState::new();
        s.receive_version().unwrap();
        s.send_version().unwrap();
        s.receive_verack().unwrap();
        s.send_verack().unwrap();
        assert!(s.is_handshaked());
    }

    #[test]
    fn resending_version_is_a_violation() {
        let mut s = HandshakeState::new();
        s.send_version().unwrap();
        assert!(s.send_version().is_err());
    }

    #[test]
    fn verack_before_both_versions_is_a_violation() {
        let mut s = HandshakeState::new();
        s.send_version().unwrap();
        assert!(s.send_verack().is_err());
        assert!(s.receive_verack().is_err());
    }
}

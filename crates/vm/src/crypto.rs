// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Hashing used directly by `SHA1`/`SHA256`/`HASH160`/`HASH256`, and a
//! pluggable signature checker for `CHECKSIG`/`CHECKMULTISIG`.
//!
//! Signature verification is a cryptographic primitive the spec assumes is
//! available as a pure function supplied by the caller (spec §1
//! non-goals); the engine is constructed with a [`SignatureVerifier`] and
//! never implements ECDSA itself.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Verifies a signature over a message with a given public key.
///
/// The concrete curve/scheme is left to the implementation; the VM only
/// needs a boolean answer.
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` if `signature` is a valid signature of `message`
    /// under `public_key`.
    fn verify(&self, message: &[u8], public_key: &[u8], signature: &[u8]) -> bool;
}

/// A verifier that always rejects, suitable for scripts that never reach a
/// `CHECKSIG`/`CHECKMULTISIG` and for tests that only exercise the
/// structural dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSignatureVerifier;

impl SignatureVerifier for NullSignatureVerifier {
    fn verify(&self, _message: &[u8], _public_key: &[u8], _signature: &[u8]) -> bool {
        false
    }
}

/// SHA-1 digest.
pub fn sha1(data: &[u8]) -> Vec<u8> {
    use sha1::{Digest as Sha1Digest, Sha1};
    Sha1::digest(data).to_vec()
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// RIPEMD-160 of SHA-256 (script-hash style).
pub fn hash160(data: &[u8]) -> Vec<u8> {
    Ripemd160::digest(Sha256::digest(data)).to_vec()
}

/// SHA-256 of SHA-256 (block-hash style).
pub fn hash256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(Sha256::digest(data)).to_vec()
}

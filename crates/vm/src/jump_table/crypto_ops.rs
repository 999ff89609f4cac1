// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Hashing and signature-check opcodes. Signature verification is
//! delegated to the engine's [`crate::SignatureVerifier`]; this module
//! only handles stack bookkeeping.

use crate::crypto;
use crate::op_code::OpCode;
use crate::{ExecutionEngine, StackItem, VmError, VmResult};

pub fn dispatch(engine: &mut ExecutionEngine, opcode: OpCode) -> VmResult<()> {
    match opcode {
        OpCode::Sha1 => hash(engine, crypto::sha1),
        OpCode::Sha256 => hash(engine, crypto::sha256),
        OpCode::Hash160 => hash(engine, crypto::hash160),
        OpCode::Hash256 => hash(engine, crypto::hash256),
        OpCode::CheckSig => check_sig(engine),
        OpCode::CheckMultisig => check_multisig(engine),
        _ => unreachable!("crypto_ops::dispatch called with unrelated opcode"),
    }
}

fn hash(engine: &mut ExecutionEngine, f: impl Fn(&[u8]) -> Vec<u8>) -> VmResult<()> {
    let ctx = engine.current_context_mut().expect("frame present");
    let data = ctx.eval_stack.pop()?.as_bytes()?;
    ctx.eval_stack.push(StackItem::bytes(f(&data)));
    Ok(())
}

fn check_sig(engine: &mut ExecutionEngine) -> VmResult<()> {
    let message = engine.message.clone();
    let crypto = engine.crypto.clone();
    let ctx = engine.current_context_mut().expect("frame present");
    let pubkey = ctx.eval_stack.pop()?.as_bytes()?;
    let signature = ctx.eval_stack.pop()?.as_bytes()?;
    let ok = crypto.verify(&message, &pubkey, &signature);
    ctx.eval_stack.push(StackItem::Boolean(ok));
    Ok(())
}

fn check_multisig(engine: &mut ExecutionEngine) -> VmResult<()> {
    let message = engine.message.clone();
    let crypto = engine.crypto.clone();
    let ctx = engine.current_context_mut().expect("frame present");

    let pubkey_count = ctx.eval_stack.pop()?.as_index()?;
    if pubkey_count < 0 {
        return Err(VmError::IndexOutOfBounds { index: pubkey_count, len: 0 });
    }
    let mut pubkeys = Vec::with_capacity(pubkey_count as usize);
    for _ in 0..pubkey_count {
        pubkeys.push(ctx.eval_stack.pop()?.as_bytes()?);
    }

    let sig_count = ctx.eval_stack.pop()?.as_index()?;
    if sig_count < 0 || sig_count > pubkey_count {
        return Err(VmError::IndexOutOfBounds { index: sig_count, len: pubkeys.len() });
    }
    let mut signatures = Vec::with_capacity(sig_count as usize);
    for _ in 0..sig_count {
        signatures.push(ctx.eval_stack.pop()?.as_bytes()?);
    }

    // Each signature must match a distinct, strictly later public key than
    // the previous match, mirroring Neo's ordered multisig check.
    let mut pk_index = 0usize;
    let mut all_matched = true;
    for signature in &signatures {
        let mut matched = false;
        while pk_index < pubkeys.len() {
            let pubkey = &pubkeys[pk_index];
            pk_index += 1;
            if crypto.verify(&message, pubkey, signature) {
                matched = true;
                break;
            }
        }
        if !matched {
            all_matched = false;
            break;
        }
    }

    ctx.eval_stack.push(StackItem::Boolean(all_matched));
    Ok(())
}

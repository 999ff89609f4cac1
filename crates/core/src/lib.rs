// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Shared primitives and the narrow `Ledger` collaborator interface.
//!
//! This crate intentionally stays small: it is the seam between the
//! network/VM core (this workspace) and chain persistence, validation, and
//! cryptography, all of which are out of scope here and are assumed to be
//! supplied by a real ledger implementation.

mod error;
mod ledger;
mod uint;
mod witness;

pub use error::CoreError;
pub use ledger::Ledger;
pub use uint::{UInt160, UInt256};
pub use witness::Witness;

/// Result alias used throughout the core crates.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

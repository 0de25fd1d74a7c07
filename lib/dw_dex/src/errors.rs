//! Dex model errors definitions.

use crate::Addr;
use std::fmt;
use thiserror::Error;

/// An alias for result that can be a [`DexError`].
pub type DexResult<T> = Result<T, DexError>;

/// The Dex model error type.
#[derive(Debug, Error)]
pub enum DexError {
    /// Error that can be returned when formatting dex parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    #[error("dex structure is invalid: {0}")]
    Structure(String),

    #[error("could not convert {} into {}", from, to)]
    Conversion { from: String, to: String },

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("Instruction not found (address: {0})")]
    InstructionNotFound(Addr),

    #[error("Bad instruction size at address {addr}: expected {expected} code units, got {actual}")]
    BadInstructionSize {
        addr: Addr,
        expected: usize,
        actual: usize,
    },
}

//! Error types for the block model.

use crate::BlockKind;
use thiserror::Error;

/// Block model errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockModelError {
    #[error("Failed to encode {kind:?} block body: {reason}")]
    Encode { kind: BlockKind, reason: String },

    #[error("Failed to decode {kind:?} block body: {reason}")]
    Decode { kind: BlockKind, reason: String },

    #[error("Unknown block type tag: {0}")]
    UnknownType(String),

    #[error("File size mismatch: declared {declared} bytes, received {received}")]
    SizeMismatch { declared: u64, received: u64 },
}

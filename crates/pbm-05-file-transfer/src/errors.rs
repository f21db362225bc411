//! File transfer errors.

use pbm_01_block_model::TransferStatus;
use shared_types::{AttemptId, BlockId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Unknown transfer for block {0}")]
    UnknownTransfer(BlockId),

    #[error("Invalid transfer transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransferStatus,
        to: TransferStatus,
    },

    #[error("Report for stale attempt {got}")]
    StaleAttempt { got: AttemptId },

    #[error("Progress {0}% is out of range")]
    ProgressOutOfRange(u8),

    #[error("Retry limit reached after {retries} retries")]
    RetryLimitReached { retries: u32 },

    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },
}

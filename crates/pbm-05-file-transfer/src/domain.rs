//! Transfer records and configuration.

use pbm_01_block_model::{FileBlock, TransferStatus};
use shared_types::AttemptId;

/// File transfer configuration.
#[derive(Clone, Debug)]
pub struct TransferConfig {
    /// Retries allowed after the first attempt fails.
    pub max_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// One observable status transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub attempt: AttemptId,
    pub status: TransferStatus,
    pub progress: u8,
}

/// Result of a progress report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Progress moved forward.
    Applied(u8),
    /// Same value as before.
    Unchanged,
    /// Lower than the last recorded value for this attempt.
    Ignored { last: u8, reported: u8 },
    Completed,
    /// Reached 100% but the byte count did not match.
    Failed { reason: String },
}

/// Tracked state of one file block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    pub declared_size: u64,
    pub status: TransferStatus,
    pub progress: u8,
    pub attempt: Option<AttemptId>,
    pub retry_count: u32,
    pub failure: Option<String>,
    pub history: Vec<StatusChange>,
}

impl TransferRecord {
    pub fn new(declared_size: u64) -> Self {
        Self {
            declared_size,
            status: TransferStatus::Pending,
            progress: 0,
            attempt: None,
            retry_count: 0,
            failure: None,
            history: Vec::new(),
        }
    }

    /// Moves to `status` and appends the change to the history.
    pub(crate) fn transition(&mut self, attempt: AttemptId, status: TransferStatus, progress: u8) {
        self.status = status;
        self.progress = progress;
        self.attempt = Some(attempt);
        self.history.push(StatusChange {
            attempt,
            status,
            progress,
        });
    }

    /// Writes the derived fields into a file block.
    pub fn apply_to(&self, block: &mut FileBlock) {
        block.transfer_status = self.status;
        block.transfer_progress = self.progress;
        block.retry_count = (self.retry_count > 0).then_some(self.retry_count);
    }
}

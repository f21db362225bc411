//! Per-conversation transfer state machines.

use std::collections::HashMap;

use pbm_01_block_model::{FileBlock, TransferStatus};
use shared_types::{AttemptId, BlockId};
use tracing::{debug, info, warn};

use crate::domain::{ProgressOutcome, TransferConfig, TransferRecord};
use crate::TransferError;

/// Transfers of one conversation, keyed by file block id.
#[derive(Debug, Default)]
pub struct FileTransferTracker {
    config: TransferConfig,
    transfers: HashMap<BlockId, TransferRecord>,
}

impl FileTransferTracker {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            transfers: HashMap::new(),
        }
    }

    /// Starts tracking a file block in `pending`. Returns `false` if already tracked.
    pub fn track(&mut self, block_id: BlockId, file: &FileBlock) -> bool {
        if self.transfers.contains_key(&block_id) {
            return false;
        }
        self.transfers
            .insert(block_id, TransferRecord::new(file.size));
        true
    }

    pub fn record(&self, block_id: &BlockId) -> Option<&TransferRecord> {
        self.transfers.get(block_id)
    }

    fn record_mut(&mut self, block_id: BlockId) -> Result<&mut TransferRecord, TransferError> {
        self.transfers
            .get_mut(&block_id)
            .ok_or(TransferError::UnknownTransfer(block_id))
    }

    /// `pending → transferring`. Returns the first attempt id.
    pub fn start(&mut self, block_id: BlockId) -> Result<AttemptId, TransferError> {
        let record = self.record_mut(block_id)?;
        if record.status != TransferStatus::Pending {
            return Err(TransferError::InvalidTransition {
                from: record.status,
                to: TransferStatus::Transferring,
            });
        }

        let attempt = AttemptId::new();
        record.transition(attempt, TransferStatus::Transferring, 0);
        info!(%block_id, %attempt, "Transfer started");
        Ok(attempt)
    }

    /// Applies a progress report for `attempt`.
    ///
    /// Reaching 100% completes the transfer, subject to the size check.
    pub fn report_progress(
        &mut self,
        block_id: BlockId,
        attempt: AttemptId,
        percent: u8,
        received_bytes: u64,
    ) -> Result<ProgressOutcome, TransferError> {
        if percent > 100 {
            return Err(TransferError::ProgressOutOfRange(percent));
        }

        let record = self.record_mut(block_id)?;
        check_active(record, attempt)?;

        if percent < record.progress {
            warn!(
                %block_id,
                %attempt,
                last = record.progress,
                reported = percent,
                "Out-of-order progress ignored"
            );
            return Ok(ProgressOutcome::Ignored {
                last: record.progress,
                reported: percent,
            });
        }

        if percent == 100 {
            return Ok(match self.complete(block_id, attempt, received_bytes) {
                Ok(()) => ProgressOutcome::Completed,
                Err(TransferError::TransferFailed { reason }) => ProgressOutcome::Failed { reason },
                Err(other) => return Err(other),
            });
        }

        if percent == record.progress {
            return Ok(ProgressOutcome::Unchanged);
        }

        record.transition(attempt, TransferStatus::Transferring, percent);
        debug!(%block_id, %attempt, percent, "Transfer progress");
        Ok(ProgressOutcome::Applied(percent))
    }

    /// Completes the attempt if `received_bytes` matches the declared size.
    ///
    /// A mismatch fails the transfer whatever the sender claims.
    pub fn complete(
        &mut self,
        block_id: BlockId,
        attempt: AttemptId,
        received_bytes: u64,
    ) -> Result<(), TransferError> {
        let record = self.record_mut(block_id)?;
        check_active(record, attempt)?;

        if received_bytes != record.declared_size {
            let reason = format!(
                "received {received_bytes} bytes, declared {}",
                record.declared_size
            );
            let progress = record.progress;
            record.failure = Some(reason.clone());
            record.transition(attempt, TransferStatus::Failed, progress);
            warn!(%block_id, %attempt, %reason, "Transfer failed size check");
            return Err(TransferError::TransferFailed { reason });
        }

        record.failure = None;
        record.transition(attempt, TransferStatus::Completed, 100);
        info!(%block_id, %attempt, bytes = received_bytes, "Transfer completed");
        Ok(())
    }

    /// `transferring → failed`.
    pub fn fail(
        &mut self,
        block_id: BlockId,
        attempt: AttemptId,
        reason: impl Into<String>,
    ) -> Result<(), TransferError> {
        let record = self.record_mut(block_id)?;
        check_active(record, attempt)?;

        let reason = reason.into();
        let progress = record.progress;
        warn!(%block_id, %attempt, %reason, "Transfer failed");
        record.failure = Some(reason);
        record.transition(attempt, TransferStatus::Failed, progress);
        Ok(())
    }

    /// `failed → transferring` with a new attempt, progress reset to 0.
    pub fn retry(&mut self, block_id: BlockId) -> Result<AttemptId, TransferError> {
        let max_retries = self.config.max_retries;
        let record = self.record_mut(block_id)?;

        if record.status != TransferStatus::Failed {
            return Err(TransferError::InvalidTransition {
                from: record.status,
                to: TransferStatus::Transferring,
            });
        }
        if record.retry_count >= max_retries {
            return Err(TransferError::RetryLimitReached {
                retries: record.retry_count,
            });
        }

        let attempt = AttemptId::new();
        record.retry_count += 1;
        record.failure = None;
        record.transition(attempt, TransferStatus::Transferring, 0);
        info!(%block_id, %attempt, retry = record.retry_count, "Transfer retried");
        Ok(attempt)
    }

    /// Writes the tracked status into a copy of the file block.
    pub fn apply_to(&self, block_id: &BlockId, file: &mut FileBlock) -> bool {
        match self.transfers.get(block_id) {
            Some(record) => {
                record.apply_to(file);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// The record must be transferring under `attempt`.
fn check_active(record: &TransferRecord, attempt: AttemptId) -> Result<(), TransferError> {
    if record.attempt.is_some_and(|current| current != attempt) {
        return Err(TransferError::StaleAttempt { got: attempt });
    }
    if record.status != TransferStatus::Transferring {
        return Err(TransferError::InvalidTransition {
            from: record.status,
            to: TransferStatus::Transferring,
        });
    }
    Ok(())
}

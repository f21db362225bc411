//! # File Transfer Tracker (pbm-05)
//!
//! Drives the status of every file block through its transfer attempts.
//!
//! ```text
//! [Pending] ──start──→ [Transferring] ──100% + size ok──→ [Completed]
//!                         ↑      │
//!                   retry │      │ fail / size mismatch
//!                         │      ↓
//!                        [Failed]
//! ```
//!
//! - Progress is monotonic within one attempt. Lower reports are ignored,
//!   logged, and never enter the status history.
//! - A retry starts a new attempt (fresh [`AttemptId`], progress 0) on the
//!   same block id. Reports carrying an older attempt id are rejected.
//! - Completion checks the received byte count against the declared size.
//!
//! [`AttemptId`]: shared_types::AttemptId

mod domain;
mod errors;
mod tracker;

pub use domain::{ProgressOutcome, StatusChange, TransferConfig, TransferRecord};
pub use errors::TransferError;
pub use tracker::FileTransferTracker;

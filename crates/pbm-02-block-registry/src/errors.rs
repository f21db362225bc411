//! Registry error types.

use shared_types::{LogicalTimestamp, PeerId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Block type {type_tag} v{version} is already registered")]
    DuplicateRegistration { type_tag: String, version: u32 },

    #[error("Schema violation in {type_tag} v{version}: {reason}")]
    SchemaViolation {
        type_tag: String,
        version: u32,
        reason: String,
    },

    #[error("Block claims sender {claimed_sender} at {claimed_timestamp}, envelope came from {sender} at {sent_at}")]
    ProvenanceMismatch {
        claimed_sender: PeerId,
        claimed_timestamp: LogicalTimestamp,
        sender: PeerId,
        sent_at: LogicalTimestamp,
    },
}

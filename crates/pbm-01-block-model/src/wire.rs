//! Transmitted form of a block.
//!
//! The body is JSON so a peer can carry a block type (or a newer schema
//! version) the receiver does not know; the registry decides how to read it.

use crate::{Block, BlockContent, BlockHeader, BlockKind, BlockModelError};
use serde::{Deserialize, Serialize};
use shared_types::{BlockId, LogicalTimestamp, PeerId};

/// Self-describing block as carried inside an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBlock {
    pub id: BlockId,
    /// Block type tag (`text`, `code`, ... or anything a newer peer invents).
    pub type_tag: String,
    pub schema_version: u32,
    pub sender_id: PeerId,
    pub timestamp: LogicalTimestamp,
    /// JSON-encoded variant body.
    pub body: Vec<u8>,
}

impl WireBlock {
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            id: self.id,
            sender_id: self.sender_id,
            timestamp: self.timestamp,
            schema_version: self.schema_version,
        }
    }

    /// Known kind for this tag, if any.
    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_tag(&self.type_tag)
    }

    /// Parses the body as a JSON value.
    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Strict decode without schema checks. The registry is the normal path.
    pub fn decode(&self) -> Result<Block, BlockModelError> {
        let kind = self
            .kind()
            .ok_or_else(|| BlockModelError::UnknownType(self.type_tag.clone()))?;
        let value = self.body_json().map_err(|e| BlockModelError::Decode {
            kind,
            reason: e.to_string(),
        })?;
        Ok(Block {
            header: self.header(),
            content: BlockContent::from_json_value(kind, value)?,
        })
    }
}

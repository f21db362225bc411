//! # Block Envelope Fields
//!
//! [`Block`] pairs the shared header with one [`BlockContent`] variant.

use crate::{BlockContent, BlockModelError, WireBlock, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use shared_types::{BlockId, LogicalTimestamp, PeerId};

/// Block type, the fieldless discriminant of [`BlockContent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Code,
    File,
    Widget,
    System,
}

impl BlockKind {
    pub const ALL: [BlockKind; 5] = [
        BlockKind::Text,
        BlockKind::Code,
        BlockKind::File,
        BlockKind::Widget,
        BlockKind::System,
    ];

    /// Wire type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Code => "code",
            BlockKind::File => "file",
            BlockKind::Widget => "widget",
            BlockKind::System => "system",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// System blocks are synthesized locally and never accepted from a peer.
    pub fn is_local_only(&self) -> bool {
        matches!(self, BlockKind::System)
    }
}

/// Fields shared by every block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: BlockId,
    pub sender_id: PeerId,
    /// Logical clock value at submission.
    pub timestamp: LogicalTimestamp,
    pub schema_version: u32,
}

/// Immutable content unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub content: BlockContent,
}

impl Block {
    /// Creates a block with a fresh id at the current schema version.
    pub fn new(sender_id: PeerId, timestamp: LogicalTimestamp, content: BlockContent) -> Self {
        Self {
            header: BlockHeader {
                id: BlockId::new(),
                sender_id,
                timestamp,
                schema_version: SCHEMA_VERSION,
            },
            content,
        }
    }

    pub fn id(&self) -> BlockId {
        self.header.id
    }

    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }

    /// Encodes the block into its self-describing transmitted form.
    pub fn to_wire(&self) -> Result<WireBlock, BlockModelError> {
        Ok(WireBlock {
            id: self.header.id,
            type_tag: self.kind().tag().to_string(),
            schema_version: self.header.schema_version,
            sender_id: self.header.sender_id,
            timestamp: self.header.timestamp,
            body: self.content.to_json_body()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileBlock, TextBlock};

    #[test]
    fn test_tag_lookup_covers_all_kinds() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(BlockKind::from_tag("hologram"), None);
    }

    #[test]
    fn test_new_block_has_fresh_id_and_current_schema() {
        let sender = PeerId::new([1u8; 32]);
        let a = Block::new(sender, 1, BlockContent::Text(TextBlock::plain("hi")));
        let b = Block::new(sender, 1, BlockContent::Text(TextBlock::plain("hi")));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.header.schema_version, SCHEMA_VERSION);
        assert_eq!(a.kind(), BlockKind::Text);
    }

    #[test]
    fn test_to_wire_carries_header_and_tag() {
        let sender = PeerId::new([2u8; 32]);
        let block = Block::new(
            sender,
            9,
            BlockContent::File(FileBlock::new("a.png", 5, "image/png")),
        );
        let wire = block.to_wire().unwrap();
        assert_eq!(wire.id, block.id());
        assert_eq!(wire.type_tag, "file");
        assert_eq!(wire.timestamp, 9);
        assert_eq!(wire.sender_id, sender);

        let body: serde_json::Value = serde_json::from_slice(&wire.body).unwrap();
        assert_eq!(body["filename"], "a.png");
    }

    #[test]
    fn test_only_system_is_local_only() {
        let local_only: Vec<_> = BlockKind::ALL
            .into_iter()
            .filter(BlockKind::is_local_only)
            .collect();
        assert_eq!(local_only, vec![BlockKind::System]);
    }
}

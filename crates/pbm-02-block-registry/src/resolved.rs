//! Registry output handed to the rest of the engine.

use pbm_01_block_model::{Block, BlockHeader};
use shared_types::BlockId;

/// A block this node could not read, rendered as a generic placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceholderBlock {
    pub header: BlockHeader,
    pub type_tag: String,
    pub reason: String,
}

/// Either a typed block or a placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedBlock {
    Typed(Block),
    Placeholder(PlaceholderBlock),
}

impl ResolvedBlock {
    pub fn header(&self) -> &BlockHeader {
        match self {
            ResolvedBlock::Typed(block) => &block.header,
            ResolvedBlock::Placeholder(placeholder) => &placeholder.header,
        }
    }

    pub fn id(&self) -> BlockId {
        self.header().id
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ResolvedBlock::Placeholder(_))
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            ResolvedBlock::Typed(block) => Some(block),
            ResolvedBlock::Placeholder(_) => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            ResolvedBlock::Typed(block) => Some(block),
            ResolvedBlock::Placeholder(_) => None,
        }
    }
}

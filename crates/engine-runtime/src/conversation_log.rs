//! # Conversation Log
//!
//! Blocks of one conversation in display order: logical send time, then
//! sender id, then the sender's sequence. Arrival order never matters, so
//! two nodes that saw the same envelopes show the same log.

use std::collections::{BTreeMap, HashMap};

use pbm_01_block_model::{Block, BlockContent, SystemBlock};
use pbm_02_block_registry::ResolvedBlock;
use pbm_03_message_stream::DisplayKey;
use shared_types::{BlockId, LogicalTimestamp, PeerId};

/// Block id breaks ties between narration lines sharing a display key.
type LogKey = (DisplayKey, BlockId);

#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: BTreeMap<LogKey, ResolvedBlock>,
    index: HashMap<BlockId, LogKey>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a block at `key`. Returns `false` if the block id is already logged.
    pub fn insert(&mut self, key: DisplayKey, block: ResolvedBlock) -> bool {
        let id = block.id();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, (key, id));
        self.entries.insert((key, id), block);
        true
    }

    /// Logs a locally synthesized system line at the latest logical time seen,
    /// after the local node's own blocks of that time.
    pub fn narrate(&mut self, local_id: PeerId, line: SystemBlock) -> BlockId {
        let timestamp = self.latest_timestamp();
        let block = Block::new(local_id, timestamp, BlockContent::System(line));
        let id = block.id();
        let key = DisplayKey {
            sent_at: timestamp,
            sender_id: local_id,
            sequence: u64::MAX,
        };
        self.insert(key, ResolvedBlock::Typed(block));
        id
    }

    pub fn get(&self, id: &BlockId) -> Option<&ResolvedBlock> {
        self.index.get(id).and_then(|key| self.entries.get(key))
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.index.contains_key(id)
    }

    /// Blocks in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedBlock> {
        self.entries.values()
    }

    /// Highest logical timestamp in the log, 0 when empty.
    pub fn latest_timestamp(&self) -> LogicalTimestamp {
        self.entries
            .keys()
            .map(|(key, _)| key.sent_at)
            .max()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

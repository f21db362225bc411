//! # Block Registry
//!
//! Catalog of `(type_tag, version) → descriptor`, validated at receipt.

use crate::{BlockDescriptor, Handler, PlaceholderBlock, RegistryError, ResolvedBlock};
use parking_lot::RwLock;
use pbm_01_block_model::{Block, BlockContent, BlockKind, WireBlock, SCHEMA_VERSION};
use shared_types::{LogicalTimestamp, PeerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of [`BlockRegistry::resolve`].
#[derive(Clone, Debug)]
pub struct Resolution {
    pub type_tag: String,
    pub requested_version: u32,
    /// Version actually used; `None` when the fallback was chosen.
    pub resolved_version: Option<u32>,
    pub descriptor: Arc<BlockDescriptor>,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.descriptor.is_fallback()
    }
}

/// Registry of known block types and versions.
///
/// Shared by every conversation through `Arc`; the only state that crosses
/// conversation boundaries.
pub struct BlockRegistry {
    entries: RwLock<HashMap<String, BTreeMap<u32, Arc<BlockDescriptor>>>>,
    fallback: Arc<BlockDescriptor>,
}

impl BlockRegistry {
    /// Empty registry. Everything resolves to the fallback until registered.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fallback: Arc::new(BlockDescriptor::fallback()),
        }
    }

    /// Registry with the current-schema descriptor of every built-in kind.
    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        for kind in BlockKind::ALL {
            // Fresh registry: no duplicates possible.
            let _ = registry.register(kind.tag(), SCHEMA_VERSION, BlockDescriptor::builtin(kind));
        }
        registry
    }

    /// Registers a descriptor for an exact `(type_tag, version)` pair.
    pub fn register(
        &self,
        type_tag: &str,
        version: u32,
        descriptor: BlockDescriptor,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let versions = entries.entry(type_tag.to_string()).or_default();

        if versions.contains_key(&version) {
            return Err(RegistryError::DuplicateRegistration {
                type_tag: type_tag.to_string(),
                version,
            });
        }

        info!(
            type_tag,
            version,
            renderer = descriptor.renderer,
            "Registered block type"
        );
        versions.insert(version, Arc::new(descriptor));
        Ok(())
    }

    /// Newest registered version <= `version`, else the fallback descriptor.
    pub fn resolve(&self, type_tag: &str, version: u32) -> Resolution {
        let entries = self.entries.read();
        let found = entries
            .get(type_tag)
            .and_then(|versions| versions.range(..=version).next_back());

        match found {
            Some((resolved, descriptor)) => Resolution {
                type_tag: type_tag.to_string(),
                requested_version: version,
                resolved_version: Some(*resolved),
                descriptor: descriptor.clone(),
            },
            None => {
                debug!(type_tag, version, "No descriptor, using fallback");
                Resolution {
                    type_tag: type_tag.to_string(),
                    requested_version: version,
                    resolved_version: None,
                    descriptor: self.fallback.clone(),
                }
            }
        }
    }

    /// Validates a block received from a peer and decodes it.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` when the type only resolves to the fallback, when the
    /// type is local-only, or when the body does not match the resolved shape.
    pub fn validate(&self, wire: &WireBlock) -> Result<Block, RegistryError> {
        let resolution = self.resolve(&wire.type_tag, wire.schema_version);
        let violation = |reason: String| RegistryError::SchemaViolation {
            type_tag: wire.type_tag.clone(),
            version: wire.schema_version,
            reason,
        };

        let kind = match resolution.descriptor.handler {
            Handler::Typed(kind) => kind,
            Handler::Fallback => {
                return Err(violation("no descriptor registered".to_string()));
            }
        };

        if resolution.descriptor.local_only {
            return Err(violation("local-only type received from a peer".to_string()));
        }

        let body = wire
            .body_json()
            .map_err(|e| violation(format!("body is not valid JSON: {e}")))?;
        resolution.descriptor.check_body(&body).map_err(violation)?;

        let content = BlockContent::from_json_value(kind, body)
            .map_err(|e| violation(e.to_string()))?;

        Ok(Block {
            header: wire.header(),
            content,
        })
    }

    /// Like [`validate`](Self::validate) but never fails: unreadable blocks
    /// become placeholders so the stream stays alive.
    pub fn accept(&self, wire: &WireBlock) -> ResolvedBlock {
        match self.validate(wire) {
            Ok(block) => ResolvedBlock::Typed(block),
            Err(err) => {
                warn!(
                    block_id = %wire.id,
                    type_tag = %wire.type_tag,
                    version = wire.schema_version,
                    error = %err,
                    "Block degraded to placeholder"
                );
                ResolvedBlock::Placeholder(PlaceholderBlock {
                    header: wire.header(),
                    type_tag: wire.type_tag.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// [`accept`](Self::accept) for a block carried by an envelope from
    /// `sender` stamped `sent_at`.
    ///
    /// A block naming another author or send time is never shown as such: it
    /// becomes a placeholder attributed to the envelope.
    pub fn accept_from(
        &self,
        wire: &WireBlock,
        sender: PeerId,
        sent_at: LogicalTimestamp,
    ) -> ResolvedBlock {
        if wire.sender_id == sender && wire.timestamp == sent_at {
            return self.accept(wire);
        }

        let err = RegistryError::ProvenanceMismatch {
            claimed_sender: wire.sender_id,
            claimed_timestamp: wire.timestamp,
            sender,
            sent_at,
        };
        warn!(block_id = %wire.id, %sender, error = %err, "Block provenance mismatch");

        let mut header = wire.header();
        header.sender_id = sender;
        header.timestamp = sent_at;
        ResolvedBlock::Placeholder(PlaceholderBlock {
            header,
            type_tag: wire.type_tag.clone(),
            reason: err.to_string(),
        })
    }

    /// Number of registered `(type, version)` pairs.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

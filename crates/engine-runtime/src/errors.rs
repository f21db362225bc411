//! Engine error type.

use pbm_01_block_model::BlockKind;
use pbm_02_block_registry::RegistryError;
use pbm_03_message_stream::StreamError;
use pbm_04_widget_interaction::WidgetError;
use pbm_05_file_transfer::TransferError;
use shared_types::PeerId;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Widget(#[from] WidgetError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// System blocks are synthesized by the engine, never submitted.
    #[error("{0:?} blocks cannot be submitted")]
    LocalOnlyContent(BlockKind),

    #[error("No conversation with peer {0}")]
    UnknownConversation(PeerId),
}

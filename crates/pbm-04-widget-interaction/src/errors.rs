//! Widget interaction errors.

use pbm_01_block_model::WidgetVariant;
use shared_types::{BlockId, PeerId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("Responder {responder} already answered this widget")]
    DuplicateResponse { responder: PeerId },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0:?} widgets do not accept responses")]
    NotInteractive(WidgetVariant),

    #[error("Unknown widget block: {0}")]
    UnknownWidget(BlockId),

    #[error("{0:?} widget is not a poll")]
    NotAPoll(WidgetVariant),

    #[error("{0:?} widget is not a progress widget")]
    NotAProgress(WidgetVariant),

    #[error("Progress cannot go from {current} back to {requested} without a reset")]
    ProgressRegression { current: u32, requested: u32 },

    #[error("Progress {value} exceeds maximum {max}")]
    ProgressOutOfRange { value: u32, max: u32 },
}

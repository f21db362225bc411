//! Per-conversation widget state.

use std::collections::HashMap;

use pbm_01_block_model::{WidgetBlock, WidgetResponse};
use shared_types::BlockId;
use tracing::{debug, warn};

use crate::domain::{poll_results, record_response, set_progress, PollTally, RecordOutcome};
use crate::WidgetError;

/// Widgets of one conversation, keyed by block id.
///
/// Holds the derived copy of each widget (response list, progress value).
/// The delivered block itself stays immutable.
#[derive(Debug, Default)]
pub struct WidgetTracker {
    widgets: HashMap<BlockId, WidgetBlock>,
}

impl WidgetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a widget. Returns `false` if it was already tracked.
    pub fn track(&mut self, block_id: BlockId, widget: WidgetBlock) -> bool {
        if self.widgets.contains_key(&block_id) {
            return false;
        }
        self.widgets.insert(block_id, widget);
        true
    }

    pub fn record(
        &mut self,
        block_id: BlockId,
        response: WidgetResponse,
    ) -> Result<RecordOutcome, WidgetError> {
        let widget = self
            .widgets
            .get_mut(&block_id)
            .ok_or(WidgetError::UnknownWidget(block_id))?;

        let responder = response.responder_id;
        match record_response(widget, response) {
            Ok(outcome) => {
                debug!(%block_id, %responder, ?outcome, "Widget response recorded");
                Ok(outcome)
            }
            Err(err) => {
                warn!(%block_id, %responder, error = %err, "Widget response rejected");
                Err(err)
            }
        }
    }

    pub fn results(&self, block_id: BlockId) -> Result<Vec<PollTally>, WidgetError> {
        let widget = self
            .widgets
            .get(&block_id)
            .ok_or(WidgetError::UnknownWidget(block_id))?;
        poll_results(widget)
    }

    pub fn update_progress(
        &mut self,
        block_id: BlockId,
        value: u32,
        reset: bool,
    ) -> Result<u32, WidgetError> {
        let widget = self
            .widgets
            .get_mut(&block_id)
            .ok_or(WidgetError::UnknownWidget(block_id))?;
        set_progress(widget, value, reset)
    }

    pub fn widget(&self, block_id: &BlockId) -> Option<&WidgetBlock> {
        self.widgets.get(block_id)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

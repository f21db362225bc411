//! Pure response correlation and aggregation over a [`WidgetBlock`].
//!
//! [`WidgetBlock`]: pbm_01_block_model::WidgetBlock

mod aggregation;
mod correlation;
mod progress;

pub use aggregation::{effective_choices, poll_results, PollTally};
pub use correlation::{record_response, RecordOutcome};
pub use progress::set_progress;

//! # Widget Interaction Tracker (pbm-04)
//!
//! Validates and appends peer responses to widget blocks and derives poll
//! results from them.
//!
//! ## Response Rules
//!
//! | Variant  | Value          | Second response from the same responder     |
//! |----------|----------------|---------------------------------------------|
//! | Button   | `Pressed`      | `DuplicateResponse` unless `allow_reanswer` |
//! | Input    | `Text`         | `DuplicateResponse` unless `allow_reanswer` |
//! | Confirm  | `Confirmed`    | `DuplicateResponse` unless `allow_reanswer` |
//! | Poll     | `Choices`      | single-choice: newest timestamp wins; multi-choice: union |
//! | Progress | none           | `NotInteractive` (local value updates only) |
//!
//! The response list is append-only. "Wins" and "union" are projections
//! computed by [`poll_results`], never stored.

pub mod domain;
mod errors;
mod tracker;

pub use domain::{effective_choices, poll_results, record_response, PollTally, RecordOutcome};
pub use errors::WidgetError;
pub use tracker::WidgetTracker;

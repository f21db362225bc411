//! # Block Model (pbm-01)
//!
//! The sealed set of content variants exchanged between peers and their shared
//! envelope fields.
//!
//! ## Variants
//!
//! ```text
//! Block { header, content }
//!                   │
//!      ┌──────┬─────┼──────┬────────┐
//!      ↓      ↓     ↓      ↓        ↓
//!    Text   Code  File  Widget   System (local only)
//! ```
//!
//! ## Rules
//!
//! - Blocks are immutable once sent; a content change needs a new block id.
//! - Every operation over a block is an exhaustive `match` on [`BlockContent`].
//!   Adding a variant is a breaking change and bumps [`SCHEMA_VERSION`].
//! - The only derived fields are the file transfer status/progress/retry count
//!   and the widget response list. Those are written by the trackers, not here.
//! - Pure data: no I/O, no side effects.

mod block;
mod content;
mod errors;
mod widget;
mod wire;

pub use block::{Block, BlockHeader, BlockKind};
pub use content::{
    BlockContent, CodeBlock, FileBlock, Severity, SystemBlock, TextBlock, TextFormat,
    TransferStatus,
};
pub use errors::BlockModelError;
pub use widget::{ResponseValue, WidgetBlock, WidgetConfig, WidgetResponse, WidgetVariant};
pub use wire::WireBlock;

/// Schema version stamped on every block built by this crate.
pub const SCHEMA_VERSION: u32 = 1;

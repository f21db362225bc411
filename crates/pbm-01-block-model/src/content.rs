//! # Block Content Variants
//!
//! - [`TextBlock`]: plain or markdown text
//! - [`CodeBlock`]: source snippet with language tag
//! - [`FileBlock`]: file offer with derived transfer state
//! - [`WidgetBlock`](crate::WidgetBlock): interactive widget (see `widget.rs`)
//! - [`SystemBlock`]: locally synthesized narration, never sent by a peer

use crate::{BlockKind, BlockModelError, WidgetBlock};
use serde::{Deserialize, Serialize};

/// Text rendering format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    Markdown,
}

/// UTF-8 text message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub content: String,
    pub format: TextFormat,
}

impl TextBlock {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            format: TextFormat::Markdown,
        }
    }
}

/// Source code snippet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub content: String,
    /// Language tag used for highlighting (e.g. `rust`).
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub line_numbers: bool,
}

impl CodeBlock {
    pub fn new(content: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            language: language.into(),
            filename: None,
            line_numbers: false,
        }
    }

    /// Builder method: attach a filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Builder method: toggle line numbering.
    pub fn with_line_numbers(mut self, line_numbers: bool) -> Self {
        self.line_numbers = line_numbers;
        self
    }
}

/// Transfer status of a file block.
///
/// ```text
/// [Pending] → [Transferring] → [Completed]
///                  ↑    │
///            retry │    ↓
///                [Failed]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Transferring,
    Completed,
    Failed,
}

impl TransferStatus {
    /// Completed is the only state nothing can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }
}

/// File offer.
///
/// `size` is the declared byte length; a transfer whose received byte count
/// differs from it is failed regardless of what the sender reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    pub filename: String,
    /// Declared size in bytes.
    pub size: u64,
    pub mime_type: String,
    #[serde(default = "pending")]
    pub transfer_status: TransferStatus,
    /// Progress percentage, 0-100.
    #[serde(default)]
    pub transfer_progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

fn pending() -> TransferStatus {
    TransferStatus::Pending
}

impl FileBlock {
    pub fn new(filename: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            size,
            mime_type: mime_type.into(),
            transfer_status: TransferStatus::Pending,
            transfer_progress: 0,
            retry_count: None,
        }
    }

    /// Checks the received byte count against the declared size.
    pub fn verify_received_size(&self, received: u64) -> Result<(), BlockModelError> {
        if received == self.size {
            Ok(())
        } else {
            Err(BlockModelError::SizeMismatch {
                declared: self.size,
                received,
            })
        }
    }
}

/// Severity of a system narration line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

/// Locally synthesized status line (connection narration).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemBlock {
    pub message: String,
    pub severity: Severity,
}

impl SystemBlock {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

/// The closed set of block contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockContent {
    Text(TextBlock),
    Code(CodeBlock),
    File(FileBlock),
    Widget(WidgetBlock),
    System(SystemBlock),
}

impl BlockContent {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Text(_) => BlockKind::Text,
            BlockContent::Code(_) => BlockKind::Code,
            BlockContent::File(_) => BlockKind::File,
            BlockContent::Widget(_) => BlockKind::Widget,
            BlockContent::System(_) => BlockKind::System,
        }
    }

    /// Encodes the variant body as JSON (the type tag travels separately).
    pub fn to_json_body(&self) -> Result<Vec<u8>, BlockModelError> {
        let encoded = match self {
            BlockContent::Text(b) => serde_json::to_vec(b),
            BlockContent::Code(b) => serde_json::to_vec(b),
            BlockContent::File(b) => serde_json::to_vec(b),
            BlockContent::Widget(b) => serde_json::to_vec(b),
            BlockContent::System(b) => serde_json::to_vec(b),
        };
        encoded.map_err(|e| BlockModelError::Encode {
            kind: self.kind(),
            reason: e.to_string(),
        })
    }

    /// Decodes a JSON body of the given kind.
    pub fn from_json_value(
        kind: BlockKind,
        value: serde_json::Value,
    ) -> Result<Self, BlockModelError> {
        let decode_err = |e: serde_json::Error| BlockModelError::Decode {
            kind,
            reason: e.to_string(),
        };
        let content = match kind {
            BlockKind::Text => BlockContent::Text(serde_json::from_value(value).map_err(decode_err)?),
            BlockKind::Code => BlockContent::Code(serde_json::from_value(value).map_err(decode_err)?),
            BlockKind::File => BlockContent::File(serde_json::from_value(value).map_err(decode_err)?),
            BlockKind::Widget => {
                BlockContent::Widget(serde_json::from_value(value).map_err(decode_err)?)
            }
            BlockKind::System => {
                BlockContent::System(serde_json::from_value(value).map_err(decode_err)?)
            }
        };
        Ok(content)
    }
}

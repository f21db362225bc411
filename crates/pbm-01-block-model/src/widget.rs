//! # Widget Blocks
//!
//! Interactive content. The block owns its response list; responses are only
//! ever appended (by the widget interaction tracker).

use serde::{Deserialize, Serialize};
use shared_types::{LogicalTimestamp, PeerId};

/// Widget kind, the fieldless discriminant of [`WidgetConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetVariant {
    Button,
    Input,
    Poll,
    Progress,
    Confirm,
}

/// Variant-specific widget configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum WidgetConfig {
    Button {
        label: String,
        #[serde(default)]
        allow_reanswer: bool,
    },
    Input {
        placeholder: String,
        #[serde(default)]
        allow_reanswer: bool,
    },
    Poll {
        question: String,
        options: Vec<String>,
        #[serde(default)]
        allow_multiple: bool,
    },
    /// Locally authored status bar; not subject to response correlation.
    Progress {
        label: String,
        #[serde(default)]
        value: u32,
        max: u32,
    },
    Confirm {
        prompt: String,
        #[serde(default)]
        allow_reanswer: bool,
    },
}

impl WidgetConfig {
    pub fn variant(&self) -> WidgetVariant {
        match self {
            WidgetConfig::Button { .. } => WidgetVariant::Button,
            WidgetConfig::Input { .. } => WidgetVariant::Input,
            WidgetConfig::Poll { .. } => WidgetVariant::Poll,
            WidgetConfig::Progress { .. } => WidgetVariant::Progress,
            WidgetConfig::Confirm { .. } => WidgetVariant::Confirm,
        }
    }

    /// Single-choice poll over the given options.
    pub fn poll<S: Into<String>>(question: impl Into<String>, options: Vec<S>) -> Self {
        WidgetConfig::Poll {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            allow_multiple: false,
        }
    }

    /// Multi-choice poll over the given options.
    pub fn multi_poll<S: Into<String>>(question: impl Into<String>, options: Vec<S>) -> Self {
        WidgetConfig::Poll {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            allow_multiple: true,
        }
    }
}

/// Payload of a widget response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseValue {
    /// Button press.
    Pressed,
    /// Free text for an input widget.
    Text(String),
    /// Selected poll option indices.
    Choices(Vec<u32>),
    /// Confirm dialog answer.
    Confirmed(bool),
}

/// A peer's answer to a widget block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetResponse {
    pub responder_id: PeerId,
    pub timestamp: LogicalTimestamp,
    pub value: ResponseValue,
}

impl WidgetResponse {
    pub fn new(responder_id: PeerId, timestamp: LogicalTimestamp, value: ResponseValue) -> Self {
        Self {
            responder_id,
            timestamp,
            value,
        }
    }
}

/// Interactive widget block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetBlock {
    pub config: WidgetConfig,
    /// Ordered, append-only.
    #[serde(default)]
    pub responses: Vec<WidgetResponse>,
}

impl WidgetBlock {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            responses: Vec::new(),
        }
    }

    pub fn variant(&self) -> WidgetVariant {
        self.config.variant()
    }

    /// Whether `responder` already answered this widget.
    pub fn has_response_from(&self, responder: &PeerId) -> bool {
        self.responses.iter().any(|r| r.responder_id == *responder)
    }
}

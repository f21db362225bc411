//! # Engine Configuration
//!
//! Defaults suit an interactive chat link; every knob can be overridden from
//! the environment.

use std::env;
use std::time::Duration;

use pbm_03_message_stream::StreamConfig;
use pbm_05_file_transfer::TransferConfig;
use thiserror::Error;

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Message stream configuration.
    pub stream: StreamConfig,
    /// File transfer configuration.
    pub transfer: TransferConfig,
    /// Events buffered per UI subscriber.
    pub event_capacity: usize,
    /// Time teardown waits for outstanding acks.
    pub teardown_grace: Duration,
    /// Start a retransmission timer for every conversation.
    pub auto_retransmit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            transfer: TransferConfig::default(),
            event_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            teardown_grace: Duration::from_secs(3),
            auto_retransmit: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PBM_RETRY_TIMEOUT_MS` | 2000 |
    /// | `PBM_MAX_RETRIES` | 5 |
    /// | `PBM_SEEN_CAPACITY` | 4096 |
    /// | `PBM_SEEN_TTL_SECS` | 600 |
    /// | `PBM_MAX_OUT_OF_ORDER` | 1024 |
    /// | `PBM_TEARDOWN_GRACE_MS` | 3000 |
    /// | `PBM_TRANSFER_MAX_RETRIES` | 3 |
    /// | `PBM_EVENT_CAPACITY` | 1000 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse(&lookup, "PBM_RETRY_TIMEOUT_MS")? {
            config.stream.retry_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse(&lookup, "PBM_MAX_RETRIES")? {
            config.stream.max_retries = retries;
        }
        if let Some(capacity) = parse(&lookup, "PBM_SEEN_CAPACITY")? {
            config.stream.seen_capacity = capacity;
        }
        if let Some(secs) = parse(&lookup, "PBM_SEEN_TTL_SECS")? {
            config.stream.seen_ttl = Duration::from_secs(secs);
        }
        if let Some(limit) = parse(&lookup, "PBM_MAX_OUT_OF_ORDER")? {
            config.stream.max_out_of_order = limit;
        }
        if let Some(ms) = parse(&lookup, "PBM_TEARDOWN_GRACE_MS")? {
            config.teardown_grace = Duration::from_millis(ms);
        }
        if let Some(retries) = parse(&lookup, "PBM_TRANSFER_MAX_RETRIES")? {
            config.transfer.max_retries = retries;
        }
        if let Some(capacity) = parse(&lookup, "PBM_EVENT_CAPACITY")? {
            config.event_capacity = capacity;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects zero capacities and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("PBM_RETRY_TIMEOUT_MS", self.stream.retry_timeout.is_zero()),
            ("PBM_SEEN_CAPACITY", self.stream.seen_capacity == 0),
            ("PBM_SEEN_TTL_SECS", self.stream.seen_ttl.is_zero()),
            ("PBM_MAX_OUT_OF_ORDER", self.stream.max_out_of_order == 0),
            ("retransmit_tick", self.stream.retransmit_tick.is_zero()),
            ("PBM_EVENT_CAPACITY", self.event_capacity == 0),
        ];

        match checks.into_iter().find(|(_, zero)| *zero) {
            Some((key, _)) => Err(ConfigError::Zero { key }),
            None => Ok(()),
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

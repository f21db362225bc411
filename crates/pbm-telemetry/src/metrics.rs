//! Prometheus metrics for the messaging engine.
//!
//! Naming convention: `pbm_<area>_<metric>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // MESSAGE STREAM
    // =========================================================================

    /// First transmissions of reliable envelopes
    pub static ref ENVELOPES_SENT: CounterVec = CounterVec::new(
        Opts::new("pbm_stream_envelopes_sent_total", "Reliable envelopes sent"),
        &["kind"]  // kind: block/widget_response
    ).expect("metric creation failed");

    /// Retransmissions after an ack timeout or replay
    pub static ref ENVELOPES_RETRANSMITTED: Counter = Counter::new(
        "pbm_stream_envelopes_retransmitted_total",
        "Envelope retransmissions"
    ).expect("metric creation failed");

    /// Envelopes dropped because they were already seen or consumed
    pub static ref DUPLICATES_DROPPED: CounterVec = CounterVec::new(
        Opts::new("pbm_stream_duplicates_dropped_total", "Duplicate envelopes dropped"),
        &["reason"]  // reason: duplicate/late
    ).expect("metric creation failed");

    /// Envelopes whose retry budget ran out
    pub static ref DELIVERY_FAILURES: Counter = Counter::new(
        "pbm_stream_delivery_failures_total",
        "Envelopes that exhausted their retry budget"
    ).expect("metric creation failed");

    /// Open conversations
    pub static ref CONVERSATIONS_OPEN: Gauge = Gauge::new(
        "pbm_stream_conversations_open",
        "Number of conversations with live state"
    ).expect("metric creation failed");

    // =========================================================================
    // BLOCKS AND TRANSFERS
    // =========================================================================

    /// Blocks released in order into a conversation log
    pub static ref BLOCKS_DELIVERED: CounterVec = CounterVec::new(
        Opts::new("pbm_blocks_delivered_total", "Blocks delivered in order"),
        &["type_tag"]
    ).expect("metric creation failed");

    /// File transfers that ended in the failed state
    pub static ref TRANSFERS_FAILED: CounterVec = CounterVec::new(
        Opts::new("pbm_transfers_failed_total", "File transfers marked failed"),
        &["reason"]  // reason: reported/size_mismatch
    ).expect("metric creation failed");
}

/// Proof that metrics were registered.
pub struct MetricsHandle {
    collectors: usize,
}

impl MetricsHandle {
    pub fn collectors(&self) -> usize {
        self.collectors
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors already registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Stream
        Box::new(ENVELOPES_SENT.clone()),
        Box::new(ENVELOPES_RETRANSMITTED.clone()),
        Box::new(DUPLICATES_DROPPED.clone()),
        Box::new(DELIVERY_FAILURES.clone()),
        Box::new(CONVERSATIONS_OPEN.clone()),
        // Blocks and transfers
        Box::new(BLOCKS_DELIVERED.clone()),
        Box::new(TRANSFERS_FAILED.clone()),
    ];

    let collectors = metrics.len();
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { collectors })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

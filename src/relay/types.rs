//! Relay types and configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Relay-specific errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Outbound failure outside the connect/timeout class. Points at a
    /// misconfigured destination or client rather than an outage.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Configuration for the relay engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of queued items (None = unbounded)
    pub max_queue_size: Option<usize>,

    /// How long the retry loop idles between drain passes
    pub idle_interval: Duration,

    /// Pause between consecutive successful deliveries while draining
    pub drain_delay: Duration,

    /// Route every submission through the queue, skipping the fast path
    pub always_queue: bool,

    /// Value of the `X-Proxy` marker header added to forwarded requests
    pub proxy_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_queue_size: None,
            idle_interval: Duration::from_secs(10),
            drain_delay: Duration::from_millis(100),
            always_queue: false,
            proxy_marker: "epi:logg Proxy".to_string(),
        }
    }
}

/// Configuration for the outbound HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Collector endpoint every item is POSTed to
    pub destination_url: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout
    pub request_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            destination_url: "https://epilogg.mjerenja.com/api/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Which path a delivery attempt was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPath {
    /// Fast path, straight from `submit`
    Immediate,
    /// Background retry loop
    Retry,
}

impl DeliveryPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryPath::Immediate => "immediate",
            DeliveryPath::Retry => "retry",
        }
    }
}

/// Result of handing an item to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Delivered on the fast path, never queued
    Delivered,

    /// Appended to the queue
    Queued {
        /// Queue length after the append and any trimming
        queue_len: usize,
        /// Items evicted from the head to stay within the bound. An evicted
        /// item that is mid-delivery is only counted if that attempt fails.
        dropped: usize,
    },
}

/// Summary of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items delivered and removed during the pass
    pub delivered: usize,
    /// Items left in the queue when the pass ended
    pub remaining: usize,
    /// Whether the pass stopped on a failed delivery
    pub halted: bool,
}

/// Statistics for the relay engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayStats {
    /// Current mode
    pub mode: super::RelayMode,

    /// Items currently waiting in the queue
    pub queue_len: usize,

    /// Total items submitted
    pub items_received: u64,

    /// Items delivered on the fast path
    pub delivered_immediate: u64,

    /// Items delivered by the retry loop
    pub delivered_retry: u64,

    /// Delivery attempts that did not succeed
    pub failed_attempts: u64,

    /// Items lost to the queue bound without ever being delivered
    pub dropped: u64,

    /// Outbound errors outside the connect/timeout class
    pub transport_errors: u64,
}

impl RelayStats {
    /// Total items delivered on either path
    pub fn delivered(&self) -> u64 {
        self.delivered_immediate + self.delivered_retry
    }

    /// Share of received items that were lost to queue overflow, in percent
    pub fn drop_rate(&self) -> f64 {
        if self.items_received == 0 {
            return 0.0;
        }
        self.dropped as f64 / self.items_received as f64 * 100.0
    }
}

impl std::fmt::Display for RelayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relay [{}]: {} recv, {} fwd ({} immediate), {} queued, {} dropped",
            self.mode,
            self.items_received,
            self.delivered(),
            self.delivered_immediate,
            self.queue_len,
            self.dropped
        )
    }
}

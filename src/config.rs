//! Configuration for the relay
//!
//! Every option can be given as a long flag or through its `RELAY_*`
//! environment variable; flags win.

use crate::api::InboundAuth;
use crate::metrics::MetricsConfig;
use crate::relay::{DeliveryConfig, EngineConfig, RelayError, RelayResult};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Local store-and-forward relay for event submissions
#[derive(Debug, Clone, Parser)]
#[command(name = "event-relay", version)]
pub struct RelayConfig {
    /// Address the intake endpoint listens on
    #[arg(long, env = "RELAY_LISTEN_ADDR", default_value = "127.0.0.1:8100")]
    pub listen_addr: SocketAddr,

    /// Collector URL every event is POSTed to
    #[arg(
        long,
        env = "RELAY_DESTINATION_URL",
        default_value = "https://epilogg.mjerenja.com/api/"
    )]
    pub destination_url: String,

    /// Maximum number of queued events; oldest are dropped beyond it (unbounded if unset)
    #[arg(long, env = "RELAY_MAX_QUEUE_SIZE")]
    pub max_queue_size: Option<usize>,

    /// Seconds the retry loop idles between drain passes
    #[arg(long, env = "RELAY_RETRY_INTERVAL_SECS", default_value_t = 10)]
    pub retry_interval_secs: u64,

    /// Pause between consecutive deliveries while draining the backlog
    #[arg(long, env = "RELAY_DRAIN_DELAY_MS", default_value_t = 100)]
    pub drain_delay_ms: u64,

    /// Queue every event instead of attempting immediate delivery
    #[arg(long, env = "RELAY_ASYNC_QUEUE")]
    pub async_queue: bool,

    /// Verbose diagnostics (debug-level logging)
    #[arg(short, long, env = "RELAY_VERBOSE")]
    pub verbose: bool,

    /// Header carrying the client credential
    #[arg(long, env = "RELAY_AUTH_HEADER", default_value = "User-Agent")]
    pub auth_header: String,

    /// Value the credential header must match exactly
    #[arg(long, env = "RELAY_AUTH_VALUE", default_value = "epi:logg API Client")]
    pub auth_value: String,

    /// Value of the X-Proxy header added to forwarded requests
    #[arg(long, env = "RELAY_PROXY_MARKER", default_value = "epi:logg Proxy")]
    pub proxy_marker: String,

    /// Outbound connect timeout in seconds
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Outbound request timeout in seconds
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Serve Prometheus metrics at /metrics
    #[arg(long, env = "RELAY_METRICS")]
    pub metrics: bool,

    /// Log output format
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl RelayConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> RelayResult<()> {
        if self.retry_interval_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "retry interval must be at least 1 second".into(),
            ));
        }

        if self.max_queue_size == Some(0) {
            return Err(RelayError::InvalidConfig(
                "max queue size must be positive (omit it for an unbounded queue)".into(),
            ));
        }

        if self.auth_value.is_empty() {
            return Err(RelayError::InvalidConfig(
                "credential value must not be empty".into(),
            ));
        }

        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "outbound timeouts must be at least 1 second".into(),
            ));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_queue_size: self.max_queue_size,
            idle_interval: Duration::from_secs(self.retry_interval_secs),
            drain_delay: Duration::from_millis(self.drain_delay_ms),
            always_queue: self.async_queue,
            proxy_marker: self.proxy_marker.clone(),
        }
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            destination_url: self.destination_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn inbound_auth(&self) -> RelayResult<InboundAuth> {
        InboundAuth::new(&self.auth_header, self.auth_value.clone())
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.metrics,
            ..Default::default()
        }
    }

    /// Default tracing filter when RUST_LOG is not set
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "event_relay=debug,tower_http=debug,info"
        } else {
            "info"
        }
    }
}

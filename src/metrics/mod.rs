//! Metrics and observability module
//!
//! Provides Prometheus-compatible metrics for monitoring the relay.
//!
//! Key metrics exposed:
//! - Items received, delivered (per path) and failed attempts
//! - Items dropped by the queue bound
//! - Queue depth and online/offline mode

pub mod exporter;
pub mod recorder;

pub use exporter::{install_recorder, metrics_route, render_metrics, MetricsConfig, MetricsError};
pub use recorder::{init_metrics, DeliveryTimer};

//! Metrics recorder for relay operations
//!
//! Records delivery outcomes, queue depth and mode changes. Without an
//! installed recorder every call is a no-op.

use crate::relay::{DeliveryPath, RelayMode};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "relay_items_received_total",
        "Total number of items submitted to the relay"
    );
    describe_counter!(
        "relay_items_delivered_total",
        "Total number of items accepted by the destination"
    );
    describe_counter!(
        "relay_delivery_failures_total",
        "Total number of failed delivery attempts"
    );
    describe_counter!(
        "relay_items_dropped_total",
        "Total number of queued items evicted by the queue size bound"
    );
    describe_counter!(
        "relay_transport_errors_total",
        "Outbound errors that are neither connect failures nor timeouts"
    );

    describe_gauge!("relay_queue_depth", "Current number of items waiting for retry");
    describe_gauge!("relay_online", "1 while the relay is in online mode, 0 otherwise");

    describe_histogram!("relay_item_size_bytes", "Body size of submitted items");
    describe_histogram!(
        "relay_delivery_duration_seconds",
        "Time spent on a single outbound delivery attempt"
    );
}

/// Record an item being submitted
pub fn record_item_received(body_size: usize) {
    counter!("relay_items_received_total").increment(1);
    histogram!("relay_item_size_bytes").record(body_size as f64);
}

/// Record a successful delivery
pub fn record_delivered(path: DeliveryPath) {
    counter!("relay_items_delivered_total", "path" => path.as_str()).increment(1);
}

/// Record a failed delivery attempt
pub fn record_delivery_failed(path: DeliveryPath) {
    counter!("relay_delivery_failures_total", "path" => path.as_str()).increment(1);
}

/// Record items evicted from the queue head
pub fn record_dropped(count: usize) {
    counter!("relay_items_dropped_total").increment(count as u64);
}

/// Record an unexpected outbound error
pub fn record_transport_error() {
    counter!("relay_transport_errors_total").increment(1);
}

/// Update queue depth gauge
pub fn set_queue_depth(depth: usize) {
    gauge!("relay_queue_depth").set(depth as f64);
}

/// Update mode gauge
pub fn set_mode(mode: RelayMode) {
    gauge!("relay_online").set(if mode.is_online() { 1.0 } else { 0.0 });
}

/// Record delivery attempt duration
pub fn record_delivery_duration(duration: Duration) {
    histogram!("relay_delivery_duration_seconds").record(duration.as_secs_f64());
}

/// Helper struct to time individual delivery attempts
pub struct DeliveryTimer {
    start_time: Instant,
}

impl DeliveryTimer {
    /// Start timing a delivery attempt
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Stop timing and record the duration
    pub fn stop(self) -> Duration {
        let elapsed = self.start_time.elapsed();
        record_delivery_duration(elapsed);
        elapsed
    }
}

//! Store-and-Forward Relay Module
//!
//! Forwards inbound events to a single collector and buffers them in memory
//! while the collector is unreachable.
//!
//! Key features:
//! - Immediate delivery while the destination is healthy
//! - Strict FIFO retry queue with an optional size bound (oldest dropped)
//! - Online/offline mode shared between the submission path and the retry loop
//! - Cooperative shutdown of the background retry loop

pub mod delivery;
pub mod engine;
pub mod item;
pub mod state_machine;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use delivery::{DeliveryClient, HttpDeliveryClient};
pub use engine::RelayEngine;
pub use item::{PendingItem, FORWARDED_HEADERS, PROXY_MARKER_HEADER};
pub use state_machine::RelayMode;
pub use types::{
    DeliveryConfig, DeliveryPath, DrainReport, EngineConfig, RelayError, RelayResult, RelayStats,
    SubmitOutcome,
};

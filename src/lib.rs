//! Store-and-forward relay for event submissions.
//!
//! Events POSTed to the local intake are forwarded to a remote collector.
//! While the collector is unreachable they are held in a FIFO queue and
//! replayed in arrival order by a background retry loop.

pub mod api;
pub mod config;
pub mod metrics;
pub mod relay;

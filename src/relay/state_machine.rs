//! Online/offline mode tracking
//!
//! The mode is a hint, not a reachability guarantee: it only decides whether
//! `submit` tries the destination before queueing.

use serde::{Deserialize, Serialize};

/// Advisory health of the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMode {
    #[default]
    Online,
    Offline,
}

impl RelayMode {
    pub fn is_online(&self) -> bool {
        matches!(self, RelayMode::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Online => "ONLINE",
            RelayMode::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for RelayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a delivery attempt, fed into the mode transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// The destination accepted an item
    DeliverySucceeded {
        /// Whether the queue is empty after the delivered item was removed
        queue_empty: bool,
    },

    /// The destination was unreachable or rejected an item
    DeliveryFailed,
}

/// Compute the next mode for an event
pub fn transition(mode: RelayMode, event: ModeEvent) -> RelayMode {
    match (mode, event) {
        (_, ModeEvent::DeliveryFailed) => RelayMode::Offline,

        (_, ModeEvent::DeliverySucceeded { queue_empty: true }) => RelayMode::Online,

        // Backlog still pending: stay offline so new items line up behind it
        (current, ModeEvent::DeliverySucceeded { queue_empty: false }) => current,
    }
}

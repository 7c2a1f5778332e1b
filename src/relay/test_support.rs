//! In-process delivery fake for engine and API tests

use crate::relay::delivery::DeliveryClient;
use crate::relay::engine::RelayEngine;
use crate::relay::item::PendingItem;
use crate::relay::state_machine::RelayMode;
use crate::relay::types::{RelayError, RelayResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Delivery client whose health is flipped by the test
#[derive(Default)]
pub struct ScriptedClient {
    healthy: AtomicBool,
    transport_error: AtomicBool,
    rejected: Mutex<HashSet<Vec<u8>>>,
    delivered: Mutex<Vec<Arc<PendingItem>>>,
    attempts: AtomicUsize,
    engine: Mutex<Option<Weak<RelayEngine>>>,
    observed_modes: Mutex<Vec<RelayMode>>,
}

impl ScriptedClient {
    pub fn healthy() -> Arc<Self> {
        let client = Self::default();
        client.healthy.store(true, Ordering::SeqCst);
        Arc::new(client)
    }

    pub fn unhealthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Fail every attempt carrying this body, even while healthy
    pub fn reject_body(&self, body: &str) {
        self.rejected.lock().insert(body.as_bytes().to_vec());
    }

    pub fn fail_with_transport_error(&self, enabled: bool) {
        self.transport_error.store(enabled, Ordering::SeqCst);
    }

    /// Record the engine's mode at the start of every attempt
    pub fn observe(&self, engine: Arc<RelayEngine>) {
        *self.engine.lock() = Some(Arc::downgrade(&engine));
    }

    pub fn observed_modes(&self) -> Vec<RelayMode> {
        self.observed_modes.lock().clone()
    }

    /// Bodies of delivered items, in delivery order
    pub fn delivered(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|item| String::from_utf8_lossy(item.body()).into_owned())
            .collect()
    }

    pub fn delivered_items(&self) -> Vec<Arc<PendingItem>> {
        self.delivered.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn attempt(&self, item: &PendingItem) -> RelayResult<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let engine = self.engine.lock().as_ref().and_then(Weak::upgrade);
        if let Some(engine) = engine {
            self.observed_modes.lock().push(engine.mode());
        }

        if self.transport_error.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("scripted transport error".into()));
        }

        let accepted = self.healthy.load(Ordering::SeqCst)
            && !self.rejected.lock().contains(item.body().as_ref());

        if accepted {
            self.delivered.lock().push(Arc::new(item.clone()));
        }
        Ok(accepted)
    }
}

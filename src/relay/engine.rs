//! Relay engine
//!
//! Owns the pending queue and the online/offline mode. Inbound requests go
//! through [`RelayEngine::submit`]; a background task runs
//! [`RelayEngine::run_retry_loop`] to drain whatever could not be delivered
//! immediately.
//!
//! Queue and mode share one mutex. The lock is never held across a network
//! call, so a hung destination cannot stall submissions.

use crate::metrics::recorder::{self, DeliveryTimer};
use crate::relay::delivery::DeliveryClient;
use crate::relay::item::PendingItem;
use crate::relay::state_machine::{transition, ModeEvent, RelayMode};
use crate::relay::types::{DeliveryPath, DrainReport, EngineConfig, RelayStats, SubmitOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Mode and queue, always mutated together
#[derive(Default)]
struct RelayState {
    mode: RelayMode,
    queue: VecDeque<Arc<PendingItem>>,
    /// Id of the queued item the retry loop is currently attempting
    in_flight: Option<u64>,
    /// Set when the bound evicted the in-flight item mid-attempt
    in_flight_evicted: bool,
}

impl RelayState {
    /// Apply a mode event, returning the previous mode if it changed
    fn apply(&mut self, event: ModeEvent) -> Option<RelayMode> {
        let next = transition(self.mode, event);
        if next == self.mode {
            return None;
        }
        Some(std::mem::replace(&mut self.mode, next))
    }
}

struct RelayCounters {
    items_received: AtomicU64,
    delivered_immediate: AtomicU64,
    delivered_retry: AtomicU64,
    failed_attempts: AtomicU64,
    dropped: AtomicU64,
    transport_errors: AtomicU64,
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self {
            items_received: AtomicU64::new(0),
            delivered_immediate: AtomicU64::new(0),
            delivered_retry: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
        }
    }
}

/// Store-and-forward engine for a single destination
pub struct RelayEngine {
    /// Engine configuration
    config: EngineConfig,

    /// Outbound transport
    client: Arc<dyn DeliveryClient>,

    /// Queue + mode
    state: Mutex<RelayState>,

    /// Next arrival sequence number
    next_id: AtomicU64,

    /// Engine statistics
    counters: RelayCounters,

    /// Set to request the retry loop to stop
    terminate_tx: watch::Sender<bool>,

    /// Set by the retry loop once it has exited
    terminated_tx: watch::Sender<bool>,
}

impl RelayEngine {
    /// Create an engine with an empty queue in online mode
    pub fn new(config: EngineConfig, client: Arc<dyn DeliveryClient>) -> Self {
        let (terminate_tx, _) = watch::channel(false);
        let (terminated_tx, _) = watch::channel(false);

        recorder::set_mode(RelayMode::Online);
        recorder::set_queue_depth(0);

        Self {
            config,
            client,
            state: Mutex::new(RelayState::default()),
            next_id: AtomicU64::new(1),
            counters: RelayCounters::default(),
            terminate_tx,
            terminated_tx,
        }
    }

    /// Current mode
    pub fn mode(&self) -> RelayMode {
        self.state.lock().mode
    }

    /// Number of queued items
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Snapshot of the queue, oldest first
    pub fn pending(&self) -> Vec<Arc<PendingItem>> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// Accept one inbound request.
    ///
    /// Tries the destination right away when the relay is online and nothing
    /// is queued; otherwise (or on failure) the item joins the queue tail.
    pub async fn submit<'a, I>(&self, raw_headers: I, raw_body: &[u8]) -> SubmitOutcome
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = Arc::new(PendingItem::new(
            id,
            raw_headers,
            raw_body,
            &self.config.proxy_marker,
        ));

        self.counters.items_received.fetch_add(1, Ordering::Relaxed);
        recorder::record_item_received(item.size());
        debug!(item_id = id, size = item.size(), "Item submitted");

        // Skipping the fast path while anything is queued keeps delivery in arrival order
        let try_now = !self.config.always_queue && {
            let state = self.state.lock();
            state.mode.is_online() && state.queue.is_empty()
        };

        if try_now {
            if self.deliver(&item, DeliveryPath::Immediate).await {
                let mut state = self.state.lock();
                let queue_empty = state.queue.is_empty();
                self.apply_mode(&mut state, ModeEvent::DeliverySucceeded { queue_empty });
                return SubmitOutcome::Delivered;
            }

            let mut state = self.state.lock();
            self.apply_mode(&mut state, ModeEvent::DeliveryFailed);
            return self.enqueue_locked(&mut state, item);
        }

        let mut state = self.state.lock();
        self.enqueue_locked(&mut state, item)
    }

    /// Append to the tail and trim the head back under the bound
    fn enqueue_locked(&self, state: &mut RelayState, item: Arc<PendingItem>) -> SubmitOutcome {
        let id = item.id();
        state.queue.push_back(item);

        let mut dropped = 0;
        if let Some(max) = self.config.max_queue_size {
            while state.queue.len() > max {
                let Some(evicted) = state.queue.pop_front() else {
                    break;
                };

                // Counted (or not) once its delivery attempt settles
                if state.in_flight == Some(evicted.id()) {
                    state.in_flight_evicted = true;
                    debug!(item_id = evicted.id(), "Evicted item is in flight");
                    continue;
                }

                dropped += 1;
                warn!(
                    item_id = evicted.id(),
                    queued_at = %evicted.created_at(),
                    max_queue_size = max,
                    "Queue full, dropping oldest undelivered item"
                );
            }
        }
        self.count_dropped(dropped);

        let queue_len = state.queue.len();
        recorder::set_queue_depth(queue_len);
        debug!(item_id = id, queue_len, "Item queued");

        SubmitOutcome::Queued { queue_len, dropped }
    }

    fn count_dropped(&self, dropped: usize) {
        if dropped > 0 {
            self.counters
                .dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
            recorder::record_dropped(dropped);
        }
    }

    /// One delivery attempt with bookkeeping; never called with the lock held
    async fn deliver(&self, item: &PendingItem, path: DeliveryPath) -> bool {
        let timer = DeliveryTimer::start();
        let result = self.client.attempt(item).await;
        let elapsed = timer.stop();

        match result {
            Ok(true) => {
                let counter = match path {
                    DeliveryPath::Immediate => &self.counters.delivered_immediate,
                    DeliveryPath::Retry => &self.counters.delivered_retry,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                recorder::record_delivered(path);
                debug!(
                    item_id = item.id(),
                    path = path.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Item delivered"
                );
                true
            }
            Ok(false) => {
                self.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                recorder::record_delivery_failed(path);
                debug!(item_id = item.id(), path = path.as_str(), "Delivery failed");
                false
            }
            Err(e) => {
                self.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                self.counters.transport_errors.fetch_add(1, Ordering::Relaxed);
                recorder::record_delivery_failed(path);
                recorder::record_transport_error();
                error!(
                    item_id = item.id(),
                    path = path.as_str(),
                    error = %e,
                    "Unexpected transport error, check the destination configuration"
                );
                false
            }
        }
    }

    fn apply_mode(&self, state: &mut RelayState, event: ModeEvent) {
        if let Some(previous) = state.apply(event) {
            recorder::set_mode(state.mode);
            match state.mode {
                RelayMode::Offline => warn!(
                    from = %previous,
                    queue_len = state.queue.len(),
                    "Destination unavailable, relay going offline"
                ),
                RelayMode::Online => info!(from = %previous, "Destination reachable, relay back online"),
            }
        }
    }

    /// Deliver queued items head-first until the queue is empty or an
    /// attempt fails.
    pub async fn drain_once(&self) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let head = {
                let mut state = self.state.lock();
                let Some(head) = state.queue.front().cloned() else {
                    break;
                };
                state.in_flight = Some(head.id());
                state.in_flight_evicted = false;
                head
            };

            debug!(item_id = head.id(), queue_len = self.queue_len(), "Retrying queued item");
            let delivered = self.deliver(&head, DeliveryPath::Retry).await;

            let remaining = {
                let mut state = self.state.lock();
                let evicted = std::mem::take(&mut state.in_flight_evicted);
                state.in_flight = None;

                if !delivered {
                    if evicted {
                        warn!(
                            item_id = head.id(),
                            "Evicted item failed delivery and is dropped"
                        );
                        self.count_dropped(1);
                    }
                    self.apply_mode(&mut state, ModeEvent::DeliveryFailed);
                    report.halted = true;
                    report.remaining = state.queue.len();
                    return report;
                }

                // An evicted head is already gone from the queue
                if !evicted && state.queue.front().map(|item| item.id()) == Some(head.id()) {
                    state.queue.pop_front();
                }
                report.delivered += 1;

                let queue_empty = state.queue.is_empty();
                self.apply_mode(&mut state, ModeEvent::DeliverySucceeded { queue_empty });
                recorder::set_queue_depth(state.queue.len());
                state.queue.len()
            };

            if remaining == 0 {
                break;
            }
            if !self.config.drain_delay.is_zero() {
                tokio::time::sleep(self.config.drain_delay).await;
            }
        }

        report.remaining = self.queue_len();
        report
    }

    /// Retry loop: drain, idle, repeat until [`terminate`](Self::terminate)
    /// is observed at the top of a cycle.
    pub async fn run_retry_loop(self: Arc<Self>) {
        let mut terminate_rx = self.terminate_tx.subscribe();
        info!(
            idle_interval_ms = self.config.idle_interval.as_millis() as u64,
            "Retry loop started"
        );

        loop {
            if *terminate_rx.borrow_and_update() {
                break;
            }

            let report = self.drain_once().await;
            if report.delivered > 0 || report.halted {
                debug!(
                    delivered = report.delivered,
                    remaining = report.remaining,
                    halted = report.halted,
                    "Drain pass finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.idle_interval) => {}
                _ = terminate_rx.changed() => {}
            }
        }

        let discarded = self.queue_len();
        if discarded > 0 {
            warn!(discarded, "Retry loop stopped with undelivered items");
        }
        info!("Retry loop terminated");
        self.terminated_tx.send_replace(true);
    }

    /// Spawn the retry loop on the tokio runtime
    pub fn spawn_retry_loop(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_retry_loop())
    }

    /// Ask the retry loop to stop after its current pass
    pub fn terminate(&self) {
        self.terminate_tx.send_replace(true);
    }

    /// Whether the retry loop has exited
    pub fn is_terminated(&self) -> bool {
        *self.terminated_tx.borrow()
    }

    /// Wait until the retry loop has exited
    pub async fn wait_terminated(&self) {
        let mut rx = self.terminated_tx.subscribe();
        // Sender lives in self, so this only returns once the flag flips
        let _ = rx.wait_for(|terminated| *terminated).await;
    }

    /// Get current statistics
    pub fn stats(&self) -> RelayStats {
        let (mode, queue_len) = {
            let state = self.state.lock();
            (state.mode, state.queue.len())
        };

        RelayStats {
            mode,
            queue_len,
            items_received: self.counters.items_received.load(Ordering::Relaxed),
            delivered_immediate: self.counters.delivered_immediate.load(Ordering::Relaxed),
            delivered_retry: self.counters.delivered_retry.load(Ordering::Relaxed),
            failed_attempts: self.counters.failed_attempts.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            transport_errors: self.counters.transport_errors.load(Ordering::Relaxed),
        }
    }
}

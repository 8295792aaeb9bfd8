//! Notification hub - synchronous event fan-out
//!
//! The hub is the single decoupling point between producers (the result
//! dispatcher, the IMU client) and observers (UIs, telemetry sinks, tests).
//! Each event kind has its own subscription point; publishing invokes every
//! subscriber **synchronously on the publisher's thread**, in registration
//! order. A subscriber that needs asynchrony must hand off to its own
//! thread or channel.
//!
//! Because delivery is synchronous, a slow subscriber stalls the publisher
//! (for results, that is the pipeline dispatcher and therefore all further
//! results). Subscribers are expected to return quickly.
//!
//! A panicking subscriber is caught and logged; delivery continues with the
//! remaining subscribers. The hub holds no queue.

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{ConnectionEvent, ImuSample, ModelResult, StateEvent};

/// Handle identifying one subscription; used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One event kind's subscriber list
struct SubscriberList<T> {
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> SubscriberList<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, id: SubscriptionId, callback: Callback<T>) {
        self.entries.lock().push((id, callback));
    }

    /// Remove by id; a no-op when the id is unknown or already removed
    fn unsubscribe(&self, id: SubscriptionId) {
        self.entries.lock().retain(|(sid, _)| *sid != id);
    }

    /// Invoke all subscribers in registration order on the calling thread
    ///
    /// The list is snapshotted under the lock and invoked outside it, so a
    /// subscriber may subscribe/unsubscribe without deadlocking.
    fn publish(&self, event: &T, kind: &str) {
        let snapshot: Vec<Callback<T>> = {
            let entries = self.entries.lock();
            entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| (*callback)(event))).is_err() {
                log::error!("Hub: {} subscriber panicked, continuing delivery", kind);
            }
        }
    }
}

/// Synchronous publish/subscribe point for results and IMU events
pub struct NotificationHub {
    next_id: AtomicU64,
    results: SubscriberList<ModelResult>,
    imu_connected: SubscriberList<ConnectionEvent>,
    imu_disconnected: SubscriberList<ConnectionEvent>,
    imu_state: SubscriberList<StateEvent>,
    imu_samples: SubscriberList<ImuSample>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            results: SubscriberList::new(),
            imu_connected: SubscriberList::new(),
            imu_disconnected: SubscriberList::new(),
            imu_state: SubscriberList::new(),
            imu_samples: SubscriberList::new(),
        }
    }

    fn fresh_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // === Subscriptions ===

    pub fn subscribe_results<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModelResult) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.results.subscribe(id, Arc::new(callback));
        id
    }

    pub fn subscribe_imu_connected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.imu_connected.subscribe(id, Arc::new(callback));
        id
    }

    pub fn subscribe_imu_disconnected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.imu_disconnected.subscribe(id, Arc::new(callback));
        id
    }

    pub fn subscribe_imu_state<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.imu_state.subscribe(id, Arc::new(callback));
        id
    }

    pub fn subscribe_imu_samples<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ImuSample) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.imu_samples.subscribe(id, Arc::new(callback));
        id
    }

    // === Unsubscriptions (idempotent) ===

    pub fn unsubscribe_results(&self, id: SubscriptionId) {
        self.results.unsubscribe(id);
    }

    pub fn unsubscribe_imu_connected(&self, id: SubscriptionId) {
        self.imu_connected.unsubscribe(id);
    }

    pub fn unsubscribe_imu_disconnected(&self, id: SubscriptionId) {
        self.imu_disconnected.unsubscribe(id);
    }

    pub fn unsubscribe_imu_state(&self, id: SubscriptionId) {
        self.imu_state.unsubscribe(id);
    }

    pub fn unsubscribe_imu_samples(&self, id: SubscriptionId) {
        self.imu_samples.unsubscribe(id);
    }

    // === Publications ===

    pub fn notify_result(&self, result: &ModelResult) {
        self.results.publish(result, "result");
    }

    pub fn notify_imu_connected(&self, event: &ConnectionEvent) {
        self.imu_connected.publish(event, "imu-connected");
    }

    pub fn notify_imu_disconnected(&self, event: &ConnectionEvent) {
        self.imu_disconnected.publish(event, "imu-disconnected");
    }

    pub fn notify_imu_state(&self, event: &StateEvent) {
        self.imu_state.publish(event, "imu-state");
    }

    pub fn notify_imu_sample(&self, sample: &ImuSample) {
        self.imu_samples.publish(sample, "imu-sample");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

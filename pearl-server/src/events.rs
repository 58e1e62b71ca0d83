//! Lifecycle event hub
//!
//! Realtime notification of order mutations to connected staff consoles.
//! The hub is an injected dependency of the lifecycle service — nothing
//! reaches for a process-global connection registry. Publishing is
//! fire-and-forget: losing a subscriber never fails a mutation.

use dashmap::DashMap;
use serde::Serialize;
use shared::util::now_millis;
use tokio::sync::broadcast;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Resource type, e.g. "order"
    pub resource: String,
    /// Per-resource monotonically increasing version, lets clients
    /// detect missed or out-of-order deliveries
    pub version: u64,
    /// What happened, e.g. "created", "status_changed", "assigned"
    pub action: String,
    /// Resource ID
    pub id: String,
    pub data: Option<serde_json::Value>,
    pub at: i64,
}

/// Interface the lifecycle service publishes through.
pub trait LifecyclePublisher: Send + Sync {
    fn publish(&self, resource: &str, action: &str, id: &str, data: Option<serde_json::Value>);
}

/// Broadcast-channel implementation of [`LifecyclePublisher`].
///
/// The `epoch` is a unique identifier generated on each startup; clients
/// use it to detect server restarts and trigger a full resync.
pub struct EventHub {
    epoch: String,
    versions: DashMap<String, u64>,
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "Event hub started with new epoch");
        Self {
            epoch,
            versions: DashMap::new(),
            tx,
        }
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Increment and return the version counter for a resource type.
    fn next_version(&self, resource: &str) -> u64 {
        let mut entry = self.versions.entry(resource.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecyclePublisher for EventHub {
    fn publish(&self, resource: &str, action: &str, id: &str, data: Option<serde_json::Value>) {
        let event = LifecycleEvent {
            resource: resource.to_string(),
            version: self.next_version(resource),
            action: action.to_string(),
            id: id.to_string(),
            data,
            at: now_millis(),
        };
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

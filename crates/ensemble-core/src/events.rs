//! Engine event types and broadcast bus.
//!
//! The bus fans engine events out to independent subscribers: the shortlist
//! cache (event-driven invalidation) and the host (outbox projection,
//! notifications). Emission never blocks and never fails; events to a bus
//! with no subscribers are dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::defaults::EVENT_BUS_CAPACITY;
use crate::items::Slot;

/// Domain events emitted by the engine and its hosts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A bundle was generated for a user.
    BundleGenerated {
        user_id: String,
        bundle_id: Uuid,
        template_id: String,
        ruleset_version: String,
        score: f64,
    },
    /// Replacement alternatives were produced for a slot.
    SlotReplaced {
        user_id: String,
        slot: Slot,
        alternative_count: usize,
    },
    /// A wardrobe or catalog item changed; user-scoped shortlists are
    /// stale. `user_id` is absent for catalog items (invalidates all).
    ItemChanged {
        user_id: Option<String>,
        item_id: String,
    },
    /// A new rule-set version was published; every shortlist is stale.
    RuleSetPublished { version: String },
}

impl EngineEvent {
    /// Dot-namespaced event name for log and wire use.
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::BundleGenerated { .. } => "bundle.generated",
            EngineEvent::SlotReplaced { .. } => "bundle.slot_replaced",
            EngineEvent::ItemChanged { .. } => "item.changed",
            EngineEvent::RuleSetPublished { .. } => "ruleset.published",
        }
    }
}

/// Broadcast bus for engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Lossy by design: no subscribers
    /// means the event is dropped.
    pub fn emit(&self, event: EngineEvent) {
        trace!(event_type = event.event_type(), "emit engine event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Current subscriber count.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

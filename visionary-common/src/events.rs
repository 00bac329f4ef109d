//! Change notifications for the storefront
//!
//! Every successful write re-fetches the affected collection and then emits a
//! [`StoreEvent`] on the [`EventBus`]. The optional poller emits the same
//! events for writes made elsewhere. SSE clients re-read whatever changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Storefront change events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// Template rows were written (here or, via the poller, elsewhere)
    TemplatesChanged { timestamp: DateTime<Utc> },

    /// Settings rows were written
    SettingsChanged { timestamp: DateTime<Utc> },

    /// In-memory catalog order changed; nothing was persisted
    CatalogReordered {
        ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A chat session row was written
    ChatSessionChanged {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The local snapshot was replaced by a refresh
    SnapshotRefreshed {
        template_count: usize,
        from_database: bool,
        timestamp: DateTime<Utc>,
    },
}

impl StoreEvent {
    pub fn templates_changed() -> Self {
        StoreEvent::TemplatesChanged { timestamp: Utc::now() }
    }

    pub fn settings_changed() -> Self {
        StoreEvent::SettingsChanged { timestamp: Utc::now() }
    }

    pub fn chat_session_changed(session_id: impl Into<String>) -> Self {
        StoreEvent::ChatSessionChanged {
            session_id: session_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::TemplatesChanged { .. } => "TemplatesChanged",
            StoreEvent::SettingsChanged { .. } => "SettingsChanged",
            StoreEvent::CatalogReordered { .. } => "CatalogReordered",
            StoreEvent::ChatSessionChanged { .. } => "ChatSessionChanged",
            StoreEvent::SnapshotRefreshed { .. } => "SnapshotRefreshed",
        }
    }

    /// Catalog and settings events, as opposed to chat traffic
    pub fn is_storefront(&self) -> bool {
        !matches!(self, StoreEvent::ChatSessionChanged { .. })
    }

    /// Chat event for the given session
    pub fn is_chat_for(&self, session: &str) -> bool {
        matches!(self, StoreEvent::ChatSessionChanged { session_id, .. } if session_id == session)
    }
}

/// Broadcast bus for [`StoreEvent`]s
///
/// Subscribers only see events emitted after they subscribe. A slow
/// subscriber that falls more than `capacity` events behind loses the oldest
/// ones (`RecvError::Lagged`).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: StoreEvent) -> Result<usize, broadcast::error::SendError<StoreEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`TrackedEvent`]s. Share it
//! via `Arc<EventBus>`; the wizard publishes through the
//! [`AnalyticsSink`](crate::sink::AnalyticsSink) seam.

use gatherly_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TrackedEvent
// ---------------------------------------------------------------------------

/// An analytics event emitted by a wizard session.
///
/// Constructed via [`TrackedEvent::new`] and enriched with
/// [`with_session`](TrackedEvent::with_session),
/// [`with_actor`](TrackedEvent::with_actor) and
/// [`with_properties`](TrackedEvent::with_properties).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Dot-separated event name, e.g. `"wizard.step_completed"`.
    pub name: String,

    /// Wizard session that produced the event.
    pub session_id: Option<Uuid>,

    /// Signed-in user, when known.
    pub actor_id: Option<String>,

    /// Event-specific data.
    pub properties: serde_json::Value,

    pub timestamp: Timestamp,
}

impl TrackedEvent {
    /// Create an event with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session_id: None,
            actor_id: None,
            properties: serde_json::Value::Object(Default::default()),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use gatherly_events::bus::{EventBus, TrackedEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(TrackedEvent::new("draft.autosaved"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TrackedEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Without subscribers the event is dropped.
    pub fn publish(&self, event: TrackedEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackedEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let session = Uuid::new_v4();

        let event = TrackedEvent::new("wizard.step_completed")
            .with_session(session)
            .with_actor("user-7")
            .with_properties(serde_json::json!({"step": "basics"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.name, "wizard.step_completed");
        assert_eq!(received.session_id, Some(session));
        assert_eq!(received.actor_id.as_deref(), Some("user-7"));
        assert_eq!(received.properties["step"], "basics");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(TrackedEvent::new("draft.restored"));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.name, "draft.restored");
        assert_eq!(e2.name, "draft.restored");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(TrackedEvent::new("orphan.event"));
    }

    #[test]
    fn bare_event_has_empty_optional_fields() {
        let event = TrackedEvent::new("bare.event");
        assert!(event.session_id.is_none());
        assert!(event.actor_id.is_none());
        assert!(event.properties.is_object());
    }
}

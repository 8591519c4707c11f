//! Submission handler.
//!
//! Turns the final form into exactly one create request. A submission is
//! never retried automatically; on failure the draft stays on disk so the
//! organizer can try again by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gatherly_core::wizard::{CreateEventPayload, FormValues};
use gatherly_events::names;
use gatherly_events::{AnalyticsSink, TrackedEvent};
use uuid::Uuid;

use crate::autosave::AutosaveHandle;
use crate::creator::{CreatedEvent, EventCreator};
use crate::error::SubmissionError;
use crate::identity::IdentityProvider;
use crate::notify::{Notification, Notifier};

/// Shown when the backend gives no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to create event. Please try again.";

/// Per-session values stamped into the payload.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub session_id: Uuid,
    pub template_id: Option<String>,
}

pub struct SubmissionHandler {
    identity: Arc<dyn IdentityProvider>,
    creator: Arc<dyn EventCreator>,
    notifier: Arc<dyn Notifier>,
    analytics: Arc<dyn AnalyticsSink>,
    autosave: AutosaveHandle,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag when the submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SubmissionHandler {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        creator: Arc<dyn EventCreator>,
        notifier: Arc<dyn Notifier>,
        analytics: Arc<dyn AnalyticsSink>,
        autosave: AutosaveHandle,
    ) -> Self {
        Self {
            identity,
            creator,
            notifier,
            analytics,
            autosave,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submit the form.
    ///
    /// `on_complete` runs with the created event after the draft has been
    /// cleared and the success notification sent.
    pub async fn submit(
        &self,
        values: &FormValues,
        context: &SubmissionContext,
        on_complete: impl FnOnce(&CreatedEvent),
    ) -> Result<CreatedEvent, SubmissionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(session_id = %context.session_id, "Submission already in flight");
            return Err(SubmissionError::AlreadyInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        let Some(user) = self.identity.current_user() else {
            tracing::info!(session_id = %context.session_id, "Submit without a signed-in user");
            self.notifier.notify(Notification::error(
                "Authentication required",
                SubmissionError::Unauthenticated.to_string(),
            ));
            return Err(SubmissionError::Unauthenticated);
        };

        let payload = match CreateEventPayload::from_form(
            values,
            &user.id,
            context.template_id.as_deref(),
            context.session_id,
        ) {
            Ok(payload) => payload,
            Err(e) => {
                self.notifier
                    .notify(Notification::error("Cannot create event", e.to_string()));
                return Err(e.into());
            }
        };

        self.analytics.track(
            TrackedEvent::new(names::SUBMISSION_STARTED)
                .with_session(context.session_id)
                .with_actor(user.id.clone()),
        );
        tracing::info!(session_id = %context.session_id, user_id = %user.id, "Submitting event");

        match self.creator.create_event(&payload).await {
            Ok(created) => {
                if let Err(e) = self.autosave.clear().await {
                    tracing::warn!(error = %e, "Event created but the draft could not be cleared");
                }
                self.notifier.notify(Notification::success(
                    "Event created",
                    format!("\"{}\" has been published", payload.title),
                ));
                self.analytics.track(
                    TrackedEvent::new(names::SUBMISSION_SUCCEEDED)
                        .with_session(context.session_id)
                        .with_actor(user.id.clone())
                        .with_properties(serde_json::json!({ "event_id": created.id })),
                );
                tracing::info!(session_id = %context.session_id, event_id = %created.id, "Event created");
                on_complete(&created);
                Ok(created)
            }
            Err(e) => {
                let message = e.user_message().unwrap_or(GENERIC_FAILURE_MESSAGE).to_string();
                tracing::warn!(session_id = %context.session_id, error = %e, "Event creation failed");
                self.notifier
                    .notify(Notification::error("Could not create event", message));
                self.analytics.track(
                    TrackedEvent::new(names::SUBMISSION_FAILED)
                        .with_session(context.session_id)
                        .with_actor(user.id.clone())
                        .with_properties(serde_json::json!({ "error": e.to_string() })),
                );
                Err(e.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use gatherly_core::wizard::AutosaveSnapshot;
    use gatherly_events::NoopSink;
    use tokio::sync::{mpsc, Notify};

    use crate::autosave::AutosaveSettings;
    use crate::error::CreateError;
    use crate::identity::StaticIdentity;
    use crate::notify::{ChannelNotifier, NotificationLevel};
    use crate::storage::{DraftStore, MemoryDraftStore};

    const KEY: &str = "event-creation-draft";

    #[derive(Clone)]
    enum Failure {
        Rejected(u16, String),
        Transport(String),
    }

    /// Answers with a fixed result, optionally waiting for a release signal.
    struct FakeCreator {
        calls: AtomicUsize,
        result: Result<CreatedEvent, Failure>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl EventCreator for FakeCreator {
        async fn create_event(
            &self,
            _payload: &CreateEventPayload,
        ) -> Result<CreatedEvent, CreateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result.clone().map_err(|failure| match failure {
                Failure::Rejected(status, message) => CreateError::Rejected {
                    status: Some(status),
                    code: None,
                    message,
                },
                Failure::Transport(message) => CreateError::Transport(message),
            })
        }
    }

    struct Fixture {
        handler: Arc<SubmissionHandler>,
        creator: Arc<FakeCreator>,
        store: Arc<MemoryDraftStore>,
        notes: mpsc::UnboundedReceiver<Notification>,
    }

    async fn fixture(
        signed_in: bool,
        result: Result<CreatedEvent, Failure>,
        gate: Option<Arc<Notify>>,
    ) -> Fixture {
        let store = Arc::new(MemoryDraftStore::new());
        let snapshot = AutosaveSnapshot::capture(
            FormValues::sample(),
            5,
            Default::default(),
            None,
            Uuid::nil(),
            1,
        );
        store.save(KEY, &snapshot.to_json().unwrap()).await.unwrap();

        let autosave = AutosaveHandle::spawn(
            store.clone(),
            Arc::new(NoopSink),
            AutosaveSettings {
                key: KEY.to_string(),
                debounce: Duration::from_millis(1000),
                writer_id: Uuid::new_v4(),
                restored_from: None,
            },
        );
        let identity = if signed_in {
            StaticIdentity::signed_in("user-1", "organizer@example.com")
        } else {
            StaticIdentity::anonymous()
        };
        let creator = Arc::new(FakeCreator {
            calls: AtomicUsize::new(0),
            result,
            gate,
        });
        let (notifier, notes) = ChannelNotifier::new();
        let handler = Arc::new(SubmissionHandler::new(
            Arc::new(identity),
            creator.clone(),
            Arc::new(notifier),
            Arc::new(NoopSink),
            autosave,
        ));
        Fixture {
            handler,
            creator,
            store,
            notes,
        }
    }

    fn context() -> SubmissionContext {
        SubmissionContext {
            session_id: Uuid::new_v4(),
            template_id: None,
        }
    }

    fn created(id: &str) -> Result<CreatedEvent, Failure> {
        Ok(CreatedEvent { id: id.to_string() })
    }

    // -- success --

    #[tokio::test]
    async fn success_clears_draft_and_completes() {
        let mut f = fixture(true, created("evt_1"), None).await;
        let mut completed = None;

        let result = f
            .handler
            .submit(&FormValues::sample(), &context(), |c| completed = Some(c.id.clone()))
            .await
            .unwrap();

        assert_eq!(result.id, "evt_1");
        assert_eq!(completed.as_deref(), Some("evt_1"));
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 1);
        assert!(f.store.peek(KEY).is_none());
        assert_eq!(f.notes.recv().await.unwrap().level, NotificationLevel::Success);
    }

    // -- failure --

    #[tokio::test]
    async fn failure_keeps_draft_and_surfaces_message() {
        let failure = Failure::Rejected(409, "Slug already taken".to_string());
        let mut f = fixture(true, Err(failure), None).await;
        let mut completed = false;

        let err = f
            .handler
            .submit(&FormValues::sample(), &context(), |_| completed = true)
            .await
            .unwrap_err();

        assert_matches!(err, SubmissionError::Create(_));
        assert!(!completed);
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 1);
        assert!(f.store.peek(KEY).is_some());
        let note = f.notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, "Slug already taken");
    }

    #[tokio::test]
    async fn blank_backend_message_falls_back_to_generic() {
        let mut f = fixture(true, Err(Failure::Rejected(500, String::new())), None).await;
        let _ = f.handler.submit(&FormValues::sample(), &context(), |_| {}).await;
        assert_eq!(f.notes.recv().await.unwrap().message, GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn network_failure_shows_its_message_and_keeps_draft() {
        let reason = "error sending request: connection refused";
        let mut f = fixture(true, Err(Failure::Transport(reason.to_string())), None).await;

        let err = f
            .handler
            .submit(&FormValues::sample(), &context(), |_| {})
            .await
            .unwrap_err();

        assert_matches!(err, SubmissionError::Create(CreateError::Transport(_)));
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 1);
        assert!(f.store.peek(KEY).is_some());
        let note = f.notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, reason);
    }

    // -- preconditions --

    #[tokio::test]
    async fn unauthenticated_sends_nothing() {
        let mut f = fixture(false, created("evt_1"), None).await;
        let err = f
            .handler
            .submit(&FormValues::sample(), &context(), |_| {})
            .await
            .unwrap_err();
        assert_matches!(err, SubmissionError::Unauthenticated);
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 0);
        assert!(f.store.peek(KEY).is_some());
        assert_eq!(f.notes.recv().await.unwrap().level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn payload_error_sends_nothing() {
        let f = fixture(true, created("evt_1"), None).await;
        let err = f
            .handler
            .submit(&FormValues::default(), &context(), |_| {})
            .await
            .unwrap_err();
        assert_matches!(err, SubmissionError::Payload(_));
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected() {
        let gate = Arc::new(Notify::new());
        let f = fixture(true, created("evt_1"), Some(gate.clone())).await;

        let handler = f.handler.clone();
        let first = tokio::spawn(async move {
            handler
                .submit(&FormValues::sample(), &context(), |_| {})
                .await
                .map(|c| c.id)
        });

        while !f.handler.is_in_flight() {
            tokio::task::yield_now().await;
        }
        let second = f.handler.submit(&FormValues::sample(), &context(), |_| {}).await;
        assert_matches!(second, Err(SubmissionError::AlreadyInFlight));

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "evt_1");
        assert_eq!(f.creator.calls.load(Ordering::SeqCst), 1);
        assert!(!f.handler.is_in_flight());
    }
}

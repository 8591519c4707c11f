//! Debounced autosave.
//!
//! A single background task owns the draft slot during a session. Callers
//! push snapshots through an [`AutosaveHandle`]; the task keeps only the
//! latest one and writes it after the debounce window passes without a new
//! schedule. Writes are best effort: failures are logged and dropped.
//!
//! Before each write the stored snapshot is checked against the last one
//! this session knows about: its own previous write, or the draft it was
//! restored from. A snapshot from any other writer is a conflict. It is
//! logged and reported to analytics, then our snapshot overwrites it.

use std::sync::Arc;
use std::time::Duration;

use gatherly_core::types::Timestamp;
use gatherly_core::wizard::AutosaveSnapshot;
use gatherly_events::names;
use gatherly_events::{AnalyticsSink, TrackedEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage::DraftStore;

/// Who wrote a stored snapshot, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftStamp {
    pub writer_id: Uuid,
    pub last_saved: Timestamp,
}

impl DraftStamp {
    pub fn of(snapshot: &AutosaveSnapshot) -> Self {
        Self {
            writer_id: snapshot.writer_id,
            last_saved: snapshot.last_saved,
        }
    }
}

/// Settings for one autosave task.
#[derive(Debug, Clone)]
pub struct AutosaveSettings {
    pub key: String,
    pub debounce: Duration,
    /// Identity of the writing session; stamped into every snapshot.
    pub writer_id: Uuid,
    /// The stored draft this session continued from, if it restored one.
    pub restored_from: Option<DraftStamp>,
}

enum Command {
    Schedule(Box<AutosaveSnapshot>),
    Flush(oneshot::Sender<()>),
    Clear(oneshot::Sender<Result<(), StorageError>>),
    Shutdown(oneshot::Sender<()>),
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle to the autosave task.
#[derive(Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl AutosaveHandle {
    /// Spawn the autosave task on the current runtime.
    pub fn spawn(
        store: Arc<dyn DraftStore>,
        analytics: Arc<dyn AnalyticsSink>,
        settings: AutosaveSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = AutosaveWorker {
            known: settings.restored_from,
            store,
            analytics,
            settings,
        };
        tokio::spawn(worker.run(rx));
        Self { tx }
    }

    /// Queue a snapshot and restart the debounce timer.
    pub fn schedule(&self, snapshot: AutosaveSnapshot) {
        if self.tx.send(Command::Schedule(Box::new(snapshot))).is_err() {
            tracing::debug!("Autosave task stopped, snapshot dropped");
        }
    }

    /// Write any pending snapshot immediately.
    pub async fn flush(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_ok() {
            let _ = done.await;
        }
    }

    /// Drop any pending snapshot and delete the stored one.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Clear(reply))
            .map_err(|_| stopped())?;
        done.await.map_err(|_| stopped())?
    }

    /// Stop the task. A pending snapshot is discarded.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(reply)).is_ok() {
            let _ = done.await;
        }
    }
}

fn stopped() -> StorageError {
    StorageError::Unavailable("autosave task stopped".to_string())
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct AutosaveWorker {
    store: Arc<dyn DraftStore>,
    analytics: Arc<dyn AnalyticsSink>,
    settings: AutosaveSettings,
    /// Stored snapshot this session expects to find in the slot.
    known: Option<DraftStamp>,
}

impl AutosaveWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<Box<AutosaveSnapshot>> = None;
        let mut deadline = Instant::now();

        loop {
            let command = if pending.is_some() {
                tokio::select! {
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(deadline) => {
                        if let Some(snapshot) = pending.take() {
                            self.write(*snapshot).await;
                        }
                        continue;
                    }
                }
            } else {
                rx.recv().await
            };

            match command {
                Some(Command::Schedule(snapshot)) => {
                    pending = Some(snapshot);
                    deadline = Instant::now() + self.settings.debounce;
                }
                Some(Command::Flush(reply)) => {
                    if let Some(snapshot) = pending.take() {
                        self.write(*snapshot).await;
                    }
                    let _ = reply.send(());
                }
                Some(Command::Clear(reply)) => {
                    pending = None;
                    let result = self.store.remove(&self.settings.key).await;
                    if let Err(e) = &result {
                        tracing::warn!(key = %self.settings.key, error = %e, "Failed to clear draft");
                    } else {
                        self.known = None;
                        tracing::debug!(key = %self.settings.key, "Draft cleared");
                    }
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown(reply)) => {
                    tracing::debug!(key = %self.settings.key, "Autosave task shutting down");
                    let _ = reply.send(());
                    break;
                }
                None => {
                    // Every handle dropped: keep what the user typed.
                    if let Some(snapshot) = pending.take() {
                        self.write(*snapshot).await;
                    }
                    break;
                }
            }
        }
    }

    async fn write(&mut self, mut snapshot: AutosaveSnapshot) {
        snapshot.writer_id = self.settings.writer_id;
        snapshot.last_saved = chrono::Utc::now();

        self.check_conflict().await;

        let json = match snapshot.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize draft, skipping autosave");
                return;
            }
        };

        match self.store.save(&self.settings.key, &json).await {
            Ok(()) => {
                self.known = Some(DraftStamp::of(&snapshot));
                tracing::debug!(
                    key = %self.settings.key,
                    step = snapshot.current_step,
                    revision = snapshot.revision,
                    "Draft autosaved"
                );
                self.analytics.track(
                    TrackedEvent::new(names::DRAFT_AUTOSAVED)
                        .with_session(self.settings.writer_id)
                        .with_properties(serde_json::json!({
                            "step": snapshot.current_step,
                            "revision": snapshot.revision,
                        })),
                );
            }
            Err(e) => {
                tracing::warn!(key = %self.settings.key, error = %e, "Autosave failed");
            }
        }
    }

    /// Detect a stored snapshot from another writer that this session has
    /// not seen.
    async fn check_conflict(&self) {
        let stored = match self.store.load(&self.settings.key).await {
            Ok(Some(contents)) => contents,
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(error = %e, "Could not read draft for conflict check");
                return;
            }
        };
        let Ok(theirs) = serde_json::from_str::<AutosaveSnapshot>(&stored) else {
            return;
        };
        let stamp = DraftStamp::of(&theirs);
        if stamp.writer_id != self.settings.writer_id && Some(stamp) != self.known {
            tracing::warn!(
                key = %self.settings.key,
                other_writer = %theirs.writer_id,
                their_saved_at = %theirs.last_saved,
                "Draft slot holds another session's draft; saving ours over it"
            );
            self.analytics.track(
                TrackedEvent::new(names::DRAFT_AUTOSAVE_CONFLICT)
                    .with_session(self.settings.writer_id)
                    .with_properties(serde_json::json!({
                        "other_writer": theirs.writer_id,
                        "other_revision": theirs.revision,
                    })),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Load the stored snapshot if it can be offered for restore.
///
/// Storage errors, unparseable contents and template mismatches all yield
/// `None`.
pub async fn load_restorable(
    store: &dyn DraftStore,
    key: &str,
    template_id: Option<&str>,
    step_count: usize,
) -> Option<AutosaveSnapshot> {
    let contents = match store.load(key).await {
        Ok(Some(contents)) => contents,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read saved draft");
            return None;
        }
    };
    let Some(snapshot) = AutosaveSnapshot::parse(&contents, step_count) else {
        tracing::info!(key, "Ignoring unreadable saved draft");
        return None;
    };
    if !snapshot.matches_template(template_id) {
        tracing::debug!(
            key,
            saved_template = ?snapshot.template_id,
            requested_template = ?template_id,
            "Saved draft belongs to a different template"
        );
        return None;
    }
    Some(snapshot)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gatherly_core::wizard::FormValues;
    use gatherly_events::EventBus;

    use crate::storage::MemoryDraftStore;

    const KEY: &str = "event-creation-draft";

    fn snapshot(title: &str, revision: u64) -> AutosaveSnapshot {
        let form = FormValues {
            title: title.to_string(),
            ..FormValues::default()
        };
        AutosaveSnapshot::capture(form, 0, Default::default(), None, Uuid::nil(), revision)
    }

    fn spawn(store: &Arc<MemoryDraftStore>) -> (AutosaveHandle, Uuid) {
        spawn_with(store, Arc::new(gatherly_events::NoopSink))
    }

    fn spawn_with(
        store: &Arc<MemoryDraftStore>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> (AutosaveHandle, Uuid) {
        spawn_restored(store, analytics, None)
    }

    fn spawn_restored(
        store: &Arc<MemoryDraftStore>,
        analytics: Arc<dyn AnalyticsSink>,
        restored_from: Option<DraftStamp>,
    ) -> (AutosaveHandle, Uuid) {
        let writer_id = Uuid::new_v4();
        let handle = AutosaveHandle::spawn(
            store.clone(),
            analytics,
            AutosaveSettings {
                key: KEY.to_string(),
                debounce: Duration::from_millis(1000),
                writer_id,
                restored_from,
            },
        );
        (handle, writer_id)
    }

    fn stored(store: &MemoryDraftStore) -> AutosaveSnapshot {
        serde_json::from_str(&store.peek(KEY).unwrap()).unwrap()
    }

    // -- debounce --

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_produce_one_write() {
        let store = Arc::new(MemoryDraftStore::new());
        let (handle, writer_id) = spawn(&store);

        for i in 0..5 {
            handle.schedule(snapshot(&format!("draft {i}"), i));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.write_count(), 1);

        let saved = stored(&store);
        assert_eq!(saved.form_values.title, "draft 4");
        assert_eq!(saved.writer_id, writer_id);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_gaps_produce_separate_writes() {
        let store = Arc::new(MemoryDraftStore::new());
        let (handle, _) = spawn(&store);

        handle.schedule(snapshot("first", 1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.schedule(snapshot("second", 2));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.write_count(), 2);
        assert_eq!(stored(&store).form_values.title, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately() {
        let store = Arc::new(MemoryDraftStore::new());
        let (handle, _) = spawn(&store);

        handle.schedule(snapshot("now", 1));
        handle.flush().await;
        assert_eq!(store.write_count(), 1);

        // Nothing left pending.
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(store.write_count(), 1);
    }

    // -- clear / shutdown --

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_and_removes_stored() {
        let store = Arc::new(MemoryDraftStore::new());
        let (handle, _) = spawn(&store);

        handle.schedule(snapshot("saved", 1));
        handle.flush().await;
        handle.schedule(snapshot("pending", 2));
        handle.clear().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(store.peek(KEY).is_none());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending() {
        let store = Arc::new(MemoryDraftStore::new());
        let (handle, _) = spawn(&store);

        handle.schedule(snapshot("lost", 1));
        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(store.write_count(), 0);
        assert!(handle.clear().await.is_err());
    }

    // -- failures --

    #[tokio::test(start_paused = true)]
    async fn write_failures_are_swallowed() {
        let store = Arc::new(MemoryDraftStore::new());
        store.set_fail_writes(true);
        let (handle, _) = spawn(&store);

        handle.schedule(snapshot("doomed", 1));
        handle.flush().await;
        assert_eq!(store.write_count(), 0);

        store.set_fail_writes(false);
        handle.schedule(snapshot("retried by next change", 2));
        handle.flush().await;
        assert_eq!(store.write_count(), 1);
    }

    // -- analytics / conflicts --

    #[tokio::test(start_paused = true)]
    async fn successful_write_emits_autosaved() {
        let store = Arc::new(MemoryDraftStore::new());
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (handle, writer_id) = spawn_with(&store, bus.clone());

        handle.schedule(snapshot("tracked", 3));
        handle.flush().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, names::DRAFT_AUTOSAVED);
        assert_eq!(event.session_id, Some(writer_id));
        assert_eq!(event.properties["revision"], 3);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_write_after_ours_is_reported_then_overwritten() {
        let store = Arc::new(MemoryDraftStore::new());
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (ours, our_id) = spawn_with(&store, bus.clone());
        let (theirs, _) = spawn(&store);

        ours.schedule(snapshot("ours", 1));
        ours.flush().await;
        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVED);

        theirs.schedule(snapshot("theirs", 1));
        theirs.flush().await;

        ours.schedule(snapshot("ours again", 2));
        ours.flush().await;

        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVE_CONFLICT);
        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVED);
        let saved = stored(&store);
        assert_eq!(saved.form_values.title, "ours again");
        assert_eq!(saved.writer_id, our_id);
    }

    #[tokio::test(start_paused = true)]
    async fn first_write_over_foreign_draft_is_reported() {
        let store = Arc::new(MemoryDraftStore::new());
        let (other_tab, other_id) = spawn(&store);
        other_tab.schedule(snapshot("other tab", 1));
        other_tab.flush().await;

        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (fresh, fresh_id) = spawn_with(&store, bus.clone());
        fresh.schedule(snapshot("fresh tab", 1));
        fresh.flush().await;

        let conflict = rx.recv().await.unwrap();
        assert_eq!(conflict.name, names::DRAFT_AUTOSAVE_CONFLICT);
        assert_eq!(conflict.properties["other_writer"], other_id.to_string());
        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVED);
        assert_eq!(stored(&store).writer_id, fresh_id);
    }

    #[tokio::test(start_paused = true)]
    async fn restored_draft_is_not_a_conflict() {
        let store = Arc::new(MemoryDraftStore::new());
        let (earlier, _) = spawn(&store);
        earlier.schedule(snapshot("earlier session", 1));
        earlier.flush().await;
        earlier.shutdown().await;

        let stamp = DraftStamp::of(&stored(&store));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (resumed, _) = spawn_restored(&store, bus.clone(), Some(stamp));
        resumed.schedule(snapshot("resumed", 2));
        resumed.flush().await;
        resumed.schedule(snapshot("resumed again", 3));
        resumed.flush().await;

        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVED);
        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVED);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_write_after_restore_is_reported() {
        let store = Arc::new(MemoryDraftStore::new());
        let (other_tab, _) = spawn(&store);
        other_tab.schedule(snapshot("v1", 1));
        other_tab.flush().await;

        let stamp = DraftStamp::of(&stored(&store));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (resumed, _) = spawn_restored(&store, bus.clone(), Some(stamp));

        other_tab.schedule(snapshot("v2", 2));
        other_tab.flush().await;
        resumed.schedule(snapshot("resumed", 2));
        resumed.flush().await;

        assert_eq!(rx.recv().await.unwrap().name, names::DRAFT_AUTOSAVE_CONFLICT);
    }

    // -- restore --

    #[tokio::test]
    async fn load_restorable_filters_by_template_and_validity() {
        let store = MemoryDraftStore::new();
        assert!(load_restorable(&store, KEY, None, 6).await.is_none());

        let mut snap = snapshot("saved", 1);
        snap.template_id = Some("conference".to_string());
        store.save(KEY, &snap.to_json().unwrap()).await.unwrap();

        assert!(load_restorable(&store, KEY, Some("conference"), 6).await.is_some());
        assert!(load_restorable(&store, KEY, Some("meetup"), 6).await.is_none());
        assert!(load_restorable(&store, KEY, None, 6).await.is_none());

        store.save(KEY, "{corrupt").await.unwrap();
        assert!(load_restorable(&store, KEY, Some("conference"), 6).await.is_none());
    }
}

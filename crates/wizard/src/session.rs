//! One event-creation wizard session.
//!
//! [`WizardSession`] owns the form state and navigation for a single
//! organizer, drives the autosave task and hands the final form to the
//! submission handler. All validation is recomputed synchronously from the
//! current values on every query and every transition attempt.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use gatherly_core::error::CoreError;
use gatherly_core::types::StepIndex;
use gatherly_core::wizard::{
    AutosaveSnapshot, CollaboratorRole, CompletedStepPolicy, EventTemplate, FormField,
    FormValues, NavigationRejection, Navigator, StepStatus, ValidationEngine, WizardStep,
};
use gatherly_events::names;
use gatherly_events::{AnalyticsSink, TrackedEvent};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::autosave::{load_restorable, AutosaveHandle, AutosaveSettings, DraftStamp};
use crate::config::{is_valid_key, WizardConfig};
use crate::creator::{CreatedEvent, EventCreator, HttpEventCreator};
use crate::error::{CreateError, StorageError, SubmissionError, WizardResult};
use crate::form_state::FormState;
use crate::identity::IdentityProvider;
use crate::notify::{Notifier, TracingNotifier};
use crate::storage::{DraftStore, FileDraftStore};
use crate::submission::{SubmissionContext, SubmissionHandler};

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn DraftStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub creator: Arc<dyn EventCreator>,
    pub notifier: Arc<dyn Notifier>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl SessionDeps {
    /// Production wiring: drafts under `DRAFT_DIR`, the HTTP events API and
    /// notifications written to the log.
    pub fn from_config(
        config: &WizardConfig,
        identity: Arc<dyn IdentityProvider>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Result<Self, CreateError> {
        Ok(Self {
            store: Arc::new(FileDraftStore::new(&config.draft_dir)),
            identity,
            creator: Arc::new(HttpEventCreator::from_config(config)?),
            notifier: Arc::new(TracingNotifier),
            analytics,
        })
    }
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub draft_key: String,
    pub autosave_debounce: Duration,
    /// Template requested by the host, if any.
    pub template_id: Option<String>,
    pub completed_step_policy: CompletedStepPolicy,
}

impl SessionOptions {
    pub fn from_config(config: &WizardConfig, template_id: Option<String>) -> Self {
        Self {
            draft_key: config.draft_key.clone(),
            autosave_debounce: config.autosave_debounce,
            template_id,
            completed_step_policy: config.completed_step_policy,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&WizardConfig::default(), None)
    }
}

pub struct WizardSession {
    id: Uuid,
    options: SessionOptions,
    form: FormState,
    navigator: Navigator,
    autosave: AutosaveHandle,
    submission: SubmissionHandler,
    analytics: Arc<dyn AnalyticsSink>,
    restored: bool,
}

impl std::fmt::Debug for WizardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSession")
            .field("id", &self.id)
            .field("template_id", &self.options.template_id)
            .field("draft_key", &self.options.draft_key)
            .field("current_step", &self.navigator.current())
            .field("completed_steps", self.navigator.completed())
            .field("submitted", &self.navigator.is_submitted())
            .field("restored", &self.restored)
            .finish_non_exhaustive()
    }
}

impl WizardSession {
    /// Start a session.
    ///
    /// If a saved draft matches the requested template, `confirm_restore`
    /// decides whether to continue from it. Otherwise the requested
    /// template, if any, seeds the form.
    pub async fn start(
        deps: SessionDeps,
        options: SessionOptions,
        confirm_restore: impl FnOnce(&AutosaveSnapshot) -> bool,
    ) -> WizardResult<Self> {
        let template = options
            .template_id
            .as_deref()
            .map(EventTemplate::find)
            .transpose()?;
        if !is_valid_key(&options.draft_key) {
            return Err(StorageError::InvalidKey(options.draft_key.clone()).into());
        }

        let id = Uuid::new_v4();
        let engine = ValidationEngine::standard();
        let step_count = engine.registry().count();
        let mut navigator = Navigator::new(engine, options.completed_step_policy);
        let mut form = FormState::default();

        let saved = load_restorable(
            deps.store.as_ref(),
            &options.draft_key,
            options.template_id.as_deref(),
            step_count,
        )
        .await;

        let mut restored_from = None;
        if let Some(snapshot) = saved {
            if confirm_restore(&snapshot) {
                restored_from = Some(DraftStamp::of(&snapshot));
                navigator.restore(snapshot.current_step, &snapshot.completed_steps)?;
                form.reset(snapshot.form_values);
                tracing::info!(
                    session_id = %id,
                    step = snapshot.current_step,
                    saved_at = %snapshot.last_saved,
                    "Restored saved draft"
                );
                deps.analytics.track(
                    TrackedEvent::new(names::DRAFT_RESTORED)
                        .with_session(id)
                        .with_properties(serde_json::json!({
                            "step": snapshot.current_step,
                            "completed_steps": snapshot.completed_steps,
                            "previous_writer": snapshot.writer_id,
                        })),
                );
            } else {
                tracing::info!(session_id = %id, "Saved draft declined");
            }
        }
        let restored = restored_from.is_some();
        if !restored {
            if let Some(template) = template {
                form.reset(template.initial_values());
                tracing::debug!(session_id = %id, template = template.id, "Applied template");
            }
        }

        let autosave = AutosaveHandle::spawn(
            deps.store.clone(),
            deps.analytics.clone(),
            AutosaveSettings {
                key: options.draft_key.clone(),
                debounce: options.autosave_debounce,
                writer_id: id,
                restored_from,
            },
        );
        let submission = SubmissionHandler::new(
            deps.identity,
            deps.creator,
            deps.notifier,
            deps.analytics.clone(),
            autosave.clone(),
        );

        tracing::info!(
            session_id = %id,
            template = ?options.template_id,
            policy = options.completed_step_policy.as_str(),
            "Wizard session started"
        );

        Ok(Self {
            id,
            options,
            form,
            navigator,
            autosave,
            submission,
            analytics: deps.analytics,
            restored,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn template_id(&self) -> Option<&str> {
        self.options.template_id.as_deref()
    }

    /// Whether the session continued from a saved draft.
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn is_submitted(&self) -> bool {
        self.navigator.is_submitted()
    }

    pub fn values(&self) -> &FormValues {
        self.form.values()
    }

    pub fn get_value(&self, field: FormField) -> Value {
        self.form.get_value(field)
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.form.subscribe()
    }

    fn engine(&self) -> &ValidationEngine {
        self.navigator.engine()
    }

    pub fn steps(&self) -> &'static [WizardStep] {
        self.engine().registry().steps()
    }

    // -----------------------------------------------------------------------
    // Form
    // -----------------------------------------------------------------------

    pub fn set_value(&mut self, field: FormField, value: Value) -> Result<(), CoreError> {
        self.form.set_value(field, value)?;
        self.after_change();
        Ok(())
    }

    pub fn update(&mut self, edit: impl FnOnce(&mut FormValues)) {
        self.form.update(edit);
        self.after_change();
    }

    pub fn reset(&mut self, values: FormValues) {
        self.form.reset(values);
        self.after_change();
    }

    /// Replace the form with values that pass every rule.
    pub fn fill_sample_data(&mut self) {
        self.reset(FormValues::sample());
    }

    pub fn add_collaborator(
        &mut self,
        email: &str,
        name: &str,
        role: CollaboratorRole,
    ) -> Result<Uuid, CoreError> {
        let id = self
            .form
            .try_update(|v| v.add_collaborator(email, name, role))?;
        self.after_change();
        Ok(id)
    }

    pub fn remove_collaborator(&mut self, id: Uuid) -> bool {
        if !self.form.values().collaborators.iter().any(|c| c.id == id) {
            return false;
        }
        self.form.update(|v| {
            v.remove_collaborator(id);
        });
        self.after_change();
        true
    }

    pub fn add_sponsorship_tier(
        &mut self,
        name: &str,
        price_cents: i64,
        benefits: Vec<String>,
        max_sponsors: Option<u32>,
    ) -> Result<Uuid, CoreError> {
        let id = self
            .form
            .try_update(|v| v.add_sponsorship_tier(name, price_cents, benefits, max_sponsors))?;
        self.after_change();
        Ok(id)
    }

    pub fn remove_sponsorship_tier(&mut self, id: Uuid) -> bool {
        if !self.form.values().sponsorship_tiers.iter().any(|t| t.id == id) {
            return false;
        }
        self.form.update(|v| {
            v.remove_sponsorship_tier(id);
        });
        self.after_change();
        true
    }

    fn after_change(&mut self) {
        let dropped = self.navigator.revalidate(self.form.values());
        if !dropped.is_empty() {
            tracing::debug!(session_id = %self.id, ?dropped, "Completed steps invalidated by edit");
        }
        self.schedule_autosave();
    }

    fn schedule_autosave(&self) {
        if self.navigator.is_submitted() {
            return;
        }
        self.autosave.schedule(AutosaveSnapshot::capture(
            self.form.values().clone(),
            self.navigator.current(),
            self.navigator.completed().clone(),
            self.options.template_id.clone(),
            self.id,
            self.form.revision(),
        ));
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn current_step(&self) -> StepIndex {
        self.navigator.current()
    }

    pub fn completed_steps(&self) -> &BTreeSet<StepIndex> {
        self.navigator.completed()
    }

    pub fn next(&mut self) -> Result<StepIndex, NavigationRejection> {
        let from = self.navigator.current();
        match self.navigator.next(self.form.values()) {
            Ok(to) => {
                let kind = self.engine().registry().steps()[from].kind;
                tracing::debug!(session_id = %self.id, from, to, "Step completed");
                self.analytics.track(
                    TrackedEvent::new(names::STEP_COMPLETED)
                        .with_session(self.id)
                        .with_properties(serde_json::json!({
                            "step": from,
                            "step_kind": kind.as_str(),
                        })),
                );
                self.schedule_autosave();
                Ok(to)
            }
            Err(rejection) => {
                tracing::debug!(session_id = %self.id, step = from, ?rejection, "Next rejected");
                Err(rejection)
            }
        }
    }

    pub fn previous(&mut self) -> Result<StepIndex, NavigationRejection> {
        let to = self.navigator.previous()?;
        self.schedule_autosave();
        Ok(to)
    }

    pub fn jump(&mut self, target: StepIndex) -> Result<StepIndex, NavigationRejection> {
        let to = self.navigator.jump(target, self.form.values())?;
        self.schedule_autosave();
        Ok(to)
    }

    pub fn can_jump(&self, target: StepIndex) -> bool {
        self.navigator.can_jump(target, self.form.values())
    }

    // -----------------------------------------------------------------------
    // Validation queries
    // -----------------------------------------------------------------------

    pub fn step_status(&self, step: StepIndex) -> StepStatus {
        self.engine().step_status(step, self.form.values())
    }

    pub fn all_step_statuses(&self) -> Vec<StepStatus> {
        self.engine().all_step_statuses(self.form.values())
    }

    pub fn overall_progress(&self) -> u8 {
        self.engine().overall_progress(self.form.values())
    }

    pub fn evaluation(&self) -> BTreeMap<&'static str, bool> {
        self.engine().evaluate_all(self.form.values())
    }

    pub fn field_messages(&self) -> BTreeMap<FormField, Vec<&'static str>> {
        self.engine().field_messages(self.form.values())
    }

    pub fn remaining_minutes(&self) -> u32 {
        self.engine()
            .registry()
            .remaining_minutes(self.navigator.completed())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Publish the event.
    ///
    /// Allowed only from the last step with its required rules met. On
    /// success the session becomes terminal.
    pub async fn submit(
        &mut self,
        on_complete: impl FnOnce(&CreatedEvent),
    ) -> Result<CreatedEvent, SubmissionError> {
        self.navigator
            .check_submit(self.form.values())
            .map_err(SubmissionError::Blocked)?;

        let context = SubmissionContext {
            session_id: self.id,
            template_id: self.options.template_id.clone(),
        };
        let created = self
            .submission
            .submit(self.form.values(), &context, on_complete)
            .await?;
        self.navigator.mark_submitted();
        Ok(created)
    }

    /// Write any pending draft now.
    pub async fn flush(&self) {
        self.autosave.flush().await;
    }

    /// Leave the wizard keeping the draft for later.
    pub async fn close(self) {
        self.autosave.flush().await;
        self.autosave.shutdown().await;
        tracing::info!(session_id = %self.id, "Wizard session closed");
    }

    /// Leave the wizard and discard the draft.
    pub async fn cancel(self) {
        if let Err(e) = self.autosave.clear().await {
            tracing::warn!(session_id = %self.id, error = %e, "Failed to discard draft");
        }
        self.analytics.track(TrackedEvent::new(names::DRAFT_DISCARDED).with_session(self.id));
        self.analytics.track(TrackedEvent::new(names::WIZARD_CANCELLED).with_session(self.id));
        self.autosave.shutdown().await;
        tracing::info!(session_id = %self.id, "Wizard session cancelled");
    }
}

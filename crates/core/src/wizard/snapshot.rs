//! Autosave snapshot format.
//!
//! A snapshot is the serialized form of a wizard session: form values,
//! position, completed steps and provenance. Parsing is lenient in one
//! direction only: anything unreadable or inconsistent is treated as "no
//! snapshot" rather than an error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{StepIndex, Timestamp};

use super::form::FormValues;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted wizard state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveSnapshot {
    pub version: u32,
    pub form_values: FormValues,
    pub current_step: StepIndex,
    pub completed_steps: BTreeSet<StepIndex>,
    pub last_saved: Timestamp,
    #[serde(default)]
    pub template_id: Option<String>,
    /// Session that wrote the snapshot.
    pub writer_id: Uuid,
    /// Per-writer write counter.
    #[serde(default)]
    pub revision: u64,
}

impl AutosaveSnapshot {
    /// Capture the given state, stamped with the current time.
    pub fn capture(
        form_values: FormValues,
        current_step: StepIndex,
        completed_steps: BTreeSet<StepIndex>,
        template_id: Option<String>,
        writer_id: Uuid,
        revision: u64,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            form_values,
            current_step,
            completed_steps,
            last_saved: chrono::Utc::now(),
            template_id,
            writer_id,
            revision,
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize snapshot: {e}")))
    }

    /// Parse stored contents.
    ///
    /// Returns `None` for corrupt JSON, a different format version,
    /// positions outside `0..step_count` or malformed nested lists.
    pub fn parse(contents: &str, step_count: usize) -> Option<Self> {
        let snapshot: Self = serde_json::from_str(contents).ok()?;
        snapshot.validate(step_count).ok()?;
        Some(snapshot)
    }

    /// Check the version, that every step index fits the registry, and that
    /// the collaborator and tier lists are well-formed.
    pub fn validate(&self, step_count: usize) -> Result<(), CoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(CoreError::Validation(format!(
                "Unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        if self.current_step >= step_count {
            return Err(CoreError::Validation(format!(
                "Snapshot step {} is out of range (0..{step_count})",
                self.current_step
            )));
        }
        if let Some(bad) = self.completed_steps.iter().find(|s| **s >= step_count) {
            return Err(CoreError::Validation(format!(
                "Snapshot completed step {bad} is out of range (0..{step_count})"
            )));
        }
        self.form_values.check_nested()
    }

    /// Whether the snapshot belongs to a session started with `template_id`.
    pub fn matches_template(&self, template_id: Option<&str>) -> bool {
        self.template_id.as_deref() == template_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> AutosaveSnapshot {
        AutosaveSnapshot::capture(
            FormValues::sample(),
            3,
            [0, 1, 2].into_iter().collect(),
            Some("conference".to_string()),
            Uuid::new_v4(),
            4,
        )
    }

    #[test]
    fn restore_then_reserialize_is_equivalent_except_timestamp() {
        let original = snapshot();
        let json = original.to_json().unwrap();
        let restored = AutosaveSnapshot::parse(&json, 6).unwrap();

        let mut recaptured = AutosaveSnapshot::capture(
            restored.form_values.clone(),
            restored.current_step,
            restored.completed_steps.clone(),
            restored.template_id.clone(),
            restored.writer_id,
            restored.revision,
        );
        recaptured.last_saved = original.last_saved;
        assert_eq!(recaptured, original);
    }

    #[test]
    fn corrupt_json_is_no_snapshot() {
        assert!(AutosaveSnapshot::parse("{not json", 6).is_none());
        assert!(AutosaveSnapshot::parse("", 6).is_none());
    }

    #[test]
    fn version_mismatch_is_no_snapshot() {
        let mut snap = snapshot();
        snap.version = 99;
        let json = serde_json::to_string(&snap).unwrap();
        assert!(AutosaveSnapshot::parse(&json, 6).is_none());
    }

    #[test]
    fn out_of_range_steps_are_no_snapshot() {
        let mut snap = snapshot();
        snap.current_step = 6;
        assert!(AutosaveSnapshot::parse(&snap.to_json().unwrap(), 6).is_none());

        let mut snap = snapshot();
        snap.completed_steps.insert(7);
        assert!(AutosaveSnapshot::parse(&snap.to_json().unwrap(), 6).is_none());
    }

    #[test]
    fn malformed_nested_lists_are_no_snapshot() {
        let mut snap = snapshot();
        snap.form_values.collaborators[0].id = Uuid::nil();
        assert!(AutosaveSnapshot::parse(&snap.to_json().unwrap(), 6).is_none());

        let mut snap = snapshot();
        let mut twin = snap.form_values.sponsorship_tiers[0].clone();
        twin.id = Uuid::new_v4();
        twin.name = twin.name.to_uppercase();
        snap.form_values.sponsorship_tiers.push(twin);
        assert!(AutosaveSnapshot::parse(&snap.to_json().unwrap(), 6).is_none());
    }

    #[test]
    fn missing_form_fields_take_defaults() {
        let json = format!(
            r#"{{"version":1,"form_values":{{"title":"Partial"}},"current_step":0,
                "completed_steps":[],"last_saved":"2030-01-01T00:00:00Z",
                "writer_id":"{}"}}"#,
            Uuid::new_v4()
        );
        let snap = AutosaveSnapshot::parse(&json, 6).unwrap();
        assert_eq!(snap.form_values.title, "Partial");
        assert_eq!(snap.form_values.currency, "USD");
        assert_eq!(snap.template_id, None);
        assert_eq!(snap.revision, 0);
    }

    #[test]
    fn template_matching() {
        let snap = snapshot();
        assert!(snap.matches_template(Some("conference")));
        assert!(!snap.matches_template(Some("meetup")));
        assert!(!snap.matches_template(None));

        let mut untemplated = snapshot();
        untemplated.template_id = None;
        assert!(untemplated.matches_template(None));
    }
}

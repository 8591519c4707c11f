//! Form state container.
//!
//! Owns the session's [`FormValues`] and a revision counter. Every
//! successful mutation bumps the revision and publishes it on a
//! `tokio::sync::watch` channel so observers (progress panels, autosave
//! triggers) can react without polling.

use gatherly_core::error::CoreError;
use gatherly_core::wizard::{FormField, FormValues};
use serde_json::Value;
use tokio::sync::watch;

#[derive(Debug)]
pub struct FormState {
    values: FormValues,
    revision: u64,
    changes: watch::Sender<u64>,
}

impl FormState {
    pub fn new(values: FormValues) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            values,
            revision: 0,
            changes,
        }
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Receiver that observes the revision after each mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn get_value(&self, field: FormField) -> Value {
        self.values.get_value(field)
    }

    /// Set one field. A type mismatch leaves the form and revision unchanged.
    pub fn set_value(&mut self, field: FormField, value: Value) -> Result<(), CoreError> {
        self.values.set_value(field, value)?;
        self.bump();
        Ok(())
    }

    /// Apply a fallible edit to the values in place.
    ///
    /// The edit runs on a copy; on error nothing changes.
    pub fn try_update<T>(
        &mut self,
        edit: impl FnOnce(&mut FormValues) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut draft = self.values.clone();
        let out = edit(&mut draft)?;
        self.values = draft;
        self.bump();
        Ok(out)
    }

    /// Apply an infallible edit.
    pub fn update(&mut self, edit: impl FnOnce(&mut FormValues)) {
        edit(&mut self.values);
        self.bump();
    }

    /// Replace every value (restore, template, sample data).
    pub fn reset(&mut self, values: FormValues) {
        self.values = values;
        self.bump();
    }

    fn bump(&mut self) {
        self.revision += 1;
        // No receivers is fine; the value is still stored.
        self.changes.send_replace(self.revision);
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(FormValues::default())
    }
}

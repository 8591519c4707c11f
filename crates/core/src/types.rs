/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Zero-based position of a step in the wizard.
pub type StepIndex = usize;

/// Identifier of an entity created by the backend (opaque to this crate).
pub type EntityId = String;

//! Analytics event names emitted by the wizard.

pub const STEP_COMPLETED: &str = "wizard.step_completed";
pub const WIZARD_CANCELLED: &str = "wizard.cancelled";

pub const DRAFT_AUTOSAVED: &str = "draft.autosaved";
pub const DRAFT_RESTORED: &str = "draft.restored";
pub const DRAFT_DISCARDED: &str = "draft.discarded";
/// Another session overwrote the shared draft slot since our last write.
pub const DRAFT_AUTOSAVE_CONFLICT: &str = "draft.autosave_conflict";

pub const SUBMISSION_STARTED: &str = "submission.started";
pub const SUBMISSION_SUCCEEDED: &str = "submission.succeeded";
pub const SUBMISSION_FAILED: &str = "submission.failed";

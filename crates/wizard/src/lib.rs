//! Gatherly event-creation wizard runtime.
//!
//! Drives the pure logic in `gatherly-core` from a tokio runtime:
//!
//! - [`form_state`] -- form values with change notifications.
//! - [`autosave`] -- debounced draft persistence and restore.
//! - [`storage`] -- draft storage backends.
//! - [`submission`] -- the single-shot create request.
//! - [`session`] -- [`WizardSession`], which wires everything for one
//!   organizer.

pub mod autosave;
pub mod config;
pub mod creator;
pub mod error;
pub mod form_state;
pub mod identity;
pub mod notify;
pub mod session;
pub mod storage;
pub mod submission;

pub use config::WizardConfig;
pub use error::{SubmissionError, WizardError};
pub use session::{SessionDeps, SessionOptions, WizardSession};

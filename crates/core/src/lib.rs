//! Gatherly core domain logic.
//!
//! Pure, synchronous building blocks for the event-creation wizard: the
//! step registry, typed form values, the validation rule catalog and its
//! evaluator, the navigation state machine, the autosave snapshot format,
//! templates, and the creation payload. No I/O lives here; the
//! `gatherly-wizard` crate drives these types from an async runtime.

pub mod error;
pub mod types;
pub mod wizard;

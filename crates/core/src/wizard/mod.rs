//! Event-creation wizard.
//!
//! Step definitions, form values, the declarative rule catalog, the rule
//! evaluator, the navigation state machine, the autosave snapshot format,
//! templates and the creation payload -- all without I/O.

pub mod evaluator;
pub mod form;
pub mod navigation;
pub mod payload;
pub mod rules;
pub mod snapshot;
pub mod steps;
pub mod templates;

pub use evaluator::{StepStatus, ValidationEngine};
pub use form::{
    Collaborator, CollaboratorRole, EventFormat, FormField, FormValues, SponsorshipTier,
    Visibility,
};
pub use navigation::{CompletedStepPolicy, NavigationRejection, Navigator};
pub use payload::CreateEventPayload;
pub use rules::{RuleCategory, ValidationRule, RULES};
pub use snapshot::AutosaveSnapshot;
pub use steps::{StepKind, StepRegistry, WizardStep};
pub use templates::EventTemplate;

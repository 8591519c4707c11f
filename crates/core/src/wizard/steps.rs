//! Wizard step definitions and the step registry.
//!
//! Steps are identified by [`StepKind`]; the integer index used by the
//! navigation layer is always derived from the registry order, so rules and
//! steps can never drift apart.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::StepIndex;

use super::rules::ValidationRule;

// ---------------------------------------------------------------------------
// Step kinds
// ---------------------------------------------------------------------------

/// The six steps of the event-creation wizard, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Basics,
    Schedule,
    Tickets,
    Media,
    Team,
    Review,
}

impl StepKind {
    /// Stable identifier used in analytics and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basics => "basics",
            Self::Schedule => "schedule",
            Self::Tickets => "tickets",
            Self::Media => "media",
            Self::Team => "team",
            Self::Review => "review",
        }
    }
}

// ---------------------------------------------------------------------------
// WizardStep
// ---------------------------------------------------------------------------

/// Static metadata for one wizard step.
#[derive(Debug, Clone, Serialize)]
pub struct WizardStep {
    pub kind: StepKind,
    pub title: &'static str,
    pub description: &'static str,
    /// Optional steps may be skipped visually, but their required rules
    /// still gate forward navigation.
    pub required: bool,
    pub estimated_minutes: u32,
}

const STANDARD_STEPS: &[WizardStep] = &[
    WizardStep {
        kind: StepKind::Basics,
        title: "Event Basics",
        description: "Name your event, describe it and pick a category",
        required: true,
        estimated_minutes: 3,
    },
    WizardStep {
        kind: StepKind::Schedule,
        title: "Date & Location",
        description: "When and where the event takes place",
        required: true,
        estimated_minutes: 2,
    },
    WizardStep {
        kind: StepKind::Tickets,
        title: "Tickets & Capacity",
        description: "Pricing, capacity and refund policy",
        required: true,
        estimated_minutes: 3,
    },
    WizardStep {
        kind: StepKind::Media,
        title: "Media",
        description: "Cover image, gallery and promo video",
        required: false,
        estimated_minutes: 2,
    },
    WizardStep {
        kind: StepKind::Team,
        title: "Team & Visibility",
        description: "Collaborators, sponsorship tiers and who can see the event",
        required: false,
        estimated_minutes: 4,
    },
    WizardStep {
        kind: StepKind::Review,
        title: "Review & Publish",
        description: "Check everything and accept the organizer terms",
        required: true,
        estimated_minutes: 1,
    },
];

// ---------------------------------------------------------------------------
// StepRegistry
// ---------------------------------------------------------------------------

/// Ordered, immutable list of wizard steps.
#[derive(Debug, Clone, Copy)]
pub struct StepRegistry {
    steps: &'static [WizardStep],
}

impl StepRegistry {
    /// The registry used by the event-creation wizard.
    pub fn standard() -> Self {
        Self {
            steps: STANDARD_STEPS,
        }
    }

    /// Number of steps.
    pub fn count(&self) -> usize {
        self.steps.len()
    }

    /// All steps in order.
    pub fn steps(&self) -> &'static [WizardStep] {
        self.steps
    }

    /// Look up a step by index.
    pub fn step_at(&self, index: StepIndex) -> Result<&'static WizardStep, CoreError> {
        self.steps.get(index).ok_or_else(|| CoreError::NotFound {
            entity: "WizardStep",
            id: index.to_string(),
        })
    }

    /// Index of the step with the given kind, if registered.
    pub fn index_of(&self, kind: StepKind) -> Option<StepIndex> {
        self.steps.iter().position(|s| s.kind == kind)
    }

    /// Index of the final step.
    pub fn last_index(&self) -> StepIndex {
        self.steps.len().saturating_sub(1)
    }

    /// Ensure every rule is bound to a step present in this registry.
    pub fn validate_rules(&self, rules: &[ValidationRule]) -> Result<(), CoreError> {
        for rule in rules {
            if self.index_of(rule.step).is_none() {
                return Err(CoreError::Internal(format!(
                    "Rule '{}' references unregistered step '{}'",
                    rule.id,
                    rule.step.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Estimated minutes left, counting every step not yet completed.
    pub fn remaining_minutes(&self, completed: &BTreeSet<StepIndex>) -> u32 {
        self.steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !completed.contains(i))
            .map(|(_, s)| s.estimated_minutes)
            .sum()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::rules::RULES;

    #[test]
    fn standard_registry_has_six_steps() {
        let registry = StepRegistry::standard();
        assert_eq!(registry.count(), 6);
        assert_eq!(registry.last_index(), 5);
        assert_eq!(registry.step_at(0).unwrap().kind, StepKind::Basics);
        assert_eq!(registry.step_at(5).unwrap().kind, StepKind::Review);
    }

    #[test]
    fn step_at_out_of_range_is_not_found() {
        let registry = StepRegistry::standard();
        let err = registry.step_at(6).unwrap_err();
        assert!(err.to_string().contains("WizardStep"));
    }

    #[test]
    fn index_of_follows_registry_order() {
        let registry = StepRegistry::standard();
        for (i, step) in registry.steps().iter().enumerate() {
            assert_eq!(registry.index_of(step.kind), Some(i));
        }
    }

    #[test]
    fn every_catalog_rule_references_a_registered_step() {
        assert!(StepRegistry::standard().validate_rules(RULES).is_ok());
    }

    #[test]
    fn unregistered_step_is_rejected() {
        let registry = StepRegistry {
            steps: &STANDARD_STEPS[..2],
        };
        assert!(registry.validate_rules(RULES).is_err());
    }

    #[test]
    fn remaining_minutes_skips_completed_steps() {
        let registry = StepRegistry::standard();
        let total: u32 = registry.steps().iter().map(|s| s.estimated_minutes).sum();
        assert_eq!(registry.remaining_minutes(&BTreeSet::new()), total);

        let completed: BTreeSet<usize> = [0, 1].into_iter().collect();
        assert_eq!(registry.remaining_minutes(&completed), total - 3 - 2);
    }

    #[test]
    fn optional_steps_are_media_and_team() {
        let optional: Vec<StepKind> = StepRegistry::standard()
            .steps()
            .iter()
            .filter(|s| !s.required)
            .map(|s| s.kind)
            .collect();
        assert_eq!(optional, vec![StepKind::Media, StepKind::Team]);
    }
}

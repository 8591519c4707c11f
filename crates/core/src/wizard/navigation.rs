//! Wizard navigation state machine.
//!
//! Tracks the current step and the set of completed steps. Forward moves
//! are gated on the validation engine, evaluated at the moment of each
//! attempt; backward moves are always allowed. A rejected transition is a
//! value ([`NavigationRejection`]) carrying a user-facing message, never a
//! panic, and is never retried automatically.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::StepIndex;

use super::evaluator::ValidationEngine;
use super::form::FormValues;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What happens to a completed step when its fields are later edited into
/// an invalid state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedStepPolicy {
    /// The step stays completed; jumping past it remains possible.
    #[default]
    Sticky,
    /// The step loses its completed mark as soon as a required rule fails.
    Revalidate,
}

impl CompletedStepPolicy {
    /// Parse a policy name (`sticky` / `revalidate`).
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            "sticky" => Ok(Self::Sticky),
            "revalidate" => Ok(Self::Revalidate),
            _ => Err(CoreError::Validation(format!(
                "Invalid completed-step policy '{s}'. Must be one of: sticky, revalidate"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sticky => "sticky",
            Self::Revalidate => "revalidate",
        }
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRejection {
    /// Required rules of `step` are not met.
    ValidationFailed {
        step: StepIndex,
        failing_rules: Vec<&'static str>,
    },
    AtFirstStep,
    AtLastStep,
    /// Not the last step; submission is only possible from there.
    NotAtLastStep { current: StepIndex },
    /// Target is ahead of the current step and unreachable.
    JumpNotAllowed { target: StepIndex },
    OutOfRange { target: StepIndex, count: usize },
    AlreadySubmitted,
}

impl NavigationRejection {
    /// Message surfaced to the user.
    pub fn message(&self) -> String {
        match self {
            Self::ValidationFailed { failing_rules, .. } => format!(
                "Please complete the required fields before continuing ({} remaining)",
                failing_rules.len()
            ),
            Self::AtFirstStep => "You are already on the first step".to_string(),
            Self::AtLastStep => "You are on the last step; publish to finish".to_string(),
            Self::NotAtLastStep { .. } => {
                "Finish the remaining steps before publishing".to_string()
            }
            Self::JumpNotAllowed { .. } => {
                "Complete the earlier steps before jumping ahead".to_string()
            }
            Self::OutOfRange { target, count } => {
                format!("Step {target} does not exist (the wizard has {count} steps)")
            }
            Self::AlreadySubmitted => "This event has already been published".to_string(),
        }
    }
}

impl std::fmt::Display for NavigationRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Current position in the wizard.
#[derive(Debug, Clone)]
pub struct Navigator {
    engine: ValidationEngine,
    current: StepIndex,
    completed: BTreeSet<StepIndex>,
    submitted: bool,
    policy: CompletedStepPolicy,
}

impl Navigator {
    /// Start at step 0 with nothing completed.
    pub fn new(engine: ValidationEngine, policy: CompletedStepPolicy) -> Self {
        Self {
            engine,
            current: 0,
            completed: BTreeSet::new(),
            submitted: false,
            policy,
        }
    }

    pub fn current(&self) -> StepIndex {
        self.current
    }

    pub fn completed(&self) -> &BTreeSet<StepIndex> {
        &self.completed
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn policy(&self) -> CompletedStepPolicy {
        self.policy
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    fn step_count(&self) -> usize {
        self.engine.registry().count()
    }

    fn last(&self) -> StepIndex {
        self.engine.registry().last_index()
    }

    /// Advance one step if the current step's required rules pass.
    ///
    /// On success the current step joins the completed set and the new
    /// index is returned.
    pub fn next(&mut self, values: &FormValues) -> Result<StepIndex, NavigationRejection> {
        if self.submitted {
            return Err(NavigationRejection::AlreadySubmitted);
        }
        if self.current >= self.last() {
            return Err(NavigationRejection::AtLastStep);
        }
        let failing_rules = self.engine.failing_required(self.current, values);
        if !failing_rules.is_empty() {
            return Err(NavigationRejection::ValidationFailed {
                step: self.current,
                failing_rules,
            });
        }
        self.completed.insert(self.current);
        self.current += 1;
        Ok(self.current)
    }

    /// Go back one step. Never validation-gated.
    pub fn previous(&mut self) -> Result<StepIndex, NavigationRejection> {
        if self.submitted {
            return Err(NavigationRejection::AlreadySubmitted);
        }
        if self.current == 0 {
            return Err(NavigationRejection::AtFirstStep);
        }
        self.current -= 1;
        Ok(self.current)
    }

    /// Check whether a direct jump to `target` would be accepted.
    pub fn check_jump(
        &self,
        target: StepIndex,
        values: &FormValues,
    ) -> Result<(), NavigationRejection> {
        if self.submitted {
            return Err(NavigationRejection::AlreadySubmitted);
        }
        if target >= self.step_count() {
            return Err(NavigationRejection::OutOfRange {
                target,
                count: self.step_count(),
            });
        }
        if target <= self.current
            || self.completed.contains(&target)
            || self.engine.steps_before_satisfied(target, values)
        {
            Ok(())
        } else {
            Err(NavigationRejection::JumpNotAllowed { target })
        }
    }

    /// Whether the step button for `target` should be enabled.
    pub fn can_jump(&self, target: StepIndex, values: &FormValues) -> bool {
        self.check_jump(target, values).is_ok()
    }

    /// Jump directly to `target`.
    pub fn jump(
        &mut self,
        target: StepIndex,
        values: &FormValues,
    ) -> Result<StepIndex, NavigationRejection> {
        self.check_jump(target, values)?;
        self.current = target;
        Ok(self.current)
    }

    /// Gate for the final submit action.
    pub fn check_submit(&self, values: &FormValues) -> Result<(), NavigationRejection> {
        if self.submitted {
            return Err(NavigationRejection::AlreadySubmitted);
        }
        if self.current != self.last() {
            return Err(NavigationRejection::NotAtLastStep {
                current: self.current,
            });
        }
        let failing_rules = self.engine.failing_required(self.current, values);
        if !failing_rules.is_empty() {
            return Err(NavigationRejection::ValidationFailed {
                step: self.current,
                failing_rules,
            });
        }
        Ok(())
    }

    /// Enter the terminal state after a successful submission.
    pub fn mark_submitted(&mut self) {
        self.completed.insert(self.current);
        self.submitted = true;
    }

    /// Apply the completed-step policy after a form change.
    ///
    /// Returns the steps that lost their completed mark (always empty under
    /// [`CompletedStepPolicy::Sticky`]).
    pub fn revalidate(&mut self, values: &FormValues) -> Vec<StepIndex> {
        if self.policy == CompletedStepPolicy::Sticky {
            return Vec::new();
        }
        let invalid: Vec<StepIndex> = self
            .completed
            .iter()
            .copied()
            .filter(|s| !self.engine.step_status(*s, values).required_satisfied)
            .collect();
        for step in &invalid {
            self.completed.remove(step);
        }
        invalid
    }

    /// Restore a saved position.
    ///
    /// Fails if `current` or any completed index is outside the registry.
    pub fn restore(
        &mut self,
        current: StepIndex,
        completed: &BTreeSet<StepIndex>,
    ) -> Result<(), CoreError> {
        let count = self.step_count();
        if current >= count {
            return Err(CoreError::Validation(format!(
                "Saved step {current} is out of range (0..{count})"
            )));
        }
        if let Some(bad) = completed.iter().find(|s| **s >= count) {
            return Err(CoreError::Validation(format!(
                "Saved completed step {bad} is out of range (0..{count})"
            )));
        }
        self.current = current;
        self.completed = completed.clone();
        self.submitted = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

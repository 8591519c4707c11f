//! Validation engine -- pure logic over the rule catalog.
//!
//! Every query re-evaluates the rules against the values passed in; nothing
//! is cached, so callers always see the outcome for the current form.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::StepIndex;

use super::form::{FormField, FormValues};
use super::rules::{RuleCategory, ValidationRule, RULES};
use super::steps::StepRegistry;

/// Pass/fail summary of the rules bound to one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub step: StepIndex,
    pub passed_count: usize,
    pub total_count: usize,
    /// `true` iff every required rule of the step passes.
    pub required_satisfied: bool,
    /// Informational: passed / total over all rules of the step.
    pub percentage: u8,
}

/// Outcome of a single rule, for checklists and reports.
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub id: &'static str,
    pub label: &'static str,
    pub step: StepIndex,
    pub required: bool,
    pub category: RuleCategory,
    pub passed: bool,
}

/// Full validation picture of a form.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub overall_progress: u8,
    pub steps: Vec<StepStatus>,
    pub rules: Vec<RuleResult>,
}

/// Percentage of `passed` over `total`, rounded. A step without rules is
/// complete by definition.
pub fn compute_percentage(total: usize, passed: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (passed as f64 / total as f64 * 100.0).round() as u8;
    pct.min(100)
}

/// Evaluates the rule catalog against form values.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    registry: StepRegistry,
    rules: &'static [ValidationRule],
    /// Step index of each rule, parallel to `rules`.
    rule_steps: Vec<StepIndex>,
}

impl ValidationEngine {
    /// Build an engine, checking that every rule references a registered step.
    pub fn new(
        registry: StepRegistry,
        rules: &'static [ValidationRule],
    ) -> Result<Self, CoreError> {
        registry.validate_rules(rules)?;
        let rule_steps = rules
            .iter()
            .filter_map(|r| registry.index_of(r.step))
            .collect();
        Ok(Self {
            registry,
            rules,
            rule_steps,
        })
    }

    /// The standard registry and rule catalog.
    pub fn standard() -> Self {
        let registry = StepRegistry::standard();
        let rule_steps = RULES
            .iter()
            .map(|r| registry.index_of(r.step).unwrap_or(usize::MAX))
            .collect();
        Self {
            registry,
            rules: RULES,
            rule_steps,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &'static [ValidationRule] {
        self.rules
    }

    fn rules_with_steps(&self) -> impl Iterator<Item = (&'static ValidationRule, StepIndex)> + '_ {
        self.rules.iter().zip(self.rule_steps.iter().copied())
    }

    /// Rules bound to the given step.
    pub fn rules_for_step(
        &self,
        step: StepIndex,
    ) -> impl Iterator<Item = &'static ValidationRule> + '_ {
        self.rules_with_steps()
            .filter(move |(_, s)| *s == step)
            .map(|(r, _)| r)
    }

    /// Evaluate every rule. Keyed by rule id.
    pub fn evaluate_all(&self, values: &FormValues) -> BTreeMap<&'static str, bool> {
        self.rules
            .iter()
            .map(|r| (r.id, r.passes(values)))
            .collect()
    }

    /// Summary of one step. Indexes outside the registry have no rules.
    pub fn step_status(&self, step: StepIndex, values: &FormValues) -> StepStatus {
        let mut total = 0usize;
        let mut passed = 0usize;
        let mut required_satisfied = true;

        for rule in self.rules_for_step(step) {
            total += 1;
            if rule.passes(values) {
                passed += 1;
            } else if rule.required {
                required_satisfied = false;
            }
        }

        StepStatus {
            step,
            passed_count: passed,
            total_count: total,
            required_satisfied,
            percentage: compute_percentage(total, passed),
        }
    }

    /// Status of every registered step, in order.
    pub fn all_step_statuses(&self, values: &FormValues) -> Vec<StepStatus> {
        (0..self.registry.count())
            .map(|i| self.step_status(i, values))
            .collect()
    }

    /// Whether every step strictly before `step` has its required rules met.
    pub fn steps_before_satisfied(&self, step: StepIndex, values: &FormValues) -> bool {
        (0..step).all(|i| self.step_status(i, values).required_satisfied)
    }

    /// Percentage of passing rules across the whole catalog.
    pub fn overall_progress(&self, values: &FormValues) -> u8 {
        let total = self.rules.len();
        let passed = self.rules.iter().filter(|r| r.passes(values)).count();
        compute_percentage(total, passed)
    }

    /// Ids of the required rules of `step` that currently fail.
    pub fn failing_required(&self, step: StepIndex, values: &FormValues) -> Vec<&'static str> {
        self.rules_for_step(step)
            .filter(|r| r.required && !r.passes(values))
            .map(|r| r.id)
            .collect()
    }

    /// Inline messages for every failing rule, grouped by field.
    pub fn field_messages(&self, values: &FormValues) -> BTreeMap<FormField, Vec<&'static str>> {
        let mut messages: BTreeMap<FormField, Vec<&'static str>> = BTreeMap::new();
        for rule in self.rules.iter().filter(|r| !r.passes(values)) {
            for field in rule.fields {
                messages.entry(*field).or_default().push(rule.description);
            }
        }
        messages
    }

    /// Everything a progress panel or inspection tool needs.
    pub fn report(&self, values: &FormValues) -> ValidationReport {
        let rules = self
            .rules_with_steps()
            .map(|(r, step)| RuleResult {
                id: r.id,
                label: r.label,
                step,
                required: r.required,
                category: r.category,
                passed: r.passes(values),
            })
            .collect();

        ValidationReport {
            overall_progress: self.overall_progress(values),
            steps: self.all_step_statuses(values),
            rules,
        }
    }
}

impl Default for ValidationEngine {
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
    use crate::wizard::form::EventFormat;
    use crate::wizard::steps::StepKind;

    fn basics_ok() -> FormValues {
        FormValues {
            title: "My Event".to_string(),
            description: "A gathering of people who love music.".to_string(),
            category: "Music".to_string(),
            ..FormValues::default()
        }
    }

    #[test]
    fn standard_engine_matches_checked_constructor() {
        let checked = ValidationEngine::new(StepRegistry::standard(), RULES).unwrap();
        let standard = ValidationEngine::standard();
        assert_eq!(checked.rule_steps, standard.rule_steps);
    }

    #[test]
    fn empty_title_blocks_basics() {
        let engine = ValidationEngine::standard();
        let status = engine.step_status(0, &FormValues::default());
        assert!(!status.required_satisfied);
        assert!(engine
            .failing_required(0, &FormValues::default())
            .contains(&"title_present"));
    }

    #[test]
    fn valid_basics_satisfy_step_zero() {
        let engine = ValidationEngine::standard();
        let status = engine.step_status(0, &basics_ok());
        assert!(status.required_satisfied);
        // The optional tags rule still fails and only lowers the percentage.
        assert_eq!(status.total_count, 5);
        assert_eq!(status.passed_count, 4);
        assert_eq!(status.percentage, 80);
    }

    #[test]
    fn required_satisfied_iff_all_required_rules_pass() {
        let engine = ValidationEngine::standard();
        let forms = [FormValues::default(), basics_ok(), FormValues::sample()];
        for form in &forms {
            for step in 0..engine.registry().count() {
                let expected = engine
                    .rules_for_step(step)
                    .filter(|r| r.required)
                    .all(|r| r.passes(form));
                assert_eq!(engine.step_status(step, form).required_satisfied, expected);
            }
        }
    }

    #[test]
    fn optional_rules_never_block() {
        let engine = ValidationEngine::standard();
        let mut form = FormValues::sample();
        form.tags.clear();
        form.timezone.clear();
        let basics = engine.step_status(0, &form);
        assert!(basics.required_satisfied);
        assert!(basics.percentage < 100);
    }

    #[test]
    fn conditional_rule_passes_when_not_applicable() {
        let engine = ValidationEngine::standard();
        let mut form = FormValues::default();
        form.event_format = EventFormat::InPerson;
        let results = engine.evaluate_all(&form);
        assert_eq!(results["virtual_url_valid"], true);
    }

    #[test]
    fn evaluate_all_covers_every_rule() {
        let engine = ValidationEngine::standard();
        let results = engine.evaluate_all(&FormValues::default());
        assert_eq!(results.len(), RULES.len());
    }

    #[test]
    fn sample_is_fully_complete() {
        let engine = ValidationEngine::standard();
        let sample = FormValues::sample();
        assert_eq!(engine.overall_progress(&sample), 100);
        for status in engine.all_step_statuses(&sample) {
            assert!(status.required_satisfied);
            assert_eq!(status.percentage, 100);
        }
    }

    #[test]
    fn overall_progress_counts_all_rules() {
        let engine = ValidationEngine::standard();
        let form = FormValues::default();
        let passed = engine.evaluate_all(&form).values().filter(|p| **p).count();
        assert_eq!(
            engine.overall_progress(&form),
            compute_percentage(RULES.len(), passed)
        );
    }

    #[test]
    fn field_messages_point_at_failing_fields() {
        let engine = ValidationEngine::standard();
        let messages = engine.field_messages(&FormValues::default());
        assert!(messages[&FormField::Title].contains(&"Give your event a title"));
        assert!(!messages.contains_key(&FormField::VirtualUrl));
    }

    #[test]
    fn steps_before_satisfied_checks_prefix() {
        let engine = ValidationEngine::standard();
        let form = basics_ok();
        assert!(engine.steps_before_satisfied(0, &form));
        assert!(engine.steps_before_satisfied(1, &form));
        assert!(!engine.steps_before_satisfied(2, &form));
    }

    #[test]
    fn review_step_gated_by_terms() {
        let engine = ValidationEngine::standard();
        let review = engine.registry().index_of(StepKind::Review).unwrap();
        let mut form = FormValues::sample();
        form.accept_terms = false;
        assert!(!engine.step_status(review, &form).required_satisfied);
    }

    #[test]
    fn report_lists_every_step_and_rule() {
        let engine = ValidationEngine::standard();
        let report = engine.report(&FormValues::default());
        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.rules.len(), RULES.len());
    }

    #[test]
    fn percentage_helper_edges() {
        assert_eq!(compute_percentage(0, 0), 100);
        assert_eq!(compute_percentage(3, 1), 33);
        assert_eq!(compute_percentage(3, 2), 67);
        assert_eq!(compute_percentage(4, 4), 100);
    }
}

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::types::{ChorePolicy, OCCURRENCE_COUNT, REPEAT_FREQUENCY_DAYS};

/// Checks a recurrence policy against date and range bounds before expansion.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyValidator;

impl PolicyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validates `policy` relative to `today`.
    ///
    /// Every rule is evaluated and all violations are reported together. A
    /// first due date on or before yesterday is rejected; today is accepted.
    pub fn validate(
        &self,
        policy: ChorePolicy,
        today: NaiveDate,
    ) -> Result<ValidatedPolicy, ValidationFailure> {
        let mut violations = Vec::new();

        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        if yesterday >= policy.first_due_date {
            violations.push(PolicyViolation::DueDateInPast {
                first_due_date: policy.first_due_date,
                yesterday,
            });
        }

        if !REPEAT_FREQUENCY_DAYS.contains(&policy.repeat_frequency_days) {
            violations.push(PolicyViolation::RepeatFrequencyOutOfRange(
                policy.repeat_frequency_days,
            ));
        }

        if !OCCURRENCE_COUNT.contains(&policy.occurrence_count) {
            violations.push(PolicyViolation::OccurrenceCountOutOfRange(
                policy.occurrence_count,
            ));
        }

        if violations.is_empty() {
            return Ok(ValidatedPolicy(policy));
        }

        for violation in &violations {
            warn!(stage = "validate", chore = %policy.name, reason = violation.code(), "{violation}");
        }
        Err(ValidationFailure { violations })
    }

    /// Pass/fail form of [`PolicyValidator::validate`].
    pub fn is_valid(&self, policy: &ChorePolicy, today: NaiveDate) -> bool {
        self.validate(policy.clone(), today).is_ok()
    }
}

/// A policy that passed every validation rule.
///
/// Only [`PolicyValidator::validate`] constructs this, so the expander can
/// rely on the counts being in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPolicy(ChorePolicy);

impl ValidatedPolicy {
    pub fn policy(&self) -> &ChorePolicy {
        &self.0
    }

    pub fn into_inner(self) -> ChorePolicy {
        self.0
    }
}

/// Individual rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PolicyViolation {
    DueDateInPast {
        first_due_date: NaiveDate,
        yesterday: NaiveDate,
    },
    RepeatFrequencyOutOfRange(i64),
    OccurrenceCountOutOfRange(i64),
}

impl PolicyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DueDateInPast { .. } => "due_date_in_past",
            Self::RepeatFrequencyOutOfRange(_) => "repeat_frequency_out_of_range",
            Self::OccurrenceCountOutOfRange(_) => "occurrence_count_out_of_range",
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DueDateInPast { first_due_date, .. } => {
                write!(f, "cannot assign chores due in the past ({first_due_date})")
            }
            Self::RepeatFrequencyOutOfRange(value) => write!(
                f,
                "repeat frequency must be between {} and {} days, inclusive (got {value})",
                REPEAT_FREQUENCY_DAYS.start(),
                REPEAT_FREQUENCY_DAYS.end()
            ),
            Self::OccurrenceCountOutOfRange(value) => write!(
                f,
                "number of occurrences must be between {} and {}, inclusive (got {value})",
                OCCURRENCE_COUNT.start(),
                OCCURRENCE_COUNT.end()
            ),
        }
    }
}

/// One or more rules rejected the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chore policy rejected: {}", summarize(.violations))]
pub struct ValidationFailure {
    pub violations: Vec<PolicyViolation>,
}

impl ValidationFailure {
    pub fn codes(&self) -> Vec<&'static str> {
        self.violations.iter().map(PolicyViolation::code).collect()
    }
}

fn summarize(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

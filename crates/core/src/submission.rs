use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::calendar::HouseholdCalendar;
use crate::expander::{DueDateAnchor, ExpandError, InstanceExpander};
use crate::form::{ChoreForm, FormError};
use crate::identity::resolve_identity;
use crate::persister::SequentialPersister;
use crate::ports::{ChoreStore, IdentityResolver, StoreError};
use crate::validator::{PolicyValidator, ValidationFailure};

/// How a chore submission ended.
///
/// Failures are reported here and in the log; `handle_submit` never
/// returns an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The field map could not be read as a chore policy.
    Invalid(FormError),
    /// The policy broke one or more validation rules.
    Rejected(ValidationFailure),
    /// Apartment or user lookup was rejected.
    IdentityUnresolved(StoreError),
    /// Due dates could not be computed.
    Unexpandable(ExpandError),
    /// Every occurrence was stored.
    Persisted {
        stored: usize,
        due_dates: Vec<NaiveDate>,
    },
    /// A write was rejected; earlier occurrences remain stored.
    Halted {
        stored: usize,
        total: usize,
        failed_index: usize,
        error: StoreError,
    },
}

impl SubmissionOutcome {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::Rejected(_) => "rejected",
            Self::IdentityUnresolved(_) => "identity_unresolved",
            Self::Unexpandable(_) => "unexpandable",
            Self::Persisted { .. } => "persisted",
            Self::Halted { .. } => "halted",
        }
    }

    pub fn stored(&self) -> usize {
        match self {
            Self::Persisted { stored, .. } | Self::Halted { stored, .. } => *stored,
            _ => 0,
        }
    }

    /// JSON summary returned to the form.
    pub fn summary(&self) -> Value {
        match self {
            Self::Invalid(err) => json!({
                "result": self.as_str(),
                "field": err.field(),
                "detail": err.to_string(),
            }),
            Self::Rejected(failure) => json!({
                "result": self.as_str(),
                "violations": failure.violations,
                "detail": failure.to_string(),
            }),
            Self::IdentityUnresolved(err) => json!({
                "result": self.as_str(),
                "detail": err.to_string(),
            }),
            Self::Unexpandable(err) => json!({
                "result": self.as_str(),
                "detail": err.to_string(),
            }),
            Self::Persisted { stored, due_dates } => json!({
                "result": self.as_str(),
                "stored": stored,
                "due_dates": due_dates,
            }),
            Self::Halted {
                stored,
                total,
                failed_index,
                error,
            } => json!({
                "result": self.as_str(),
                "stored": stored,
                "total": total,
                "failed_index": failed_index,
                "detail": error.to_string(),
            }),
        }
    }
}

/// Chore form workflow: parse, validate, resolve identity, expand, persist.
#[derive(Debug, Clone)]
pub struct ChoreSubmission {
    calendar: HouseholdCalendar,
    validator: PolicyValidator,
    expander: InstanceExpander,
}

impl ChoreSubmission {
    pub fn new(calendar: HouseholdCalendar, anchor: DueDateAnchor) -> Self {
        Self {
            expander: InstanceExpander::new(anchor, calendar.clone()),
            validator: PolicyValidator::new(),
            calendar,
        }
    }

    pub fn anchor(&self) -> DueDateAnchor {
        self.expander.anchor()
    }

    /// Handles one submitted chore form against `store`.
    ///
    /// Validation runs before any store call, so a rejected policy causes no
    /// lookups and no writes.
    pub async fn handle_submit<S>(&self, store: &S, form: ChoreForm) -> SubmissionOutcome
    where
        S: IdentityResolver + ChoreStore + ?Sized,
    {
        let outcome = self.run(store, form).await;
        match &outcome {
            SubmissionOutcome::Persisted { stored, .. } => {
                info!(stage = "submit", result = outcome.as_str(), stored, "chore submission handled");
            }
            other => {
                warn!(stage = "submit", result = other.as_str(), stored = other.stored(), "chore submission dropped");
            }
        }
        outcome
    }

    async fn run<S>(&self, store: &S, form: ChoreForm) -> SubmissionOutcome
    where
        S: IdentityResolver + ChoreStore + ?Sized,
    {
        let policy = match form.into_policy() {
            Ok(policy) => policy,
            Err(err) => {
                warn!(stage = "validate", error = %err, "received invalid chore form");
                return SubmissionOutcome::Invalid(err);
            }
        };

        let validated = match self.validator.validate(policy, self.calendar.today()) {
            Ok(validated) => validated,
            Err(failure) => return SubmissionOutcome::Rejected(failure),
        };

        let identity = match resolve_identity(store).await {
            Ok(identity) => identity,
            Err(err) => return SubmissionOutcome::IdentityUnresolved(err),
        };

        let chores = match self.expander.expand(
            &validated,
            identity.apartment.id(),
            identity.user.id(),
        ) {
            Ok(chores) => chores,
            Err(err) => {
                warn!(stage = "expand", error = %err, "failed to expand chore policy");
                return SubmissionOutcome::Unexpandable(err);
            }
        };

        let report = SequentialPersister::new(store).persist_all(&chores).await;
        match (report.failed_index(), report.error) {
            (Some(failed_index), Some(error)) => SubmissionOutcome::Halted {
                stored: report.stored,
                total: report.total,
                failed_index,
                error,
            },
            _ => SubmissionOutcome::Persisted {
                stored: report.stored,
                due_dates: chores.iter().map(|chore| chore.due_date).collect(),
            },
        }
    }
}

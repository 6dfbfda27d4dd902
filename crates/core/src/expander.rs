use chrono::{Datelike, Days, NaiveDate};
use thiserror::Error;
use tracing::debug;

use crate::calendar::HouseholdCalendar;
use crate::types::{ApartmentId, ChoreInstance, UserId};
use crate::validator::ValidatedPolicy;

/// Date the first occurrence is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueDateAnchor {
    /// Current year and month with the policy's day of month. Days past the
    /// end of the month roll into the following months.
    #[default]
    CurrentMonth,
    /// Occurrences count from the household date at expansion time.
    SubmissionDate,
    /// Occurrences count from the policy's `first_due_date`.
    FirstDueDate,
}

impl DueDateAnchor {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "current_month" => Some(Self::CurrentMonth),
            "submission_date" => Some(Self::SubmissionDate),
            "first_due_date" => Some(Self::FirstDueDate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentMonth => "current_month",
            Self::SubmissionDate => "submission_date",
            Self::FirstDueDate => "first_due_date",
        }
    }

    fn resolve(self, policy: &ValidatedPolicy, today: NaiveDate) -> Result<NaiveDate, ExpandError> {
        match self {
            Self::CurrentMonth => {
                let day = policy.policy().first_due_date.day();
                today
                    .with_day(1)
                    .and_then(|start| start.checked_add_days(Days::new(u64::from(day - 1))))
                    .ok_or(ExpandError::DateOutOfRange { index: 0 })
            }
            Self::SubmissionDate => Ok(today),
            Self::FirstDueDate => Ok(policy.policy().first_due_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("occurrence {index} falls outside the supported calendar range")]
    DateOutOfRange { index: i64 },
}

/// Turns a validated policy into dated chore instances.
#[derive(Debug, Clone)]
pub struct InstanceExpander {
    anchor: DueDateAnchor,
    calendar: HouseholdCalendar,
}

impl InstanceExpander {
    pub fn new(anchor: DueDateAnchor, calendar: HouseholdCalendar) -> Self {
        Self { anchor, calendar }
    }

    pub fn anchor(&self) -> DueDateAnchor {
        self.anchor
    }

    /// Expands `policy` into `occurrence_count` instances in occurrence order.
    ///
    /// The calendar is read once; every due date is offset from that single
    /// anchor date.
    pub fn expand(
        &self,
        policy: &ValidatedPolicy,
        owner_id: &ApartmentId,
        user_id: &UserId,
    ) -> Result<Vec<ChoreInstance>, ExpandError> {
        let anchor_date = self.anchor.resolve(policy, self.calendar.today())?;
        debug!(stage = "expand", anchor = self.anchor.as_str(), %anchor_date, "expanding chore policy");
        expand_from(policy, owner_id, user_id, anchor_date)
    }
}

/// Builds instance `i` with `due_date = anchor_date + i * repeat_frequency_days`.
pub fn expand_from(
    policy: &ValidatedPolicy,
    owner_id: &ApartmentId,
    user_id: &UserId,
    anchor_date: NaiveDate,
) -> Result<Vec<ChoreInstance>, ExpandError> {
    let policy = policy.policy();
    (0..policy.occurrence_count)
        .map(|index| {
            let offset = u64::try_from(index * policy.repeat_frequency_days)
                .map_err(|_| ExpandError::DateOutOfRange { index })?;
            let due_date = anchor_date
                .checked_add_days(Days::new(offset))
                .ok_or(ExpandError::DateOutOfRange { index })?;
            Ok(ChoreInstance {
                owner_id: owner_id.clone(),
                user_id: user_id.clone(),
                name: policy.name.clone(),
                assignee: policy.assignee.clone(),
                details: policy.details.clone(),
                due_date,
                completed: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChorePolicy;
    use crate::validator::PolicyValidator;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn validated(first_due_date: NaiveDate, frequency: i64, count: i64, today: NaiveDate) -> ValidatedPolicy {
        PolicyValidator::new()
            .validate(
                ChorePolicy {
                    name: "Dishes".into(),
                    assignee: "Alex".into(),
                    first_due_date,
                    repeat_frequency_days: frequency,
                    occurrence_count: count,
                    details: Some("Hand wash the pans".into()),
                },
                today,
            )
            .expect("policy is valid")
    }

    fn ids() -> (ApartmentId, UserId) {
        (ApartmentId::new("apt-1"), UserId::new("user-1"))
    }

    #[test]
    fn weekly_dishes_land_one_week_apart() {
        let today = date(2024, 1, 10);
        let policy = validated(today, 7, 3, today);
        let (apt, user) = ids();
        let expander = InstanceExpander::new(DueDateAnchor::default(), HouseholdCalendar::fixed(today));

        let chores = expander.expand(&policy, &apt, &user).unwrap();

        let due: Vec<_> = chores.iter().map(|c| c.due_date).collect();
        assert_eq!(due, vec![date(2024, 1, 10), date(2024, 1, 17), date(2024, 1, 24)]);
        for chore in &chores {
            assert_eq!(chore.name, "Dishes");
            assert_eq!(chore.assignee, "Alex");
            assert_eq!(chore.details.as_deref(), Some("Hand wash the pans"));
            assert_eq!(chore.owner_id, apt);
            assert_eq!(chore.user_id, user);
            assert!(!chore.completed);
        }
    }

    #[test]
    fn count_and_spacing_hold_across_ranges() {
        let today = date(2024, 1, 30);
        let (apt, user) = ids();
        for (frequency, count) in [(1, 1), (1, 100), (3, 31), (30, 12), (365, 100)] {
            let policy = validated(today, frequency, count, today);
            let chores = expand_from(&policy, &apt, &user, today).unwrap();
            assert_eq!(chores.len() as i64, count);
            for pair in chores.windows(2) {
                assert_eq!((pair[1].due_date - pair[0].due_date).num_days(), frequency);
            }
        }
    }

    #[test]
    fn current_month_anchor_keeps_policy_day_of_month() {
        let today = date(2024, 1, 10);
        let policy = validated(date(2024, 1, 15), 7, 2, today);
        let (apt, user) = ids();
        let expander = InstanceExpander::new(DueDateAnchor::CurrentMonth, HouseholdCalendar::fixed(today));

        let chores = expander.expand(&policy, &apt, &user).unwrap();
        let due: Vec<_> = chores.iter().map(|c| c.due_date).collect();
        assert_eq!(due, vec![date(2024, 1, 15), date(2024, 1, 22)]);
    }

    #[test]
    fn current_month_anchor_uses_todays_month_and_rolls_over() {
        let today = date(2024, 1, 30);
        // Due on the 5th of a later month; only the day of month is kept.
        let policy = validated(date(2024, 3, 5), 14, 3, today);
        let (apt, user) = ids();
        let expander = InstanceExpander::new(DueDateAnchor::CurrentMonth, HouseholdCalendar::fixed(today));

        let due: Vec<_> = expander
            .expand(&policy, &apt, &user)
            .unwrap()
            .iter()
            .map(|c| c.due_date)
            .collect();
        assert_eq!(due, vec![date(2024, 1, 5), date(2024, 1, 19), date(2024, 2, 2)]);

        let policy = validated(date(2024, 3, 31), 1, 2, date(2024, 2, 20));
        let chores = InstanceExpander::new(DueDateAnchor::CurrentMonth, HouseholdCalendar::fixed(date(2024, 2, 20)))
            .expand(&policy, &apt, &user)
            .unwrap();
        assert_eq!(chores[0].due_date, date(2024, 3, 2));
        assert_eq!(chores[1].due_date, date(2024, 3, 3));
    }

    #[test]
    fn submission_anchor_ignores_first_due_date() {
        let today = date(2024, 1, 10);
        let policy = validated(date(2024, 2, 1), 2, 2, today);
        let (apt, user) = ids();
        let expander = InstanceExpander::new(DueDateAnchor::SubmissionDate, HouseholdCalendar::fixed(today));

        let chores = expander.expand(&policy, &apt, &user).unwrap();
        assert_eq!(chores[0].due_date, today);
        assert_eq!(chores[1].due_date, date(2024, 1, 12));
    }

    #[test]
    fn first_due_date_anchor_starts_at_policy_date() {
        let today = date(2024, 1, 10);
        let policy = validated(date(2024, 2, 1), 2, 2, today);
        let (apt, user) = ids();
        let expander = InstanceExpander::new(DueDateAnchor::FirstDueDate, HouseholdCalendar::fixed(today));

        let chores = expander.expand(&policy, &apt, &user).unwrap();
        assert_eq!(chores[0].due_date, date(2024, 2, 1));
        assert_eq!(chores[1].due_date, date(2024, 2, 3));
    }

    #[test]
    fn spacing_crosses_month_and_leap_day() {
        let today = date(2024, 2, 27);
        let policy = validated(today, 1, 4, today);
        let (apt, user) = ids();
        let chores = expand_from(&policy, &apt, &user, today).unwrap();
        let due: Vec<_> = chores.iter().map(|c| c.due_date).collect();
        assert_eq!(
            due,
            vec![date(2024, 2, 27), date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]
        );
    }

    #[test]
    fn reads_the_clock_once_per_expansion() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let today = date(2024, 1, 10);
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let instant = today.and_hms_opt(8, 0, 0).unwrap().and_utc();
        let calendar = HouseholdCalendar::new(
            chrono_tz::Tz::UTC,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                instant
            }),
        );
        let policy = validated(today, 1, 25, today);
        let (apt, user) = ids();

        let chores = InstanceExpander::new(DueDateAnchor::SubmissionDate, calendar)
            .expand(&policy, &apt, &user)
            .unwrap();

        assert_eq!(chores.len(), 25);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn anchor_names_round_trip() {
        for anchor in [
            DueDateAnchor::CurrentMonth,
            DueDateAnchor::SubmissionDate,
            DueDateAnchor::FirstDueDate,
        ] {
            assert_eq!(DueDateAnchor::parse(anchor.as_str()), Some(anchor));
        }
        assert_eq!(DueDateAnchor::parse("yesterday"), None);
        assert_eq!(DueDateAnchor::default(), DueDateAnchor::CurrentMonth);
    }
}

use std::{fmt, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of the current instant, swappable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Resolves calendar days in the household's timezone.
#[derive(Clone)]
pub struct HouseholdCalendar {
    clock: Clock,
    timezone: Tz,
}

impl HouseholdCalendar {
    pub fn new(timezone: Tz, clock: Clock) -> Self {
        Self { clock, timezone }
    }

    /// Calendar backed by the system clock.
    pub fn system(timezone: Tz) -> Self {
        Self::new(timezone, Arc::new(Utc::now))
    }

    /// Calendar pinned to midday UTC of `date`, used by tests and replays.
    pub fn fixed(date: NaiveDate) -> Self {
        let instant = date
            .and_hms_opt(12, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(Utc::now);
        Self::new(Tz::UTC, Arc::new(move || instant))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Returns today's date in the household timezone.
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.timezone).date_naive()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl fmt::Debug for HouseholdCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HouseholdCalendar")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

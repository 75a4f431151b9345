//! Per-pass snapshot shared by every evaluator.

use chrono::{DateTime, NaiveDate, Utc};

use crate::calendar::BusinessCalendar;
use crate::error::{GamedayError, Result};
use crate::ledger::Ledger;
use crate::presence::PresenceIndex;
use crate::schedule::{Event, ScheduleLookup};

/// Outcome of one schedule lookup, kept as a message so every workflow that
/// depends on it can report the same failure.
type Lookup = std::result::Result<Vec<Event>, String>;

/// Today's and yesterday's events, fetched at most once per pass.
pub(crate) struct EventCache {
    today: Lookup,
    yesterday: Lookup,
}

impl EventCache {
    pub(crate) fn load(
        schedule: &dyn ScheduleLookup,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> Self {
        let fetch = |date: NaiveDate| {
            schedule.events_for_date(date).map_err(|e| {
                tracing::warn!(%date, error = %e, "schedule lookup failed");
                match e {
                    GamedayError::Schedule(message) => message,
                    other => other.to_string(),
                }
            })
        };
        Self {
            today: fetch(today),
            yesterday: fetch(yesterday),
        }
    }

    /// Used when no evaluated workflow depends on the schedule.
    pub(crate) fn not_loaded() -> Self {
        let msg = "schedule was not loaded for this pass".to_string();
        Self {
            today: Err(msg.clone()),
            yesterday: Err(msg),
        }
    }
}

pub(crate) struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    pub calendar: BusinessCalendar,
    pub ledger: &'a dyn Ledger,
    pub presence: &'a dyn PresenceIndex,
    pub events: &'a EventCache,
}

impl EvalContext<'_> {
    pub fn events_today(&self) -> Result<&[Event]> {
        self.events
            .today
            .as_deref()
            .map_err(|e| GamedayError::Schedule(e.clone()))
    }

    pub fn events_yesterday(&self) -> Result<&[Event]> {
        self.events
            .yesterday
            .as_deref()
            .map_err(|e| GamedayError::Schedule(e.clone()))
    }
}

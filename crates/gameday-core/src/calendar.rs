//! Business-date and local time-of-day arithmetic.
//!
//! Every policy time in the registry is a wall-clock time in the configured
//! timezone. The engine works in UTC instants, so windows are resolved into
//! `[start, end)` UTC ranges for a given business date before comparing them
//! against `now`.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{GamedayError, Result};

// ---------------------------------------------------------------------------
// BusinessCalendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    tz: Tz,
}

impl BusinessCalendar {
    pub fn parse(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| GamedayError::InvalidTimezone(name.to_string()))?;
        Ok(Self { tz })
    }

    /// The business date `now` falls on in the configured timezone.
    pub fn business_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.tz).time()
    }

    /// Resolve a local wall-clock time on `date` to a UTC instant.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant; times
    /// inside a DST gap do not exist and are an error.
    pub fn instant(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
        match self.tz.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Err(GamedayError::InvalidConfig(format!(
                "{} {} does not exist in {}",
                date,
                time.format("%H:%M"),
                self.tz
            ))),
        }
    }

    /// Resolve a [`TimeWindow`] on `date` to a UTC range.
    pub fn resolve(&self, date: NaiveDate, window: &TimeWindow) -> Result<UtcWindow> {
        Ok(UtcWindow {
            start: self.instant(date, window.start)?,
            end: self.instant(date, window.end)?,
        })
    }
}

// ---------------------------------------------------------------------------
// TimeWindow / UtcWindow
// ---------------------------------------------------------------------------

/// A local time-of-day window `[start, end)`. `start < end` is enforced at
/// registry load; windows never wrap midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcWindow {
    /// Half-open containment: `start` is inside, `end` is not.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn around(target: DateTime<Utc>, tolerance: Duration) -> Self {
        Self {
            start: target - tolerance,
            end: target + tolerance,
        }
    }
}

/// Whole hours between two instants as a float, by plain UTC subtraction.
pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / 3600.0
}

// ---------------------------------------------------------------------------
// Serde helpers for "HH:MM" times of day
// ---------------------------------------------------------------------------

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{raw}': {e}")))
    }
}

pub mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match t {
            Some(t) => s.serialize_some(&t.format("%H:%M").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::hhmm")] NaiveTime);

        let opt: Option<Wrapper> = Option::deserialize(d)?;
        Ok(opt.map(|Wrapper(t)| t))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn business_date_follows_local_midnight() {
        let cal = BusinessCalendar::parse("America/New_York").unwrap();
        // 03:30 UTC on Feb 8 is 22:30 EST on Feb 7.
        let now = Utc.with_ymd_and_hms(2026, 2, 8, 3, 30, 0).unwrap();
        assert_eq!(
            cal.business_date(now),
            NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()
        );
    }

    #[test]
    fn window_is_half_open() {
        let cal = BusinessCalendar::parse("UTC").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let w = cal
            .resolve(date, &TimeWindow { start: t(5, 0), end: t(7, 0) })
            .unwrap();
        assert!(w.contains(Utc.with_ymd_and_hms(2026, 2, 8, 5, 0, 0).unwrap()));
        assert!(!w.contains(Utc.with_ymd_and_hms(2026, 2, 8, 7, 0, 0).unwrap()));
    }

    #[test]
    fn dst_gap_is_an_error() {
        let cal = BusinessCalendar::parse("America/New_York").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert!(cal.instant(date, t(2, 30)).is_err());
    }

    #[test]
    fn hours_between_crosses_midnight() {
        let a = Utc.with_ymd_and_hms(2026, 2, 7, 20, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 2, 8, 1, 0, 0).unwrap();
        assert_eq!(hours_between(a, b), 5.0);
    }

    #[test]
    fn time_window_yaml_uses_hh_mm() {
        let w: TimeWindow = serde_yaml::from_str("start: \"09:00\"\nend: \"17:30\"\n").unwrap();
        assert_eq!(w.start, t(9, 0));
        assert_eq!(w.end, t(17, 30));
        let out = serde_yaml::to_string(&w).unwrap();
        assert!(out.contains("09:00"));
    }

    #[test]
    fn unknown_timezone_rejected() {
        assert!(BusinessCalendar::parse("Mars/Olympus").is_err());
    }
}

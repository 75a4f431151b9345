//! Sports schedule lookup.
//!
//! The engine asks for a date's events once per pass. Two sources are
//! shipped: per-date YAML files under `.gameday/schedule/` and an HTTP JSON
//! endpoint (`GET {base_url}/events?date=YYYY-MM-DD`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, ScheduleSource};
use crate::error::{GamedayError, Result};
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            participants: Vec::new(),
        }
    }
}

/// Body of a schedule file or HTTP response.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub events: Vec<Event>,
}

pub trait ScheduleLookup: Send + Sync {
    /// Events whose business date is `date`, ordered by start time.
    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>>;
}

/// Build the lookup named by `config.schedule_source`.
pub fn from_config(root: &Path, config: &Config) -> Result<Box<dyn ScheduleLookup>> {
    Ok(match &config.schedule_source {
        ScheduleSource::File => Box::new(FileSchedule::new(paths::schedule_dir(root))),
        ScheduleSource::Http { base_url } => {
            Box::new(HttpSchedule::new(base_url, config.timeouts.request())?)
        }
    })
}

fn sorted(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
    events
}

// ---------------------------------------------------------------------------
// FileSchedule
// ---------------------------------------------------------------------------

/// One YAML file per business date. A missing file means no events.
pub struct FileSchedule {
    dir: PathBuf,
}

impl FileSchedule {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.yaml", date.format("%Y-%m-%d")))
    }

    /// Replace the schedule for `date`.
    pub fn save(&self, date: NaiveDate, events: Vec<Event>) -> Result<()> {
        let data = serde_yaml::to_string(&DaySchedule {
            events: sorted(events),
        })?;
        crate::io::atomic_write(&self.path(date), data.as_bytes())
    }
}

impl ScheduleLookup for FileSchedule {
    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let path = self.path(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)?;
        let day: DaySchedule = serde_yaml::from_str(&data)
            .map_err(|e| GamedayError::Schedule(format!("{}: {e}", path.display())))?;
        Ok(sorted(day.events))
    }
}

// ---------------------------------------------------------------------------
// HttpSchedule
// ---------------------------------------------------------------------------

pub struct HttpSchedule {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSchedule {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ScheduleLookup for HttpSchedule {
    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        let url = format!("{}/events", self.base_url);
        let day = date.format("%Y-%m-%d").to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("date", day.as_str())])
            .send()
            .map_err(|e| GamedayError::Schedule(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(GamedayError::Schedule(format!(
                "GET {url} returned {status}: {body}"
            )));
        }
        let parsed: DaySchedule = resp
            .json()
            .map_err(|e| GamedayError::Schedule(format!("GET {url}: invalid body: {e}")))?;
        Ok(sorted(parsed.events))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 7).unwrap()
    }

    #[test]
    fn missing_file_means_no_games() {
        let dir = TempDir::new().unwrap();
        let schedule = FileSchedule::new(dir.path());
        assert!(schedule.events_for_date(date()).unwrap().is_empty());
    }

    #[test]
    fn file_schedule_returns_events_in_start_order() {
        let dir = TempDir::new().unwrap();
        let schedule = FileSchedule::new(dir.path());
        let late = Event::new("g2", Utc.with_ymd_and_hms(2026, 2, 8, 3, 0, 0).unwrap());
        let early = Event::new("g1", Utc.with_ymd_and_hms(2026, 2, 8, 0, 0, 0).unwrap());
        schedule.save(date(), vec![late, early]).unwrap();

        let events = schedule.events_for_date(date()).unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2"]);
    }

    #[test]
    fn malformed_file_is_a_schedule_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2026-02-07.yaml"), "events: [oops").unwrap();
        let err = FileSchedule::new(dir.path())
            .events_for_date(date())
            .unwrap_err();
        assert!(matches!(err, GamedayError::Schedule(_)), "{err}");
    }

    #[test]
    fn http_schedule_parses_events() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/events")
            .match_query(mockito::Matcher::UrlEncoded(
                "date".into(),
                "2026-02-07".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"events":[
                    {"id":"g2","start_time":"2026-02-08T03:00:00Z","participants":["LAL","BOS"]},
                    {"id":"g1","start_time":"2026-02-08T00:00:00Z"}
                ]}"#,
            )
            .create();

        let schedule = HttpSchedule::new(&server.url(), Duration::from_secs(5)).unwrap();
        let events = schedule.events_for_date(date()).unwrap();
        mock.assert();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "g1");
        assert_eq!(events[1].participants, vec!["LAL", "BOS"]);
    }

    #[test]
    fn http_error_status_is_a_schedule_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/events")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .with_body("upstream down")
            .create();

        let schedule = HttpSchedule::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = schedule.events_for_date(date()).unwrap_err();
        assert!(err.to_string().contains("503"), "{err}");
    }
}

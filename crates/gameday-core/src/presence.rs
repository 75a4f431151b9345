//! Downstream presence index.
//!
//! Loaders record what has reached storage: one entry per (dataset, event)
//! for per-event completion checks, optionally tagged with the artifact
//! locator it was loaded from so reconciliation can match collection
//! outputs against storage.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GamedayError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub dataset: String,
    pub business_date: NaiveDate,
    /// Usually the event id.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

pub trait PresenceIndex: Send + Sync {
    /// Keys of `dataset` present in storage for business date `date`.
    fn present_keys(&self, dataset: &str, date: NaiveDate) -> Result<BTreeSet<String>>;

    /// Artifact locators loaded at or after `since`.
    fn present_locators(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>>;
}

/// JSON-lines presence index, appended to by `gameday presence mark`.
pub struct FilePresenceIndex {
    path: PathBuf,
}

impl FilePresenceIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn mark(&self, entry: &PresenceEntry) -> Result<()> {
        crate::io::append_json_line(&self.path, entry)
    }

    fn entries(&self) -> Result<Vec<PresenceEntry>> {
        crate::io::read_json_lines(&self.path)
            .map_err(|e| GamedayError::Presence(format!("{}: {e}", self.path.display())))
    }
}

impl PresenceIndex for FilePresenceIndex {
    fn present_keys(&self, dataset: &str, date: NaiveDate) -> Result<BTreeSet<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.dataset == dataset && e.business_date == date)
            .map(|e| e.key)
            .collect())
    }

    fn present_locators(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.loaded_at >= since)
            .filter_map(|e| e.locator)
            .collect())
    }
}

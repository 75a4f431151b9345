//! Row types stored in the execution ledger.
//!
//! Every row is written once and never updated. Queries are expressed as
//! filter structs so both the redb store and test doubles share one
//! matching implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;
use crate::types::ExecutionStatus;

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// One collection attempt, appended by the executor that ran the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub workflow: String,
    pub unit: String,
    pub status: ExecutionStatus,
    /// The date the collected data pertains to, not the date it ran.
    pub business_date: NaiveDate,
    pub triggered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Where the collected artifact landed (object path, file URI, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    /// True when the run was triggered by a reconciliation recovery signal.
    #[serde(default)]
    pub recovery: bool,
    /// Source/environment metadata (host, git sha, trigger source, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ExecutionRecord {
    pub fn new(
        workflow: impl Into<String>,
        unit: impl Into<String>,
        status: ExecutionStatus,
        business_date: NaiveDate,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            workflow: workflow.into(),
            unit: unit.into(),
            status,
            business_date,
            triggered_at,
            completed_at: None,
            artifact_locator: None,
            event_ids: Vec::new(),
            error_type: None,
            error_message: None,
            retry_count: 0,
            recovery: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn completed(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn locator(mut self, locator: impl Into<String>) -> Self {
        self.artifact_locator = Some(locator.into());
        self
    }

    pub fn events(mut self, ids: Vec<String>) -> Self {
        self.event_ids = ids;
        self
    }

    pub fn error(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_type = Some(kind.into());
        self.error_message = Some(message.into());
        self
    }

    /// Completion time if known, otherwise trigger time.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.triggered_at)
    }
}

// ---------------------------------------------------------------------------
// DecisionRecord
// ---------------------------------------------------------------------------

/// Envelope persisted for each decision of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    /// Shared by every decision produced by one `evaluate_all` call.
    pub pass_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub business_date: NaiveDate,
    pub decision: Decision,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A successful collection with no downstream storage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationGap {
    pub source_execution_id: Uuid,
    pub unit: String,
    pub artifact_locator: String,
    pub triggered_at: DateTime<Utc>,
    pub age_minutes: i64,
}

/// Outcome of one reconciliation run, persisted as a ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub run_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub checked: usize,
    pub gaps_found: usize,
    pub recovered: usize,
    #[serde(default)]
    pub gaps: Vec<ReconciliationGap>,
    pub duration_ms: u64,
    pub presence_index_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Filter over execution records. Unset fields match everything.
///
/// `triggered_from` is inclusive and `triggered_to` is exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionQuery {
    pub workflow: Option<String>,
    pub unit: Option<String>,
    pub business_date: Option<NaiveDate>,
    pub status: Option<ExecutionStatus>,
    pub triggered_from: Option<DateTime<Utc>>,
    pub triggered_to: Option<DateTime<Utc>>,
}

impl ExecutionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(mut self, name: impl Into<String>) -> Self {
        self.workflow = Some(name.into());
        self
    }

    pub fn unit(mut self, name: impl Into<String>) -> Self {
        self.unit = Some(name.into());
        self
    }

    pub fn business_date(mut self, date: NaiveDate) -> Self {
        self.business_date = Some(date);
        self
    }

    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn triggered_since(mut self, from: DateTime<Utc>) -> Self {
        self.triggered_from = Some(from);
        self
    }

    pub fn triggered_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.triggered_from = Some(from);
        self.triggered_to = Some(to);
        self
    }

    pub fn matches(&self, r: &ExecutionRecord) -> bool {
        self.workflow.as_ref().map_or(true, |w| *w == r.workflow)
            && self.unit.as_ref().map_or(true, |u| *u == r.unit)
            && self.business_date.map_or(true, |d| d == r.business_date)
            && self.status.map_or(true, |s| s == r.status)
            && self.triggered_from.map_or(true, |t| r.triggered_at >= t)
            && self.triggered_to.map_or(true, |t| r.triggered_at < t)
    }
}

/// Filter over decision records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionQuery {
    pub workflow: Option<String>,
    pub business_date: Option<NaiveDate>,
    pub evaluated_from: Option<DateTime<Utc>>,
    pub evaluated_to: Option<DateTime<Utc>>,
}

impl DecisionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(mut self, name: impl Into<String>) -> Self {
        self.workflow = Some(name.into());
        self
    }

    pub fn business_date(mut self, date: NaiveDate) -> Self {
        self.business_date = Some(date);
        self
    }

    pub fn matches(&self, r: &DecisionRecord) -> bool {
        self.workflow
            .as_ref()
            .map_or(true, |w| *w == r.decision.workflow)
            && self.business_date.map_or(true, |d| d == r.business_date)
            && self.evaluated_from.map_or(true, |t| r.evaluated_at >= t)
            && self.evaluated_to.map_or(true, |t| r.evaluated_at < t)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn query_matches_on_business_date_not_trigger_day() {
        // Ran just after midnight on the 8th, but for the 7th's games.
        let rec = ExecutionRecord::new(
            "post-game",
            "gamebook_pdf",
            ExecutionStatus::Success,
            date(7),
            Utc.with_ymd_and_hms(2026, 2, 8, 0, 15, 0).unwrap(),
        );
        assert!(!ExecutionQuery::new().business_date(date(8)).matches(&rec));
        assert!(ExecutionQuery::new().business_date(date(7)).matches(&rec));
    }

    #[test]
    fn time_bounds_are_half_open() {
        let at = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let rec = ExecutionRecord::new("wf", "u", ExecutionStatus::Failed, date(8), at);
        let hour = chrono::Duration::hours(1);
        assert!(ExecutionQuery::new()
            .triggered_between(at, at + hour)
            .matches(&rec));
        assert!(!ExecutionQuery::new()
            .triggered_between(at - hour, at)
            .matches(&rec));
    }

    #[test]
    fn execution_record_json_omits_empty_fields() {
        let at = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap();
        let rec = ExecutionRecord::new("wf", "u", ExecutionStatus::NoData, date(8), at);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"status\":\"no_data\""));
        assert!(!json.contains("artifact_locator"));
        let parsed: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rec);
    }
}

//! In-memory collaborators shared by the engine and reconciliation tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use crate::error::{GamedayError, Result};
use crate::ledger::{
    DecisionQuery, DecisionRecord, ExecutionQuery, ExecutionRecord, Ledger, RedbLedger,
    ReconciliationSummary,
};
use crate::notify::Notifier;
use crate::presence::{PresenceEntry, PresenceIndex};
use crate::recovery::{RecoveryChannel, RecoverySignal};
use crate::schedule::{Event, ScheduleLookup};

pub(crate) fn tmp_ledger() -> (TempDir, RedbLedger) {
    let dir = TempDir::new().unwrap();
    let ledger = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
    (dir, ledger)
}

// ---------------------------------------------------------------------------
// Ledger with injected failures
// ---------------------------------------------------------------------------

/// Wraps a real ledger and fails selected operations.
pub(crate) struct FaultyLedger<L> {
    pub inner: L,
    /// Execution queries filtered on this workflow fail.
    pub poisoned_workflow: Option<String>,
    /// Execution queries filtered on this unit fail.
    pub poisoned_unit: Option<String>,
    pub fail_appends: bool,
    pub fail_all_queries: bool,
}

impl<L: Ledger> FaultyLedger<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            poisoned_workflow: None,
            poisoned_unit: None,
            fail_appends: false,
            fail_all_queries: false,
        }
    }
}

impl<L: Ledger> Ledger for FaultyLedger<L> {
    fn append_execution(&self, record: &ExecutionRecord) -> Result<()> {
        self.inner.append_execution(record)
    }

    fn append_decisions(&self, records: &[DecisionRecord]) -> Result<()> {
        if self.fail_appends {
            return Err(GamedayError::Ledger("disk full".into()));
        }
        self.inner.append_decisions(records)
    }

    fn append_reconciliation(&self, summary: &ReconciliationSummary) -> Result<()> {
        if self.fail_appends {
            return Err(GamedayError::Ledger("disk full".into()));
        }
        self.inner.append_reconciliation(summary)
    }

    fn executions(&self, query: &ExecutionQuery) -> Result<Vec<ExecutionRecord>> {
        let poisoned = self.fail_all_queries
            || (self.poisoned_workflow.is_some() && query.workflow == self.poisoned_workflow)
            || (self.poisoned_unit.is_some() && query.unit == self.poisoned_unit);
        if poisoned {
            return Err(GamedayError::Ledger("query timed out".into()));
        }
        self.inner.executions(query)
    }

    fn decisions(&self, query: &DecisionQuery) -> Result<Vec<DecisionRecord>> {
        self.inner.decisions(query)
    }

    fn reconciliations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReconciliationSummary>> {
        self.inner.reconciliations(from, to)
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MemSchedule {
    pub days: BTreeMap<NaiveDate, Vec<Event>>,
    pub fail: bool,
    pub lookups: Mutex<usize>,
}

impl MemSchedule {
    pub fn with_day(mut self, date: NaiveDate, events: Vec<Event>) -> Self {
        self.days.insert(date, events);
        self
    }
}

impl ScheduleLookup for MemSchedule {
    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<Event>> {
        *self.lookups.lock().unwrap() += 1;
        if self.fail {
            return Err(GamedayError::Schedule("connection refused".into()));
        }
        Ok(self.days.get(&date).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MemPresence {
    pub entries: Vec<PresenceEntry>,
    pub fail: bool,
}

impl MemPresence {
    pub fn key(mut self, dataset: &str, date: NaiveDate, key: &str) -> Self {
        self.entries.push(PresenceEntry {
            dataset: dataset.into(),
            business_date: date,
            key: key.into(),
            locator: None,
            loaded_at: DateTime::<Utc>::MIN_UTC,
        });
        self
    }

    pub fn locator(mut self, locator: &str, loaded_at: DateTime<Utc>) -> Self {
        self.entries.push(PresenceEntry {
            dataset: "raw".into(),
            business_date: loaded_at.date_naive(),
            key: locator.into(),
            locator: Some(locator.into()),
            loaded_at,
        });
        self
    }
}

impl PresenceIndex for MemPresence {
    fn present_keys(&self, dataset: &str, date: NaiveDate) -> Result<BTreeSet<String>> {
        if self.fail {
            return Err(GamedayError::Presence("warehouse unreachable".into()));
        }
        Ok(self
            .entries
            .iter()
            .filter(|e| e.dataset == dataset && e.business_date == date)
            .map(|e| e.key.clone())
            .collect())
    }

    fn present_locators(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>> {
        if self.fail {
            return Err(GamedayError::Presence("warehouse unreachable".into()));
        }
        Ok(self
            .entries
            .iter()
            .filter(|e| e.loaded_at >= since)
            .filter_map(|e| e.locator.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Notifier / recovery channel
// ---------------------------------------------------------------------------

/// Records `(level, title)` for every alert.
#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn warning(&self, title: &str, _message: &str, _details: &serde_json::Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(("warning".into(), title.into()));
        Ok(())
    }

    fn error(&self, title: &str, _message: &str, _details: &serde_json::Value) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(("error".into(), title.into()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemChannel {
    pub published: Mutex<Vec<RecoverySignal>>,
    /// Publishing a signal for this unit fails.
    pub reject_unit: Option<String>,
}

impl MemChannel {
    pub fn published(&self) -> Vec<RecoverySignal> {
        self.published.lock().unwrap().clone()
    }
}

impl RecoveryChannel for MemChannel {
    fn publish(&self, signal: &RecoverySignal) -> Result<()> {
        if self.reject_unit.as_deref() == Some(signal.unit_name.as_str()) {
            return Err(GamedayError::Recovery("topic unavailable".into()));
        }
        self.published.lock().unwrap().push(signal.clone());
        Ok(())
    }
}

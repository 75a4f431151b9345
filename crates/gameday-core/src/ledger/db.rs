//! Persistent ledger storage using redb.
//!
//! # Table design
//!
//! Primary tables use a time-ordered composite key so a range scan returns
//! rows in chronological order without sorting:
//! ```text
//! executions       [ triggered_at_ms: u64 BE | execution_id: 16 bytes ]
//! decisions        [ evaluated_at_ms: u64 BE | pass_id: 16 bytes | seq: u32 BE ]
//! reconciliations  [ run_at_ms: u64 BE | run_id: 16 bytes ]
//! ```
//!
//! Business-date lookups go through secondary index tables whose key is the
//! primary key prefixed with the date:
//! ```text
//! [ days_from_ce: u32 BE | primary key ]  ->  primary key
//! ```
//! A prefix scan over one date yields that date's rows already in time
//! order. Rows are never updated or removed; every append is a single write
//! transaction covering both the primary row and its index entry.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use redb::{Database, DatabaseError, ReadTransaction, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{GamedayError, Result};

use super::record::{
    DecisionQuery, DecisionRecord, ExecutionQuery, ExecutionRecord, ReconciliationSummary,
};
use super::Ledger;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Every table maps raw key bytes to either JSON rows or primary keys.
type RawTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

const EXECUTIONS: RawTable = TableDefinition::new("executions");
const EXECUTIONS_BY_DATE: RawTable = TableDefinition::new("executions_by_date");
const DECISIONS: RawTable = TableDefinition::new("decisions");
const DECISIONS_BY_DATE: RawTable = TableDefinition::new("decisions_by_date");
const RECONCILIATIONS: RawTable = TableDefinition::new("reconciliations");

/// How long a transaction waits for another process to release the database file.
const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn millis(ts: DateTime<Utc>) -> [u8; 8] {
    (ts.timestamp_millis().max(0) as u64).to_be_bytes()
}

fn day_number(date: NaiveDate) -> [u8; 4] {
    (date.num_days_from_ce().max(0) as u32).to_be_bytes()
}

fn record_key(ts: DateTime<Utc>, id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&millis(ts));
    key.extend_from_slice(id.as_bytes());
    key
}

fn decision_key(ts: DateTime<Utc>, pass_id: Uuid, seq: u32) -> Vec<u8> {
    let mut key = record_key(ts, pass_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn date_index_key(date: NaiveDate, primary: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + primary.len());
    key.extend_from_slice(&day_number(date));
    key.extend_from_slice(primary);
    key
}

/// Key range covering every index entry for `date`.
fn date_range(date: NaiveDate) -> Range<Vec<u8>> {
    let start = day_number(date).to_vec();
    let end = match date.succ_opt() {
        Some(next) => day_number(next).to_vec(),
        None => vec![0xff; 5],
    };
    start..end
}

/// Key range covering primary keys with timestamps in `[from, to)`.
fn time_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Range<Vec<u8>> {
    let start = from.map(|t| millis(t).to_vec()).unwrap_or_default();
    let end = to
        .map(|t| millis(t).to_vec())
        .unwrap_or_else(|| vec![0xff; 9]);
    start..end
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(GamedayError::ledger)
}

// ---------------------------------------------------------------------------
// RedbLedger
// ---------------------------------------------------------------------------

/// Embedded ledger backed by a single redb file.
///
/// redb holds an exclusive file lock for as long as a `Database` is alive.
/// A handle therefore keeps only the path and opens the file for the
/// duration of one transaction, so an evaluation pass and a reconciliation
/// run in separate processes interleave their transactions instead of
/// locking each other out.
pub struct RedbLedger {
    path: PathBuf,
    open_timeout: Duration,
}

impl RedbLedger {
    /// Create the ledger at `path` if needed, waiting up to ten seconds for
    /// a concurrent transaction to release the file on every access.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_OPEN_TIMEOUT)
    }

    /// Create the ledger at `path` if needed. Each later transaction retries
    /// the file lock until `timeout` has elapsed.
    pub fn open_with_timeout(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let ledger = Self {
            path: path.to_path_buf(),
            open_timeout: timeout,
        };

        // Ensure every table exists before any reads
        ledger.write(|wt| {
            for table in [
                EXECUTIONS,
                EXECUTIONS_BY_DATE,
                DECISIONS,
                DECISIONS_BY_DATE,
                RECONCILIATIONS,
            ] {
                wt.open_table(table).map_err(GamedayError::ledger)?;
            }
            Ok(())
        })?;
        Ok(ledger)
    }

    fn connect(&self) -> Result<Database> {
        let started = Instant::now();
        loop {
            match Database::create(&self.path) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen)
                    if started.elapsed() < self.open_timeout =>
                {
                    std::thread::sleep(OPEN_RETRY_DELAY);
                }
                Err(e) => return Err(GamedayError::ledger(e)),
            }
        }
    }

    /// Run `f` inside one write transaction and commit it. The file lock is
    /// released when this returns.
    fn write(&self, f: impl FnOnce(&WriteTransaction) -> Result<()>) -> Result<()> {
        let db = self.connect()?;
        let wt = db.begin_write().map_err(GamedayError::ledger)?;
        f(&wt)?;
        wt.commit().map_err(GamedayError::ledger)
    }

    fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> Result<T>) -> Result<T> {
        let db = self.connect()?;
        let rt = db.begin_read().map_err(GamedayError::ledger)?;
        f(&rt)
    }

    /// Read JSON rows from `primary` in key order, restricted to `range`.
    fn scan_primary<T: DeserializeOwned>(
        &self,
        primary: RawTable,
        range: Range<Vec<u8>>,
    ) -> Result<Vec<T>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        self.read(|rt| {
            let table = rt.open_table(primary).map_err(GamedayError::ledger)?;
            let mut rows = Vec::new();
            for entry in table
                .range(range.start.as_slice()..range.end.as_slice())
                .map_err(GamedayError::ledger)?
            {
                let (_, v) = entry.map_err(GamedayError::ledger)?;
                rows.push(decode(v.value())?);
            }
            Ok(rows)
        })
    }

    /// Resolve one business date's rows through a date index table.
    fn scan_by_date<T: DeserializeOwned>(
        &self,
        primary: RawTable,
        index: RawTable,
        date: NaiveDate,
    ) -> Result<Vec<T>> {
        self.read(|rt| {
            let rows_table = rt.open_table(primary).map_err(GamedayError::ledger)?;
            let index_table = rt.open_table(index).map_err(GamedayError::ledger)?;

            let range = date_range(date);
            let mut rows = Vec::new();
            for entry in index_table
                .range(range.start.as_slice()..range.end.as_slice())
                .map_err(GamedayError::ledger)?
            {
                let (_, primary_key) = entry.map_err(GamedayError::ledger)?;
                let row = rows_table
                    .get(primary_key.value())
                    .map_err(GamedayError::ledger)?
                    .ok_or_else(|| {
                        GamedayError::Ledger("date index points at missing row".into())
                    })?;
                rows.push(decode(row.value())?);
            }
            Ok(rows)
        })
    }
}

impl Ledger for RedbLedger {
    fn append_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let key = record_key(record.triggered_at, record.execution_id);
        let index_key = date_index_key(record.business_date, &key);
        let value = serde_json::to_vec(record)?;

        self.write(|wt| {
            let mut rows = wt.open_table(EXECUTIONS).map_err(GamedayError::ledger)?;
            rows.insert(key.as_slice(), value.as_slice())
                .map_err(GamedayError::ledger)?;
            let mut index = wt
                .open_table(EXECUTIONS_BY_DATE)
                .map_err(GamedayError::ledger)?;
            index
                .insert(index_key.as_slice(), key.as_slice())
                .map_err(GamedayError::ledger)?;
            Ok(())
        })?;
        tracing::debug!(
            workflow = %record.workflow,
            unit = %record.unit,
            status = %record.status,
            "execution recorded"
        );
        Ok(())
    }

    fn append_decisions(&self, records: &[DecisionRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.write(|wt| {
            let mut rows = wt.open_table(DECISIONS).map_err(GamedayError::ledger)?;
            let mut index = wt
                .open_table(DECISIONS_BY_DATE)
                .map_err(GamedayError::ledger)?;
            for (seq, record) in records.iter().enumerate() {
                let key = decision_key(record.evaluated_at, record.pass_id, seq as u32);
                let index_key = date_index_key(record.business_date, &key);
                let value = serde_json::to_vec(record)?;
                rows.insert(key.as_slice(), value.as_slice())
                    .map_err(GamedayError::ledger)?;
                index
                    .insert(index_key.as_slice(), key.as_slice())
                    .map_err(GamedayError::ledger)?;
            }
            Ok(())
        })
    }

    fn append_reconciliation(&self, summary: &ReconciliationSummary) -> Result<()> {
        let key = record_key(summary.run_at, summary.run_id);
        let value = serde_json::to_vec(summary)?;
        self.write(|wt| {
            let mut rows = wt
                .open_table(RECONCILIATIONS)
                .map_err(GamedayError::ledger)?;
            rows.insert(key.as_slice(), value.as_slice())
                .map_err(GamedayError::ledger)?;
            Ok(())
        })
    }

    fn executions(&self, query: &ExecutionQuery) -> Result<Vec<ExecutionRecord>> {
        let rows: Vec<ExecutionRecord> = match query.business_date {
            Some(date) => self.scan_by_date(EXECUTIONS, EXECUTIONS_BY_DATE, date)?,
            None => self.scan_primary(
                EXECUTIONS,
                time_range(query.triggered_from, query.triggered_to),
            )?,
        };
        Ok(rows.into_iter().filter(|r| query.matches(r)).collect())
    }

    fn decisions(&self, query: &DecisionQuery) -> Result<Vec<DecisionRecord>> {
        let rows: Vec<DecisionRecord> = match query.business_date {
            Some(date) => self.scan_by_date(DECISIONS, DECISIONS_BY_DATE, date)?,
            None => self.scan_primary(
                DECISIONS,
                time_range(query.evaluated_from, query.evaluated_to),
            )?,
        };
        Ok(rows.into_iter().filter(|r| query.matches(r)).collect())
    }

    fn reconciliations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReconciliationSummary>> {
        let rows: Vec<ReconciliationSummary> =
            self.scan_primary(RECONCILIATIONS, time_range(from, to))?;
        // Millisecond keys truncate; re-check the exact bounds.
        Ok(rows
            .into_iter()
            .filter(|r| from.map_or(true, |t| r.run_at >= t) && to.map_or(true, |t| r.run_at < t))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionBuilder;
    use crate::types::{Action, ExecutionStatus};
    use chrono::{Duration as CDur, TimeZone};
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbLedger) {
        let dir = TempDir::new().unwrap();
        let db = RedbLedger::open(&dir.path().join("ledger.redb")).unwrap();
        (dir, db)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, d, h, m, 0).unwrap()
    }

    fn exec(
        unit: &str,
        status: ExecutionStatus,
        bd: NaiveDate,
        ts: DateTime<Utc>,
    ) -> ExecutionRecord {
        ExecutionRecord::new("wf", unit, status, bd, ts)
    }

    fn decision_record(pass: Uuid, workflow: &str, ts: DateTime<Utc>) -> DecisionRecord {
        DecisionRecord {
            id: Uuid::new_v4(),
            pass_id: pass,
            evaluated_at: ts,
            business_date: date(8),
            decision: DecisionBuilder::new(Action::Skip, workflow, "test").build(),
        }
    }

    #[test]
    fn executions_come_back_in_trigger_order() {
        let (_dir, db) = open_tmp();
        db.append_execution(&exec("b", ExecutionStatus::Success, date(8), at(8, 12, 0)))
            .unwrap();
        db.append_execution(&exec("a", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap();

        let all = db.executions(&ExecutionQuery::new()).unwrap();
        let units: Vec<_> = all.iter().map(|r| r.unit.as_str()).collect();
        assert_eq!(units, vec!["a", "b"]);
    }

    #[test]
    fn business_date_query_uses_index_not_trigger_time() {
        let (_dir, db) = open_tmp();
        // Triggered after midnight UTC on the 9th, but for the 8th's games.
        db.append_execution(&exec("late", ExecutionStatus::Success, date(8), at(9, 4, 0)))
            .unwrap();
        db.append_execution(&exec("today", ExecutionStatus::Success, date(9), at(9, 5, 0)))
            .unwrap();

        let eighth = db
            .executions(&ExecutionQuery::new().business_date(date(8)))
            .unwrap();
        assert_eq!(eighth.len(), 1);
        assert_eq!(eighth[0].unit, "late");

        let ninth = db
            .executions(&ExecutionQuery::new().business_date(date(9)))
            .unwrap();
        assert_eq!(ninth.len(), 1);
        assert_eq!(ninth[0].unit, "today");
    }

    #[test]
    fn time_window_query_is_half_open() {
        let (_dir, db) = open_tmp();
        db.append_execution(&exec("edge", ExecutionStatus::Success, date(8), at(8, 10, 0)))
            .unwrap();
        db.append_execution(&exec("inside", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap();

        let rows = db
            .executions(&ExecutionQuery::new().triggered_between(at(8, 9, 0), at(8, 10, 0)))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unit, "inside");
    }

    #[test]
    fn latest_execution_filters_by_status() {
        let (_dir, db) = open_tmp();
        db.append_execution(&exec("u", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap();
        db.append_execution(&exec("u", ExecutionStatus::Failed, date(8), at(8, 10, 0)))
            .unwrap();

        let latest = db
            .latest_execution(&ExecutionQuery::new().unit("u"))
            .unwrap()
            .unwrap();
        assert_eq!(latest.status, ExecutionStatus::Failed);

        let ok = db
            .latest_execution(&ExecutionQuery::new().unit("u").status(ExecutionStatus::Success))
            .unwrap()
            .unwrap();
        assert_eq!(ok.triggered_at, at(8, 9, 0));
    }

    #[test]
    fn decision_batch_keeps_pass_order() {
        let (_dir, db) = open_tmp();
        let pass = Uuid::new_v4();
        let now = at(8, 15, 0);
        let batch: Vec<_> = ["zeta", "alpha", "mid"]
            .iter()
            .map(|w| decision_record(pass, w, now))
            .collect();
        db.append_decisions(&batch).unwrap();

        let rows = db
            .decisions(&DecisionQuery::new().business_date(date(8)))
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.decision.workflow.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(rows.iter().all(|r| r.pass_id == pass));
    }

    #[test]
    fn decisions_filter_by_workflow() {
        let (_dir, db) = open_tmp();
        let now = at(8, 15, 0);
        db.append_decisions(&[decision_record(Uuid::new_v4(), "a", now)])
            .unwrap();
        db.append_decisions(&[decision_record(Uuid::new_v4(), "b", now + CDur::hours(1))])
            .unwrap();

        let rows = db.decisions(&DecisionQuery::new().workflow("b")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].decision.workflow, "b");
    }

    #[test]
    fn reconciliations_round_trip_with_bounds() {
        let (_dir, db) = open_tmp();
        for h in [1, 2, 3] {
            db.append_reconciliation(&ReconciliationSummary {
                run_id: Uuid::new_v4(),
                run_at: at(8, h, 0),
                checked: h as usize,
                gaps_found: 0,
                recovered: 0,
                gaps: Vec::new(),
                duration_ms: 5,
                presence_index_available: true,
                error: None,
            })
            .unwrap();
        }
        let rows = db.reconciliations(Some(at(8, 2, 0)), None).unwrap();
        let checked: Vec<_> = rows.iter().map(|r| r.checked).collect();
        assert_eq!(checked, vec![2, 3]);
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        {
            let db = RedbLedger::open(&path).unwrap();
            db.append_execution(&exec("u", ExecutionStatus::Partial, date(8), at(8, 9, 0)))
                .unwrap();
        }
        let db = RedbLedger::open(&path).unwrap();
        assert_eq!(db.executions(&ExecutionQuery::new()).unwrap().len(), 1);
    }

    #[test]
    fn handles_on_one_file_interleave_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        let evaluator = RedbLedger::open(&path).unwrap();
        let reconciler =
            RedbLedger::open_with_timeout(&path, Duration::from_millis(200)).unwrap();

        evaluator
            .append_execution(&exec("a", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap();
        reconciler
            .append_reconciliation(&ReconciliationSummary {
                run_id: Uuid::new_v4(),
                run_at: at(8, 9, 15),
                checked: 1,
                gaps_found: 0,
                recovered: 0,
                gaps: Vec::new(),
                duration_ms: 3,
                presence_index_available: true,
                error: None,
            })
            .unwrap();
        evaluator
            .append_execution(&exec("b", ExecutionStatus::Success, date(8), at(8, 10, 0)))
            .unwrap();

        assert_eq!(reconciler.executions(&ExecutionQuery::new()).unwrap().len(), 2);
        assert_eq!(evaluator.reconciliations(None, None).unwrap().len(), 1);
    }

    #[test]
    fn transaction_waits_for_lock_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        let db = RedbLedger::open(&path).unwrap();

        let held = Database::create(&path).unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            drop(held);
        });
        db.append_execution(&exec("u", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap();
        release.join().unwrap();
        assert_eq!(db.executions(&ExecutionQuery::new()).unwrap().len(), 1);
    }

    #[test]
    fn transaction_times_out_while_file_is_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");
        let db = RedbLedger::open_with_timeout(&path, Duration::from_millis(120)).unwrap();

        let _held = Database::create(&path).unwrap();
        let err = db
            .append_execution(&exec("u", ExecutionStatus::Success, date(8), at(8, 9, 0)))
            .unwrap_err();
        assert!(matches!(err, GamedayError::Ledger(_)));
    }

    #[test]
    fn empty_ledger_queries_return_empty() {
        let (_dir, db) = open_tmp();
        assert!(db.executions(&ExecutionQuery::new()).unwrap().is_empty());
        assert!(db.decisions(&DecisionQuery::new()).unwrap().is_empty());
        assert!(db.reconciliations(None, None).unwrap().is_empty());
        db.append_decisions(&[]).unwrap();
    }
}

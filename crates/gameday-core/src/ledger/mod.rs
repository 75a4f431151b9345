//! Execution ledger: the append-only log that is the only state shared
//! between evaluation passes and reconciliation runs.
//!
//! Provides the row types, the `Ledger` trait both components depend on,
//! and `RedbLedger`, the embedded implementation used by the CLI.

pub mod db;
pub mod record;

pub use db::RedbLedger;
pub use record::{
    DecisionQuery, DecisionRecord, ExecutionQuery, ExecutionRecord, ReconciliationGap,
    ReconciliationSummary,
};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Append + query access to the execution ledger.
///
/// Implementations must never update or delete rows. Query results are in
/// ascending time order (trigger time for executions, evaluation time for
/// decisions, run time for reconciliations).
pub trait Ledger: Send + Sync {
    fn append_execution(&self, record: &ExecutionRecord) -> Result<()>;

    /// Append a whole evaluation pass atomically.
    fn append_decisions(&self, records: &[DecisionRecord]) -> Result<()>;

    fn append_reconciliation(&self, summary: &ReconciliationSummary) -> Result<()>;

    fn executions(&self, query: &ExecutionQuery) -> Result<Vec<ExecutionRecord>>;

    fn decisions(&self, query: &DecisionQuery) -> Result<Vec<DecisionRecord>>;

    fn reconciliations(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReconciliationSummary>>;

    /// Most recent execution matching `query`, by trigger time.
    fn latest_execution(&self, query: &ExecutionQuery) -> Result<Option<ExecutionRecord>> {
        Ok(self.executions(query)?.pop())
    }
}

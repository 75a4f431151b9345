//! Reconciliation between the collection and storage stages.
//!
//! A run looks at recent successful collections that produced an artifact,
//! asks the presence index which artifacts reached storage, and re-emits a
//! recovery signal for every artifact that did not. Each run appends one
//! summary row to the ledger, whatever happened.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::{PresenceFallback, ReconciliationConfig};
use crate::error::Result;
use crate::ledger::{
    ExecutionQuery, ExecutionRecord, Ledger, ReconciliationGap, ReconciliationSummary,
};
use crate::notify::Alerts;
use crate::presence::PresenceIndex;
use crate::recovery::{RecoveryChannel, RecoverySignal};
use crate::types::ExecutionStatus;

pub struct ReconciliationProcessor<'a> {
    settings: ReconciliationConfig,
    ledger: &'a dyn Ledger,
    presence: &'a dyn PresenceIndex,
    channel: &'a dyn RecoveryChannel,
    alerts: &'a Alerts,
}

/// What the presence index told us for this run.
enum Downstream {
    Known(BTreeSet<String>),
    Unavailable(PresenceFallback),
}

impl Downstream {
    fn has(&self, locator: &str) -> bool {
        match self {
            Downstream::Known(set) => set.contains(locator),
            Downstream::Unavailable(PresenceFallback::AssumeMissing) => false,
            Downstream::Unavailable(PresenceFallback::AssumePresent) => true,
        }
    }
}

impl<'a> ReconciliationProcessor<'a> {
    pub fn new(
        settings: &ReconciliationConfig,
        ledger: &'a dyn Ledger,
        presence: &'a dyn PresenceIndex,
        channel: &'a dyn RecoveryChannel,
        alerts: &'a Alerts,
    ) -> Self {
        Self {
            settings: settings.clone(),
            ledger,
            presence,
            channel,
            alerts,
        }
    }

    /// Run one reconciliation pass at `now`.
    ///
    /// Never fails: internal errors are carried in `summary.error`, and the
    /// summary is appended to the ledger in every case.
    pub fn run(&self, now: DateTime<Utc>) -> ReconciliationSummary {
        let started = Instant::now();
        let mut summary = ReconciliationSummary {
            run_id: Uuid::new_v4(),
            run_at: now,
            checked: 0,
            gaps_found: 0,
            recovered: 0,
            gaps: Vec::new(),
            duration_ms: 0,
            presence_index_available: true,
            error: None,
        };

        if let Err(e) = self.reconcile(now, &mut summary) {
            tracing::error!(run_id = %summary.run_id, error = %e, "reconciliation failed");
            summary.error = Some(e.to_string());
        }
        summary.duration_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.ledger.append_reconciliation(&summary) {
            tracing::error!(run_id = %summary.run_id, error = %e, "failed to record reconciliation");
            summary.error.get_or_insert_with(|| e.to_string());
        }

        tracing::info!(
            run_id = %summary.run_id,
            checked = summary.checked,
            gaps = summary.gaps_found,
            recovered = summary.recovered,
            duration_ms = summary.duration_ms,
            "reconciliation complete"
        );
        if summary.gaps_found > self.settings.gap_alert_threshold {
            let units: BTreeSet<&str> = summary.gaps.iter().map(|g| g.unit.as_str()).collect();
            self.alerts.warning(
                "reconciliation gaps",
                &format!(
                    "{} artifacts missing downstream ({} recovered)",
                    summary.gaps_found, summary.recovered
                ),
                &json!({
                    "run_id": summary.run_id,
                    "gaps_found": summary.gaps_found,
                    "recovered": summary.recovered,
                    "threshold": self.settings.gap_alert_threshold,
                    "units": units,
                }),
            );
        }
        summary
    }

    fn reconcile(&self, now: DateTime<Utc>, summary: &mut ReconciliationSummary) -> Result<()> {
        let window_start = now - Duration::hours(i64::from(self.settings.lookback_hours));
        let min_age = Duration::minutes(i64::from(self.settings.min_file_age_minutes));
        let cutoff = now - min_age;
        if cutoff <= window_start {
            return Ok(());
        }

        let records = self.ledger.executions(
            &ExecutionQuery::new()
                .status(ExecutionStatus::Success)
                .triggered_between(window_start, cutoff),
        )?;

        // One candidate per locator; a re-run that rewrote the same artifact
        // supersedes the earlier record.
        let mut by_locator: BTreeMap<&str, &ExecutionRecord> = BTreeMap::new();
        for rec in &records {
            if let Some(locator) = rec.artifact_locator.as_deref().filter(|l| !l.is_empty()) {
                by_locator.insert(locator, rec);
            }
        }
        summary.checked = by_locator.len();
        if by_locator.is_empty() {
            return Ok(());
        }

        let downstream = match self.presence.present_locators(window_start) {
            Ok(set) => Downstream::Known(set),
            Err(e) => {
                let fallback = self.settings.presence_unavailable;
                tracing::warn!(error = %e, ?fallback, "presence index unavailable");
                summary.presence_index_available = false;
                self.alerts.warning(
                    "presence index unavailable",
                    &e.to_string(),
                    &json!({ "fallback": fallback }),
                );
                Downstream::Unavailable(fallback)
            }
        };

        let mut gaps: Vec<ReconciliationGap> = by_locator
            .into_iter()
            .filter(|(locator, _)| !downstream.has(locator))
            .map(|(locator, rec)| ReconciliationGap {
                source_execution_id: rec.execution_id,
                unit: rec.unit.clone(),
                artifact_locator: locator.to_string(),
                triggered_at: rec.triggered_at,
                age_minutes: (now - rec.triggered_at).num_minutes(),
            })
            .collect();
        gaps.sort_by(|a, b| {
            a.triggered_at
                .cmp(&b.triggered_at)
                .then_with(|| a.artifact_locator.cmp(&b.artifact_locator))
        });
        summary.gaps_found = gaps.len();

        let mut failures = Vec::new();
        for gap in &gaps {
            let signal = RecoverySignal::new(
                &gap.unit,
                &gap.artifact_locator,
                gap.source_execution_id,
                format!("no downstream record after {} minutes", gap.age_minutes),
                now,
            );
            match self.channel.publish(&signal) {
                Ok(()) => {
                    tracing::info!(unit = %gap.unit, locator = %gap.artifact_locator, "recovery signal published");
                    summary.recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(unit = %gap.unit, locator = %gap.artifact_locator, error = %e, "recovery publish failed");
                    failures.push(e.to_string());
                }
            }
        }
        summary.gaps = gaps;

        if let Some(first) = failures.first() {
            summary.error = Some(format!(
                "failed to publish {} of {} recovery signals: {first}",
                failures.len(),
                summary.gaps_found
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Schedule-freshness gate.
//!
//! Runs before any date-dependent workflow. When today's schedule has not
//! been refreshed recently the gate closes: it asks for the refresh (or
//! aborts when the refresh itself keeps failing) and every workflow that
//! reads the schedule waits for the next pass.

use chrono::Duration;

use crate::calendar::hours_between;
use crate::config::FreshnessConfig;
use crate::decision::{Decision, DecisionBuilder};
use crate::ledger::ExecutionQuery;
use crate::registry::{Registry, WorkflowConfig};
use crate::types::{Action, AlertLevel, ExecutionStatus};

use super::context::EvalContext;

/// The gate's decision plus whether schedule-dependent workflows may run.
pub(crate) struct GateResult {
    pub decision: Decision,
    pub open: bool,
}

pub(crate) struct FreshnessGate<'a> {
    workflow: &'a str,
    unit: &'a str,
    staleness_hours: u32,
    overridden: bool,
    registered: Option<&'a WorkflowConfig>,
}

impl<'a> FreshnessGate<'a> {
    /// `None` when no refresh workflow/unit is configured.
    pub(crate) fn from_config(
        cfg: &'a FreshnessConfig,
        registry: &'a Registry,
        override_requested: bool,
    ) -> Option<Self> {
        let (workflow, unit) = match (&cfg.workflow, &cfg.unit) {
            (Some(w), Some(u)) => (w.as_str(), u.as_str()),
            _ => return None,
        };
        Some(Self {
            workflow,
            unit,
            staleness_hours: cfg.staleness_hours,
            overridden: cfg.override_enabled || override_requested,
            registered: registry.get(workflow).ok(),
        })
    }

    pub(crate) fn workflow(&self) -> &str {
        self.workflow
    }

    fn builder(&self, action: Action, reason: String) -> DecisionBuilder {
        let builder = match self.registered {
            Some(wf) => DecisionBuilder::for_workflow(action, wf, reason),
            None => {
                let b = DecisionBuilder::new(action, self.workflow, reason);
                if action == Action::Run {
                    b.units(vec![self.unit.to_string()])
                } else {
                    b
                }
            }
        };
        builder
            .context("gate", "schedule_freshness")
            .context("refresh_unit", self.unit)
            .context("staleness_hours", self.staleness_hours)
    }

    pub(crate) fn check(&self, ctx: &EvalContext<'_>) -> GateResult {
        if self.overridden {
            tracing::warn!(workflow = self.workflow, "schedule freshness check overridden");
            return GateResult {
                decision: self
                    .builder(Action::Skip, "freshness check overridden by operator".into())
                    .alert(AlertLevel::Info)
                    .context("override", true)
                    .build(),
                open: true,
            };
        }

        let today = ExecutionQuery::new()
            .unit(self.unit)
            .business_date(ctx.today);

        let last_success = match ctx
            .ledger
            .latest_execution(&today.clone().status(ExecutionStatus::Success))
        {
            Ok(rec) => rec,
            Err(e) => return self.ledger_failure(e.to_string()),
        };

        let staleness = Duration::hours(i64::from(self.staleness_hours));
        if let Some(rec) = &last_success {
            let refreshed = rec.finished_at();
            if ctx.now - refreshed < staleness {
                let age = hours_between(refreshed, ctx.now);
                return GateResult {
                    decision: self
                        .builder(
                            Action::Skip,
                            format!("schedule fresh (refreshed {age:.1}h ago)"),
                        )
                        .next_check(refreshed + staleness)
                        .context("refreshed_at", refreshed)
                        .build(),
                    open: true,
                };
            }
        }

        let latest = match ctx.ledger.latest_execution(&today) {
            Ok(rec) => rec,
            Err(e) => return self.ledger_failure(e.to_string()),
        };

        let decision = match latest {
            Some(rec) if rec.status == ExecutionStatus::Failed => {
                let message = rec
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "no error message recorded".into());
                self.builder(
                    Action::Abort,
                    format!("schedule refresh failing: {message}"),
                )
                .alert(AlertLevel::Critical)
                .context("failed_execution_id", rec.execution_id.to_string())
                .context("error_type", rec.error_type.clone())
                .context("error", message)
                .build()
            }
            _ => {
                let reason = match &last_success {
                    Some(rec) => format!(
                        "schedule stale (refreshed {:.1}h ago, limit {}h)",
                        hours_between(rec.finished_at(), ctx.now),
                        self.staleness_hours
                    ),
                    None => "no schedule refresh recorded today".to_string(),
                };
                self.builder(Action::Run, reason)
                    .alert(AlertLevel::Info)
                    .build()
            }
        };
        GateResult {
            decision,
            open: false,
        }
    }

    /// Can't tell whether the schedule is fresh: refresh it and say so loudly.
    fn ledger_failure(&self, error: String) -> GateResult {
        tracing::error!(workflow = self.workflow, %error, "freshness check could not read ledger");
        GateResult {
            decision: self
                .builder(
                    Action::Run,
                    "schedule freshness unknown: ledger query failed".into(),
                )
                .alert(AlertLevel::Critical)
                .context("error", error)
                .build(),
            open: false,
        }
    }
}

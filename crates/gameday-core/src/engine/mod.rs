//! Decision engine.
//!
//! One call to [`DecisionEngine::evaluate_all`] is one pass: run the
//! schedule-freshness gate, load today's and yesterday's events once,
//! evaluate every enabled workflow, persist the whole batch to the ledger,
//! then raise alerts. Nothing survives between passes except what the
//! ledger holds.

mod context;
mod evaluators;
mod freshness;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::calendar::BusinessCalendar;
use crate::config::{Config, FreshnessConfig};
use crate::decision::{Decision, DecisionBuilder};
use crate::error::{GamedayError, Result};
use crate::ledger::{DecisionRecord, Ledger};
use crate::notify::Alerts;
use crate::presence::PresenceIndex;
use crate::registry::{Registry, WorkflowConfig};
use crate::schedule::ScheduleLookup;
use crate::types::{Action, AlertLevel};

use context::{EvalContext, EventCache};
use freshness::FreshnessGate;

pub struct DecisionEngine<'a> {
    registry: &'a Registry,
    calendar: BusinessCalendar,
    freshness: FreshnessConfig,
    override_freshness: bool,
    ledger: &'a dyn Ledger,
    schedule: &'a dyn ScheduleLookup,
    presence: &'a dyn PresenceIndex,
    alerts: &'a Alerts,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        config: &Config,
        registry: &'a Registry,
        ledger: &'a dyn Ledger,
        schedule: &'a dyn ScheduleLookup,
        presence: &'a dyn PresenceIndex,
        alerts: &'a Alerts,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            calendar: config.calendar()?,
            freshness: config.schedule_freshness.clone(),
            override_freshness: false,
            ledger,
            schedule,
            presence,
            alerts,
        })
    }

    /// Bypass the schedule-freshness gate for this engine's passes.
    pub fn override_freshness(mut self, enabled: bool) -> Self {
        self.override_freshness = enabled;
        self
    }

    /// Evaluate every enabled workflow at `now`.
    ///
    /// Returns the decisions in registry order, preceded by the freshness
    /// gate's decision when the gate is configured. Fails only when the batch
    /// cannot be written to the ledger.
    pub fn evaluate_all(&self, now: DateTime<Utc>) -> Result<Vec<Decision>> {
        let today = self.calendar.business_date(now);
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| GamedayError::InvalidConfig(format!("no day before {today}")))?;

        let gate =
            FreshnessGate::from_config(&self.freshness, self.registry, self.override_freshness);
        let workflows: Vec<&WorkflowConfig> = self
            .registry
            .enabled()
            .filter(|wf| gate.as_ref().map_or(true, |g| g.workflow() != wf.name))
            .collect();

        let events = if workflows.iter().any(|wf| wf.schedule.needs_schedule()) {
            EventCache::load(self.schedule, today, yesterday)
        } else {
            EventCache::not_loaded()
        };
        let ctx = EvalContext {
            now,
            today,
            yesterday,
            calendar: self.calendar,
            ledger: self.ledger,
            presence: self.presence,
            events: &events,
        };

        let mut decisions = Vec::with_capacity(workflows.len() + 1);
        let mut schedule_trusted = true;
        if let Some(gate) = &gate {
            let result = gate.check(&ctx);
            schedule_trusted = result.open;
            decisions.push(result.decision);
        }

        for wf in workflows {
            let decision = if !schedule_trusted && wf.schedule.needs_schedule() {
                DecisionBuilder::for_workflow(
                    Action::Skip,
                    wf,
                    "waiting for schedule refresh",
                )
                .context("gate", "schedule_freshness")
                .build()
            } else {
                evaluate_one(wf, &ctx)
            };
            decisions.push(decision);
        }

        self.persist(&decisions, now, today)?;
        for d in &decisions {
            tracing::info!(
                workflow = %d.workflow,
                action = %d.action,
                alert = %d.alert_level,
                units = d.units.len(),
                targets = d.target_ids.len(),
                "{}",
                d.reason
            );
        }
        self.raise_alerts(&decisions);
        Ok(decisions)
    }

    fn persist(
        &self,
        decisions: &[Decision],
        now: DateTime<Utc>,
        business_date: chrono::NaiveDate,
    ) -> Result<()> {
        let pass_id = Uuid::new_v4();
        let records: Vec<DecisionRecord> = decisions
            .iter()
            .map(|d| DecisionRecord {
                id: Uuid::new_v4(),
                pass_id,
                evaluated_at: now,
                business_date,
                decision: d.clone(),
            })
            .collect();
        self.ledger.append_decisions(&records).map_err(|e| {
            tracing::error!(%pass_id, error = %e, "failed to persist decisions");
            e
        })
    }

    fn raise_alerts(&self, decisions: &[Decision]) {
        for d in decisions {
            let title = format!("{} {}", d.action, d.workflow);
            let details = json!({
                "workflow": d.workflow,
                "action": d.action,
                "alert_level": d.alert_level,
                "target_ids": d.target_ids,
                "context": d.context,
            });
            match d.alert_level {
                AlertLevel::Warning => self.alerts.warning(&title, &d.reason, &details),
                AlertLevel::Critical => self.alerts.error(&title, &d.reason, &details),
                AlertLevel::None | AlertLevel::Info => {}
            }
        }
    }
}

/// Evaluate one workflow, turning any failure into an ABORT.
fn evaluate_one(wf: &WorkflowConfig, ctx: &EvalContext<'_>) -> Decision {
    match evaluators::evaluate(wf, ctx) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(workflow = %wf.name, error = %e, "evaluation failed");
            DecisionBuilder::for_workflow(Action::Abort, wf, format!("evaluation failed: {e}"))
                .alert(AlertLevel::Critical)
                .context("error", e.to_string())
                .build()
        }
    }
}

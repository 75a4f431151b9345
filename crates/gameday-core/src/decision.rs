//! The engine's output type.
//!
//! A `Decision` is built once through [`DecisionBuilder`] and never mutated
//! afterwards. It contains nothing random or wall-clock derived, so two
//! evaluations over the same inputs serialize to identical bytes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::WorkflowConfig;
use crate::types::{Action, AlertLevel, DecisionType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_type: Option<DecisionType>,
    /// Always set, including for SKIP, so operators can see why nothing ran.
    pub reason: String,
    /// Collection units to trigger. Empty unless `action` is RUN.
    #[serde(default)]
    pub units: Vec<String>,
    /// Subset of targets (event ids) still outstanding, sorted.
    #[serde(default)]
    pub target_ids: Vec<String>,
    pub priority: u32,
    pub alert_level: AlertLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_check_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// DecisionBuilder
// ---------------------------------------------------------------------------

pub struct DecisionBuilder {
    decision: Decision,
}

impl DecisionBuilder {
    pub fn new(action: Action, workflow: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision {
                action,
                workflow: workflow.into(),
                decision_type: None,
                reason: reason.into(),
                units: Vec::new(),
                target_ids: Vec::new(),
                priority: 0,
                alert_level: AlertLevel::None,
                next_check_time: None,
                context: BTreeMap::new(),
            },
        }
    }

    /// Start a decision for a registry workflow. RUN decisions carry the
    /// workflow's execution plan units.
    pub fn for_workflow(action: Action, wf: &WorkflowConfig, reason: impl Into<String>) -> Self {
        let mut builder = Self::new(action, wf.name.clone(), reason)
            .priority(wf.priority)
            .decision_type(wf.decision_type())
            .context("plan_mode", wf.plan.mode());
        if action == Action::Run {
            builder = builder.units(wf.units().to_vec());
        }
        builder
    }

    pub fn decision_type(mut self, t: DecisionType) -> Self {
        self.decision.decision_type = Some(t);
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.decision.priority = priority;
        self
    }

    pub fn units(mut self, units: Vec<String>) -> Self {
        self.decision.units = units;
        self
    }

    pub fn targets(mut self, mut ids: Vec<String>) -> Self {
        ids.sort();
        ids.dedup();
        self.decision.target_ids = ids;
        self
    }

    /// Raise the alert level. A lower level never replaces a higher one.
    pub fn alert(mut self, level: AlertLevel) -> Self {
        self.decision.alert_level = self.decision.alert_level.max(level);
        self
    }

    pub fn next_check(mut self, at: DateTime<Utc>) -> Self {
        self.decision.next_check_time = Some(at);
        self
    }

    pub fn context(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.decision.context.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Decision {
        self.decision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

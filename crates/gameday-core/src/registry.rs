//! Workflow registry: the static catalog of collection workflows.
//!
//! Loaded once per invocation from `.gameday/workflows.yaml`. Any malformed
//! entry is a hard error: the caller must not evaluate a partially valid
//! registry.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{hhmm, hhmm_opt, TimeWindow};
use crate::error::{GamedayError, Result};
use crate::paths;
use crate::types::DecisionType;

// ---------------------------------------------------------------------------
// ExecutionPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionPlan {
    /// Units run one after another, in order.
    Sequential { units: Vec<String> },
    /// Units may run concurrently.
    Parallel { units: Vec<String> },
}

impl ExecutionPlan {
    pub fn units(&self) -> &[String] {
        match self {
            Self::Sequential { units } | Self::Parallel { units } => units,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Sequential { .. } => "sequential",
            Self::Parallel { .. } => "parallel",
        }
    }
}

// ---------------------------------------------------------------------------
// CollectionWindow
// ---------------------------------------------------------------------------

/// A fixed local target time with a symmetric tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionWindow {
    #[serde(with = "hhmm")]
    pub target: NaiveTime,
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: u32,
}

fn default_tolerance_minutes() -> u32 {
    30
}

impl CollectionWindow {
    pub fn tolerance(&self) -> Duration {
        Duration::minutes(i64::from(self.tolerance_minutes))
    }
}

// ---------------------------------------------------------------------------
// SchedulePolicy
// ---------------------------------------------------------------------------

/// Per-decision-type schedule policy. The variant *is* the decision type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchedulePolicy {
    SelfAware {
        ideal_window: TimeWindow,
        /// Still run (flagged late) until this local time.
        #[serde(default, with = "hhmm_opt", skip_serializing_if = "Option::is_none")]
        late_until: Option<NaiveTime>,
    },
    GameAware {
        window_before_first_event_hours: u32,
        business_hours: TimeWindow,
        frequency_hours: u32,
    },
    GameAwareYesterday {
        windows: Vec<CollectionWindow>,
        /// Presence-index dataset checked per event.
        dataset: String,
    },
    GameAwareEarly {
        windows: Vec<CollectionWindow>,
        dataset: String,
        /// Only events starting before this local hour are targeted.
        cutoff_hour: u32,
        /// Only events that started at least this long ago are targeted.
        min_minutes_after_start: u32,
    },
    Discovery {
        retry_interval_minutes: u32,
        max_attempts_per_day: u32,
        #[serde(default)]
        require_game_day: bool,
    },
}

impl SchedulePolicy {
    pub fn decision_type(&self) -> DecisionType {
        match self {
            Self::SelfAware { .. } => DecisionType::SelfAware,
            Self::GameAware { .. } => DecisionType::GameAware,
            Self::GameAwareYesterday { .. } => DecisionType::GameAwareYesterday,
            Self::GameAwareEarly { .. } => DecisionType::GameAwareEarly,
            Self::Discovery { .. } => DecisionType::Discovery,
        }
    }

    /// True when evaluation depends on the event schedule, i.e. when a stale
    /// schedule would produce a wrong decision.
    pub fn needs_schedule(&self) -> bool {
        match self {
            Self::SelfAware { .. } => false,
            Self::GameAware { .. }
            | Self::GameAwareYesterday { .. }
            | Self::GameAwareEarly { .. } => true,
            Self::Discovery {
                require_game_day, ..
            } => *require_game_day,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lower numbers are more urgent.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub schedule: SchedulePolicy,
    pub plan: ExecutionPlan,
}

fn default_priority() -> u32 {
    5
}

fn default_enabled() -> bool {
    true
}

impl WorkflowConfig {
    pub fn decision_type(&self) -> DecisionType {
        self.schedule.decision_type()
    }

    pub fn units(&self) -> &[String] {
        self.plan.units()
    }

    fn invalid(&self, reason: impl Into<String>) -> GamedayError {
        GamedayError::InvalidWorkflow {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        paths::validate_name(&self.name).map_err(|_| {
            self.invalid("name must be lowercase alphanumeric with hyphens or underscores")
        })?;

        let units = self.plan.units();
        if units.is_empty() {
            return Err(self.invalid("execution plan has no units"));
        }
        let mut seen = HashSet::new();
        for unit in units {
            paths::validate_name(unit)
                .map_err(|_| self.invalid(format!("invalid unit name '{unit}'")))?;
            if !seen.insert(unit.as_str()) {
                return Err(self.invalid(format!("unit '{unit}' listed twice")));
            }
        }

        match &self.schedule {
            SchedulePolicy::SelfAware {
                ideal_window,
                late_until,
            } => {
                if !ideal_window.is_well_formed() {
                    return Err(self.invalid("ideal_window start must be before end"));
                }
                if let Some(late) = late_until {
                    if *late <= ideal_window.end {
                        return Err(self.invalid("late_until must be after ideal_window end"));
                    }
                }
            }
            SchedulePolicy::GameAware {
                window_before_first_event_hours,
                business_hours,
                frequency_hours,
            } => {
                if !business_hours.is_well_formed() {
                    return Err(self.invalid("business_hours start must be before end"));
                }
                if *frequency_hours == 0 {
                    return Err(self.invalid("frequency_hours must be at least 1"));
                }
                if *window_before_first_event_hours > 48 {
                    return Err(
                        self.invalid("window_before_first_event_hours must be at most 48")
                    );
                }
            }
            SchedulePolicy::GameAwareYesterday { windows, dataset } => {
                self.validate_windows(windows, dataset)?;
            }
            SchedulePolicy::GameAwareEarly {
                windows,
                dataset,
                cutoff_hour,
                ..
            } => {
                self.validate_windows(windows, dataset)?;
                if *cutoff_hour == 0 || *cutoff_hour > 24 {
                    return Err(self.invalid("cutoff_hour must be in 1..=24"));
                }
            }
            SchedulePolicy::Discovery {
                retry_interval_minutes,
                max_attempts_per_day,
                ..
            } => {
                if *retry_interval_minutes == 0 {
                    return Err(self.invalid("retry_interval_minutes must be at least 1"));
                }
                if *max_attempts_per_day == 0 {
                    return Err(self.invalid("max_attempts_per_day must be at least 1"));
                }
            }
        }
        Ok(())
    }

    fn validate_windows(&self, windows: &[CollectionWindow], dataset: &str) -> Result<()> {
        if dataset.trim().is_empty() {
            return Err(self.invalid("dataset must not be empty"));
        }
        if windows.is_empty() {
            return Err(self.invalid("at least one collection window is required"));
        }
        for w in windows {
            if w.tolerance_minutes == 0 || w.tolerance_minutes > 720 {
                return Err(self.invalid("tolerance_minutes must be in 1..=720"));
            }
        }
        if windows.windows(2).any(|pair| pair[0].target >= pair[1].target) {
            return Err(self.invalid("collection windows must be in ascending target order"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    workflows: Vec<WorkflowConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    workflows: Vec<WorkflowConfig>,
}

impl Registry {
    /// Build a registry, rejecting the whole set if any entry is invalid.
    pub fn new(workflows: Vec<WorkflowConfig>) -> Result<Self> {
        let mut names = HashSet::new();
        for wf in &workflows {
            wf.validate()?;
            if !names.insert(wf.name.as_str()) {
                return Err(GamedayError::DuplicateWorkflow(wf.name.clone()));
            }
        }
        Ok(Self { workflows })
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(data)?;
        Self::new(file.workflows)
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::workflows_path(root);
        if !path.exists() {
            return Err(GamedayError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        Self::from_yaml(&data)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let file = RegistryFile {
            workflows: self.workflows.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    pub fn all(&self) -> &[WorkflowConfig] {
        &self.workflows
    }

    pub fn enabled(&self) -> impl Iterator<Item = &WorkflowConfig> {
        self.workflows.iter().filter(|w| w.enabled)
    }

    pub fn get(&self, name: &str) -> Result<&WorkflowConfig> {
        self.workflows
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| GamedayError::WorkflowNotFound(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
workflows:
  - name: morning-operations
    priority: 2
    schedule:
      type: self-aware
      ideal_window: { start: "06:00", end: "10:00" }
      late_until: "14:00"
    plan:
      mode: sequential
      units: [roster_scraper, injury_report]
  - name: betting-lines
    schedule:
      type: game-aware
      window_before_first_event_hours: 6
      business_hours: { start: "08:00", end: "20:00" }
      frequency_hours: 2
    plan:
      mode: parallel
      units: [odds_api_props, odds_api_lines]
  - name: post-game-collection
    schedule:
      type: game-aware-yesterday
      dataset: gamebooks
      windows:
        - { target: "22:00", tolerance_minutes: 30 }
        - { target: "23:30" }
    plan:
      mode: parallel
      units: [gamebook_pdf]
  - name: early-game-collection
    enabled: false
    schedule:
      type: game-aware-early
      dataset: boxscores
      cutoff_hour: 19
      min_minutes_after_start: 180
      windows:
        - { target: "21:00" }
    plan:
      mode: sequential
      units: [boxscore_traditional]
  - name: injury-discovery
    schedule:
      type: discovery
      retry_interval_minutes: 60
      max_attempts_per_day: 12
      require_game_day: true
    plan:
      mode: sequential
      units: [injury_pdf]
"#;

    #[test]
    fn sample_registry_loads() {
        let reg = Registry::from_yaml(SAMPLE).unwrap();
        assert_eq!(reg.all().len(), 5);
        assert_eq!(reg.enabled().count(), 4);

        let morning = reg.get("morning-operations").unwrap();
        assert_eq!(morning.decision_type(), DecisionType::SelfAware);
        assert_eq!(morning.priority, 2);
        assert_eq!(morning.units(), ["roster_scraper", "injury_report"]);

        let post = reg.get("post-game-collection").unwrap();
        match &post.schedule {
            SchedulePolicy::GameAwareYesterday { windows, dataset } => {
                assert_eq!(dataset, "gamebooks");
                assert_eq!(windows.len(), 2);
                assert_eq!(windows[1].tolerance_minutes, 30);
            }
            other => panic!("expected game-aware-yesterday, got {other:?}"),
        }
    }

    #[test]
    fn registry_yaml_round_trips() {
        let reg = Registry::from_yaml(SAMPLE).unwrap();
        let yaml = reg.to_yaml().unwrap();
        assert!(yaml.contains("type: game-aware-yesterday"));
        assert!(yaml.contains("mode: parallel"));
        let again = Registry::from_yaml(&yaml).unwrap();
        assert_eq!(again.all(), reg.all());
    }

    #[test]
    fn needs_schedule_by_variant() {
        let reg = Registry::from_yaml(SAMPLE).unwrap();
        assert!(!reg.get("morning-operations").unwrap().schedule.needs_schedule());
        assert!(reg.get("betting-lines").unwrap().schedule.needs_schedule());
        assert!(reg.get("injury-discovery").unwrap().schedule.needs_schedule());
    }

    #[test]
    fn duplicate_names_rejected() {
        let yaml = r#"
workflows:
  - name: dup
    schedule: { type: discovery, retry_interval_minutes: 5, max_attempts_per_day: 3 }
    plan: { mode: sequential, units: [a] }
  - name: dup
    schedule: { type: discovery, retry_interval_minutes: 5, max_attempts_per_day: 3 }
    plan: { mode: sequential, units: [b] }
"#;
        assert!(matches!(
            Registry::from_yaml(yaml),
            Err(GamedayError::DuplicateWorkflow(name)) if name == "dup"
        ));
    }

    #[test]
    fn inverted_window_rejected() {
        let yaml = r#"
workflows:
  - name: backwards
    schedule:
      type: self-aware
      ideal_window: { start: "10:00", end: "06:00" }
    plan: { mode: sequential, units: [a] }
"#;
        let err = Registry::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("start must be before end"), "{err}");
    }

    #[test]
    fn empty_plan_rejected() {
        let yaml = r#"
workflows:
  - name: nothing-to-do
    schedule: { type: discovery, retry_interval_minutes: 5, max_attempts_per_day: 3 }
    plan: { mode: parallel, units: [] }
"#;
        let err = Registry::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("no units"), "{err}");
    }

    #[test]
    fn zero_max_attempts_rejected() {
        let yaml = r#"
workflows:
  - name: never
    schedule: { type: discovery, retry_interval_minutes: 5, max_attempts_per_day: 0 }
    plan: { mode: sequential, units: [a] }
"#;
        assert!(Registry::from_yaml(yaml).is_err());
    }

    #[test]
    fn unordered_collection_windows_rejected() {
        let yaml = r#"
workflows:
  - name: post-game
    schedule:
      type: game-aware-yesterday
      dataset: gamebooks
      windows: [{ target: "04:00" }, { target: "01:00" }]
    plan: { mode: sequential, units: [a] }
"#;
        let err = Registry::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("ascending"), "{err}");
    }

    #[test]
    fn unknown_decision_type_is_a_parse_error() {
        let yaml = r#"
workflows:
  - name: mystery
    schedule: { type: whenever }
    plan: { mode: sequential, units: [a] }
"#;
        assert!(matches!(
            Registry::from_yaml(yaml),
            Err(GamedayError::Yaml(_))
        ));
    }
}

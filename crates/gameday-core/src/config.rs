use crate::calendar::BusinessCalendar;
use crate::error::{GamedayError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// FreshnessConfig
// ---------------------------------------------------------------------------

/// Schedule-freshness gate settings. The gate is disabled unless both
/// `workflow` and `unit` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: u32,
    #[serde(default)]
    pub override_enabled: bool,
}

fn default_staleness_hours() -> u32 {
    6
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            workflow: None,
            unit: None,
            staleness_hours: default_staleness_hours(),
            override_enabled: false,
        }
    }
}

impl FreshnessConfig {
    pub fn is_enabled(&self) -> bool {
        self.workflow.is_some() && self.unit.is_some()
    }
}

// ---------------------------------------------------------------------------
// ReconciliationConfig
// ---------------------------------------------------------------------------

/// What to assume about downstream storage when the presence index cannot
/// be queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceFallback {
    #[default]
    AssumeMissing,
    AssumePresent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "default_min_file_age_minutes")]
    pub min_file_age_minutes: u32,
    #[serde(default = "default_gap_alert_threshold")]
    pub gap_alert_threshold: usize,
    #[serde(default)]
    pub presence_unavailable: PresenceFallback,
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_min_file_age_minutes() -> u32 {
    30
}

fn default_gap_alert_threshold() -> usize {
    5
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            min_file_age_minutes: default_min_file_age_minutes(),
            gap_alert_threshold: default_gap_alert_threshold(),
            presence_unavailable: PresenceFallback::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleSource / NotificationConfig / TimeoutConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSource {
    /// `.gameday/schedule/<date>.yaml`
    #[default]
    File,
    /// `GET {base_url}/events?date=YYYY-MM-DD`
    Http { base_url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationConfig {
    None,
    #[default]
    Log,
    Webhook { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_request_seconds")]
    pub request_seconds: u64,
}

fn default_request_seconds() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_seconds: default_request_seconds(),
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_seconds)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub schedule_freshness: FreshnessConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub schedule_source: ScheduleSource,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_version() -> u32 {
    1
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timezone: default_timezone(),
            schedule_freshness: FreshnessConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            schedule_source: ScheduleSource::default(),
            notifications: NotificationConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(GamedayError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn calendar(&self) -> Result<BusinessCalendar> {
        BusinessCalendar::parse(&self.timezone)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.calendar().is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("unknown timezone '{}'", self.timezone),
            });
        }

        let fresh = &self.schedule_freshness;
        if fresh.workflow.is_some() != fresh.unit.is_some() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "schedule_freshness needs both 'workflow' and 'unit' (or neither)"
                    .to_string(),
            });
        }
        if fresh.is_enabled() && fresh.staleness_hours == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "schedule_freshness.staleness_hours must be at least 1".to_string(),
            });
        }
        if fresh.override_enabled {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "schedule_freshness.override_enabled is set; game-aware workflows \
                          will run against whatever schedule is on hand"
                    .to_string(),
            });
        }

        let rec = &self.reconciliation;
        if rec.lookback_hours == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "reconciliation.lookback_hours must be at least 1".to_string(),
            });
        }
        if u64::from(rec.min_file_age_minutes) >= u64::from(rec.lookback_hours) * 60 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "reconciliation.min_file_age_minutes={} covers the whole {}h lookback; \
                     no gap can ever be detected",
                    rec.min_file_age_minutes, rec.lookback_hours
                ),
            });
        }
        if rec.presence_unavailable == PresenceFallback::AssumePresent {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "reconciliation.presence_unavailable=assume_present silently skips \
                          recovery while the presence index is down"
                    .to_string(),
            });
        }

        if let ScheduleSource::Http { base_url } = &self.schedule_source {
            if base_url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "schedule_source.base_url is empty".to_string(),
                });
            }
        }
        if let NotificationConfig::Webhook { url } = &self.notifications {
            if url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "notifications.url is empty".to_string(),
                });
            }
        }

        if self.timeouts.request_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "timeouts.request_seconds must be at least 1".to_string(),
            });
        } else if self.timeouts.request_seconds > 120 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "timeouts.request_seconds={} (>120 is unusual for an hourly pass)",
                    self.timeouts.request_seconds
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

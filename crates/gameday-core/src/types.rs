use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GamedayError;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Run,
    Skip,
    Abort,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Run => "RUN",
            Action::Skip => "SKIP",
            Action::Abort => "ABORT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AlertLevel
// ---------------------------------------------------------------------------

/// Severity attached to a decision or reconciliation run.
///
/// Variants are declared in ascending severity so `Ord` gives the escalation
/// order used by [`AlertLevel::max`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    None,
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::None => "NONE",
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DecisionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionType {
    SelfAware,
    GameAware,
    GameAwareYesterday,
    GameAwareEarly,
    Discovery,
}

impl DecisionType {
    pub fn all() -> &'static [DecisionType] {
        &[
            DecisionType::SelfAware,
            DecisionType::GameAware,
            DecisionType::GameAwareYesterday,
            DecisionType::GameAwareEarly,
            DecisionType::Discovery,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionType::SelfAware => "self-aware",
            DecisionType::GameAware => "game-aware",
            DecisionType::GameAwareYesterday => "game-aware-yesterday",
            DecisionType::GameAwareEarly => "game-aware-early",
            DecisionType::Discovery => "discovery",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DecisionType {
    type Err = GamedayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecisionType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GamedayError::UnknownVariant {
                kind: "decision type",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Partial,
    NoData,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Partial => "partial",
            ExecutionStatus::NoData => "no_data",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = GamedayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ExecutionStatus::Success),
            "partial" => Ok(ExecutionStatus::Partial),
            "no_data" | "no-data" => Ok(ExecutionStatus::NoData),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => Err(GamedayError::UnknownVariant {
                kind: "execution status",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Recovery signals re-emitted by reconciliation.
//!
//! Delivery is at-least-once: a gap that persists across runs is published
//! again on the next run, so consumers dedupe by locator.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GamedayError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySignal {
    pub unit_name: String,
    pub locator: String,
    pub original_execution_id: Uuid,
    pub recovery: bool,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl RecoverySignal {
    pub fn new(
        unit_name: impl Into<String>,
        locator: impl Into<String>,
        original_execution_id: Uuid,
        reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            locator: locator.into(),
            original_execution_id,
            recovery: true,
            reason: reason.into(),
            timestamp,
        }
    }
}

pub trait RecoveryChannel: Send + Sync {
    fn publish(&self, signal: &RecoverySignal) -> Result<()>;
}

/// Appends signals to a JSON-lines outbox drained by the loader side.
pub struct OutboxChannel {
    path: PathBuf,
}

impl OutboxChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecoveryChannel for OutboxChannel {
    fn publish(&self, signal: &RecoverySignal) -> Result<()> {
        crate::io::append_json_line(&self.path, signal)
            .map_err(|e| GamedayError::Recovery(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn outbox_lines_carry_recovery_flag() {
        let dir = TempDir::new().unwrap();
        let outbox = OutboxChannel::new(dir.path().join("recovery-outbox.jsonl"));
        let signal = RecoverySignal::new(
            "boxscore_json",
            "s3://raw/2026-02-07/g1.json",
            Uuid::new_v4(),
            "no downstream record after 45 minutes",
            Utc::now(),
        );
        outbox.publish(&signal).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("recovery-outbox.jsonl")).unwrap();
        assert!(raw.contains("\"recovery\":true"));
        let lines: Vec<RecoverySignal> =
            crate::io::read_json_lines(&dir.path().join("recovery-outbox.jsonl")).unwrap();
        assert_eq!(lines, vec![signal]);
    }

    #[test]
    fn unwritable_outbox_is_a_recovery_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("outbox");
        std::fs::create_dir(&path).unwrap();
        let signal = RecoverySignal::new("u", "loc", Uuid::new_v4(), "gap", Utc::now());
        let err = OutboxChannel::new(&path).publish(&signal).unwrap_err();
        assert!(matches!(err, GamedayError::Recovery(_)));
    }
}

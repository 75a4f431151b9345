use crate::error::{GamedayError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GAMEDAY_DIR: &str = ".gameday";
pub const SCHEDULE_DIR: &str = ".gameday/schedule";

pub const CONFIG_FILE: &str = ".gameday/config.yaml";
pub const WORKFLOWS_FILE: &str = ".gameday/workflows.yaml";
pub const LEDGER_FILE: &str = ".gameday/ledger.redb";
pub const PRESENCE_FILE: &str = ".gameday/presence.jsonl";
pub const RECOVERY_OUTBOX_FILE: &str = ".gameday/recovery-outbox.jsonl";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn gameday_dir(root: &Path) -> PathBuf {
    root.join(GAMEDAY_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn workflows_path(root: &Path) -> PathBuf {
    root.join(WORKFLOWS_FILE)
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE)
}

pub fn presence_path(root: &Path) -> PathBuf {
    root.join(PRESENCE_FILE)
}

pub fn recovery_outbox_path(root: &Path) -> PathBuf {
    root.join(RECOVERY_OUTBOX_FILE)
}

pub fn schedule_dir(root: &Path) -> PathBuf {
    root.join(SCHEDULE_DIR)
}

pub fn schedule_file(root: &Path, date: NaiveDate) -> PathBuf {
    schedule_dir(root).join(format!("{}.yaml", date.format("%Y-%m-%d")))
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").expect("static regex compiles")
    })
}

/// Workflow and collection-unit names share one format.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(GamedayError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

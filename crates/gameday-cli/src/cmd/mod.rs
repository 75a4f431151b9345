pub mod config;
pub mod evaluate;
pub mod init;
pub mod ledger;
pub mod presence;
pub mod reconcile;
pub mod schedule;
pub mod workflows;

use anyhow::Context;
use gameday_core::{config::Config, ledger::RedbLedger, notify, notify::Alerts, paths};
use std::path::Path;

pub(crate) fn open_ledger(root: &Path) -> anyhow::Result<RedbLedger> {
    let path = paths::ledger_path(root);
    RedbLedger::open(&path).with_context(|| format!("failed to open ledger {}", path.display()))
}

pub(crate) fn alerts(config: &Config) -> anyhow::Result<Alerts> {
    let notifier = notify::from_config(&config.notifications, config.timeouts.request())
        .context("failed to configure notifications")?;
    Ok(Alerts::new(notifier))
}

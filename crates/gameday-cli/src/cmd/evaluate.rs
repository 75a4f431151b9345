use crate::output::{list_cell, print_json, print_table};
use anyhow::Context;
use chrono::{DateTime, Utc};
use gameday_core::{
    config::Config, paths, presence::FilePresenceIndex, registry::Registry, schedule,
    DecisionEngine,
};
use std::path::Path;

pub fn run(
    root: &Path,
    at: Option<DateTime<Utc>>,
    override_freshness: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = Registry::load(root).context("failed to load workflow registry")?;
    let now = at.unwrap_or_else(Utc::now);

    let ledger = super::open_ledger(root)?;
    let schedule =
        schedule::from_config(root, &config).context("failed to configure schedule lookup")?;
    let presence = FilePresenceIndex::new(paths::presence_path(root));
    let alerts = super::alerts(&config)?;

    let engine = DecisionEngine::new(
        &config,
        &registry,
        &ledger,
        schedule.as_ref(),
        &presence,
        &alerts,
    )?
    .override_freshness(override_freshness);
    let decisions = engine.evaluate_all(now).context("evaluation pass failed")?;

    if json {
        return print_json(&decisions);
    }
    if decisions.is_empty() {
        println!("No enabled workflows.");
        return Ok(());
    }
    let rows = decisions
        .iter()
        .map(|d| {
            vec![
                d.workflow.clone(),
                d.action.to_string(),
                d.alert_level.to_string(),
                list_cell(&d.units),
                list_cell(&d.target_ids),
                d.reason.clone(),
            ]
        })
        .collect();
    print_table(
        &["WORKFLOW", "ACTION", "ALERT", "UNITS", "TARGETS", "REASON"],
        rows,
    );
    Ok(())
}

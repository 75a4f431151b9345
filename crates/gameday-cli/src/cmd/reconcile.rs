use crate::output::print_json;
use anyhow::Context;
use chrono::{DateTime, Utc};
use gameday_core::{
    config::Config, paths, presence::FilePresenceIndex, recovery::OutboxChannel,
    ReconciliationProcessor,
};
use std::path::Path;

pub fn run(root: &Path, at: Option<DateTime<Utc>>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let now = at.unwrap_or_else(Utc::now);

    let ledger = super::open_ledger(root)?;
    let presence = FilePresenceIndex::new(paths::presence_path(root));
    let channel = OutboxChannel::new(paths::recovery_outbox_path(root));
    let alerts = super::alerts(&config)?;

    let summary =
        ReconciliationProcessor::new(&config.reconciliation, &ledger, &presence, &channel, &alerts)
            .run(now);

    if json {
        print_json(&summary)?;
    } else {
        println!("Run:        {}", summary.run_id);
        println!("Checked:    {}", summary.checked);
        println!("Gaps:       {}", summary.gaps_found);
        println!("Recovered:  {}", summary.recovered);
        println!("Duration:   {}ms", summary.duration_ms);
        if !summary.presence_index_available {
            println!("Presence:   unavailable ({:?})", config.reconciliation.presence_unavailable);
        }
        for gap in &summary.gaps {
            println!(
                "  gap: {} {} ({} min old)",
                gap.unit, gap.artifact_locator, gap.age_minutes
            );
        }
    }

    if let Some(err) = &summary.error {
        anyhow::bail!("reconciliation finished with an error: {err}");
    }
    Ok(())
}

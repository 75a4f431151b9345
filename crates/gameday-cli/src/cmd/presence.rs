use crate::output::print_json;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use gameday_core::{
    paths,
    presence::{FilePresenceIndex, PresenceEntry},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum PresenceSubcommand {
    /// Record that a key reached storage (called by loaders)
    Mark {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        business_date: NaiveDate,
        /// Usually the event id
        #[arg(long)]
        key: String,
        /// Artifact the row was loaded from
        #[arg(long)]
        locator: Option<String>,
        /// Load time (RFC 3339, default: now)
        #[arg(long)]
        loaded_at: Option<DateTime<Utc>>,
    },
}

pub fn run(root: &Path, subcmd: PresenceSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PresenceSubcommand::Mark {
            dataset,
            business_date,
            key,
            locator,
            loaded_at,
        } => {
            let entry = PresenceEntry {
                dataset,
                business_date,
                key,
                locator,
                loaded_at: loaded_at.unwrap_or_else(Utc::now),
            };
            FilePresenceIndex::new(paths::presence_path(root))
                .mark(&entry)
                .context("failed to record presence")?;
            if json {
                print_json(&entry)?;
            } else {
                println!(
                    "Marked {} {} for {}",
                    entry.dataset, entry.key, entry.business_date
                );
            }
            Ok(())
        }
    }
}

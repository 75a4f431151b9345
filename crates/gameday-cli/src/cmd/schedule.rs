use crate::output::{list_cell, print_json, print_table};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use gameday_core::{
    config::{Config, ScheduleSource},
    paths,
    schedule::{self, Event, FileSchedule},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ScheduleSubcommand {
    /// Show the events for a business date from the configured source
    Show {
        #[arg(long)]
        date: NaiveDate,
    },

    /// Replace the file-backed schedule for a business date
    Set {
        #[arg(long)]
        date: NaiveDate,
        /// Event as ID=START, START in RFC 3339 (repeatable)
        #[arg(long = "event", value_name = "ID=START")]
        events: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: ScheduleSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ScheduleSubcommand::Show { date } => show(root, &config, date, json),
        ScheduleSubcommand::Set { date, events } => set(root, &config, date, &events),
    }
}

fn show(root: &Path, config: &Config, date: NaiveDate, json: bool) -> anyhow::Result<()> {
    let lookup = schedule::from_config(root, config)?;
    let events = lookup.events_for_date(date)?;

    if json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No events on {date}.");
        return Ok(());
    }
    let rows = events
        .iter()
        .map(|e| {
            vec![
                e.id.clone(),
                e.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                list_cell(&e.participants),
            ]
        })
        .collect();
    print_table(&["EVENT", "START", "PARTICIPANTS"], rows);
    Ok(())
}

fn set(root: &Path, config: &Config, date: NaiveDate, specs: &[String]) -> anyhow::Result<()> {
    if config.schedule_source != ScheduleSource::File {
        anyhow::bail!("schedule_source is not 'file'; edit the remote schedule instead");
    }
    let events = specs
        .iter()
        .map(|s| parse_event(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let count = events.len();
    FileSchedule::new(paths::schedule_dir(root))
        .save(date, events)
        .context("failed to write schedule")?;
    println!("Saved {count} events for {date}.");
    Ok(())
}

fn parse_event(arg: &str) -> anyhow::Result<Event> {
    let (id, start) = arg
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("event '{arg}' must be ID=START"))?;
    let start: DateTime<Utc> = start
        .parse()
        .with_context(|| format!("invalid start time in '{arg}'"))?;
    Ok(Event::new(id.trim(), start))
}

use crate::output::{list_cell, print_json, print_table};
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Subcommand, ValueEnum};
use gameday_core::{
    config::Config,
    ledger::{DecisionQuery, ExecutionQuery, ExecutionRecord, Ledger},
    types::ExecutionStatus,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum LedgerSubcommand {
    /// Append an execution record (called by executors after each unit)
    Record {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        unit: String,
        /// success, partial, no_data, or failed
        #[arg(long)]
        status: ExecutionStatus,
        /// Date the data pertains to (default: today's business date)
        #[arg(long)]
        business_date: Option<NaiveDate>,
        /// When the unit was triggered (RFC 3339, default: now)
        #[arg(long)]
        triggered_at: Option<DateTime<Utc>>,
        /// When the unit finished (RFC 3339, default: now)
        #[arg(long)]
        completed_at: Option<DateTime<Utc>>,
        /// Where the collected artifact landed
        #[arg(long)]
        locator: Option<String>,
        /// Event id covered by this run (repeatable)
        #[arg(long = "event", value_name = "ID")]
        events: Vec<String>,
        #[arg(long)]
        error_type: Option<String>,
        #[arg(long)]
        error_message: Option<String>,
        #[arg(long, default_value_t = 0)]
        retry_count: u32,
        /// The run was triggered by a recovery signal
        #[arg(long)]
        recovery: bool,
    },

    /// List ledger rows
    List {
        #[arg(long, value_enum, default_value_t = Kind::Executions)]
        kind: Kind,
        /// Business date (executions, decisions) or local run date (reconciliations)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Ignored for reconciliations
        #[arg(long)]
        workflow: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Executions,
    Decisions,
    Reconciliations,
}

pub fn run(root: &Path, subcmd: LedgerSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let ledger = super::open_ledger(root)?;
    match subcmd {
        LedgerSubcommand::Record {
            workflow,
            unit,
            status,
            business_date,
            triggered_at,
            completed_at,
            locator,
            events,
            error_type,
            error_message,
            retry_count,
            recovery,
        } => {
            let now = Utc::now();
            let triggered_at = triggered_at.unwrap_or(now);
            let business_date = match business_date {
                Some(d) => d,
                None => config.calendar()?.business_date(triggered_at),
            };
            let mut record =
                ExecutionRecord::new(workflow, unit, status, business_date, triggered_at)
                    .completed(completed_at.unwrap_or(now))
                    .events(events);
            if let Some(l) = locator {
                record = record.locator(l);
            }
            if error_type.is_some() || error_message.is_some() {
                record = record.error(
                    error_type.unwrap_or_else(|| "unknown".to_string()),
                    error_message.unwrap_or_default(),
                );
            }
            record.retry_count = retry_count;
            record.recovery = recovery;
            if let Ok(host) = std::env::var("HOSTNAME") {
                record.metadata.insert("host".to_string(), host);
            }

            ledger
                .append_execution(&record)
                .context("failed to append execution record")?;
            if json {
                print_json(&record)?;
            } else {
                println!(
                    "Recorded {} {} {} ({})",
                    record.workflow, record.unit, record.status, record.execution_id
                );
            }
            Ok(())
        }
        LedgerSubcommand::List {
            kind,
            date,
            workflow,
        } => match kind {
            Kind::Executions => list_executions(&ledger, date, workflow, json),
            Kind::Decisions => list_decisions(&ledger, date, workflow, json),
            Kind::Reconciliations => list_reconciliations(&ledger, &config, date, json),
        },
    }
}

fn list_executions(
    ledger: &dyn Ledger,
    date: Option<NaiveDate>,
    workflow: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut query = ExecutionQuery::new();
    query.business_date = date;
    query.workflow = workflow;
    let records = ledger.executions(&query)?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No executions.");
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.triggered_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                r.business_date.to_string(),
                r.workflow.clone(),
                r.unit.clone(),
                r.status.to_string(),
                r.artifact_locator.clone().unwrap_or_else(|| "-".to_string()),
                r.error_message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["TRIGGERED", "DATE", "WORKFLOW", "UNIT", "STATUS", "LOCATOR", "ERROR"],
        rows,
    );
    Ok(())
}

fn list_decisions(
    ledger: &dyn Ledger,
    date: Option<NaiveDate>,
    workflow: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut query = DecisionQuery::new();
    query.business_date = date;
    query.workflow = workflow;
    let records = ledger.decisions(&query)?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No decisions.");
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|r| {
            let d = &r.decision;
            vec![
                r.evaluated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                d.workflow.clone(),
                d.action.to_string(),
                d.alert_level.to_string(),
                list_cell(&d.units),
                d.reason.clone(),
            ]
        })
        .collect();
    print_table(
        &["EVALUATED", "WORKFLOW", "ACTION", "ALERT", "UNITS", "REASON"],
        rows,
    );
    Ok(())
}

fn list_reconciliations(
    ledger: &dyn Ledger,
    config: &Config,
    date: Option<NaiveDate>,
    json: bool,
) -> anyhow::Result<()> {
    let (from, to) = match date {
        Some(d) => {
            let calendar = config.calendar()?;
            let start = calendar.instant(d, NaiveTime::MIN)?;
            (Some(start), Some(start + Duration::days(1)))
        }
        None => (None, None),
    };
    let summaries = ledger.reconciliations(from, to)?;

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No reconciliation runs.");
        return Ok(());
    }
    let rows = summaries
        .iter()
        .map(|s| {
            vec![
                s.run_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                s.checked.to_string(),
                s.gaps_found.to_string(),
                s.recovered.to_string(),
                s.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["RUN AT", "CHECKED", "GAPS", "RECOVERED", "ERROR"], rows);
    Ok(())
}

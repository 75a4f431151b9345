use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use gameday_core::registry::Registry;
use std::path::Path;

#[derive(Subcommand)]
pub enum WorkflowsSubcommand {
    /// List every registered workflow
    List,
    /// Show one workflow's full definition
    Show { name: String },
}

pub fn run(root: &Path, subcmd: WorkflowsSubcommand, json: bool) -> anyhow::Result<()> {
    let registry = Registry::load(root).context("failed to load workflow registry")?;
    match subcmd {
        WorkflowsSubcommand::List => list(&registry, json),
        WorkflowsSubcommand::Show { name } => {
            let wf = registry.get(&name)?;
            if json {
                print_json(wf)
            } else {
                print!("{}", serde_yaml::to_string(wf)?);
                Ok(())
            }
        }
    }
}

fn list(registry: &Registry, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&registry.all());
    }
    if registry.all().is_empty() {
        println!("No workflows registered.");
        return Ok(());
    }
    let rows = registry
        .all()
        .iter()
        .map(|wf| {
            vec![
                wf.name.clone(),
                wf.decision_type().to_string(),
                wf.priority.to_string(),
                if wf.enabled { "yes" } else { "no" }.to_string(),
                wf.plan.mode().to_string(),
                wf.units().join(","),
            ]
        })
        .collect();
    print_table(
        &["NAME", "TYPE", "PRIORITY", "ENABLED", "PLAN", "UNITS"],
        rows,
    );
    Ok(())
}

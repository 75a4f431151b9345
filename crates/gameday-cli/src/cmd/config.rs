use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use gameday_core::{
    config::{Config, ConfigWarning, WarnLevel},
    registry::Registry,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate config.yaml and workflows.yaml for common mistakes
    Validate,

    /// Print the effective config with defaults filled in
    Show,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::Show => show(root, json),
    }
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut warnings = config.validate();

    match Registry::load(root) {
        Ok(registry) => {
            let fresh = &config.schedule_freshness;
            if let Some(name) = &fresh.workflow {
                if registry.get(name).is_err() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "schedule_freshness.workflow '{name}' is not in the registry; \
                             gate decisions will carry no decision type"
                        ),
                    });
                }
            }
            if registry.enabled().next().is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "no enabled workflows".to_string(),
                });
            }
        }
        Err(e) => warnings.push(ConfigWarning {
            level: WarnLevel::Error,
            message: format!("workflows.yaml: {e}"),
        }),
    }

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        print_json(&config)
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
        Ok(())
    }
}

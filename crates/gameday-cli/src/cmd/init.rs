use anyhow::Context;
use gameday_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing gameday in: {}", root.display());

    for dir in [paths::GAMEDAY_DIR, paths::SCHEDULE_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let created = io::write_if_missing(
        &paths::workflows_path(root),
        EXAMPLE_WORKFLOWS.as_bytes(),
    )
    .context("failed to write workflows.yaml")?;
    if created {
        println!("  created: {}", paths::WORKFLOWS_FILE);
    } else {
        println!("  exists:  {}", paths::WORKFLOWS_FILE);
    }

    println!("\ngameday initialized.");
    println!("Next: edit {} and run `gameday evaluate`", paths::WORKFLOWS_FILE);
    Ok(())
}

const EXAMPLE_WORKFLOWS: &str = r#"# Workflow registry. Times of day are local to the configured timezone.
workflows:
  - name: standings
    description: Daily league standings snapshot
    priority: 3
    schedule:
      type: self-aware
      ideal_window: { start: "09:00", end: "11:00" }
      late_until: "15:00"
    plan: { mode: sequential, units: [standings_json] }

  - name: betting-lines
    description: Lines and props ahead of today's first game
    schedule:
      type: game-aware
      window_before_first_event_hours: 6
      business_hours: { start: "08:00", end: "23:00" }
      frequency_hours: 2
    plan: { mode: parallel, units: [odds_lines, odds_props] }

  - name: post-game
    description: Gamebooks for yesterday's games
    priority: 1
    schedule:
      type: game-aware-yesterday
      dataset: gamebooks
      windows:
        - { target: "00:30", tolerance_minutes: 30 }
        - { target: "04:00", tolerance_minutes: 30 }
        - { target: "08:00", tolerance_minutes: 60 }
    plan: { mode: parallel, units: [gamebook_pdf] }

  - name: early-games
    description: Box scores for afternoon games, before the evening slate
    schedule:
      type: game-aware-early
      dataset: boxscores
      cutoff_hour: 17
      min_minutes_after_start: 180
      windows:
        - { target: "18:00", tolerance_minutes: 60 }
        - { target: "21:00", tolerance_minutes: 60 }
    plan: { mode: sequential, units: [boxscore_traditional, boxscore_advanced] }

  - name: injury-report
    description: Official injury report, published at an unpredictable time
    schedule:
      type: discovery
      retry_interval_minutes: 60
      max_attempts_per_day: 12
      require_game_day: true
    plan: { mode: sequential, units: [injury_pdf] }
"#;

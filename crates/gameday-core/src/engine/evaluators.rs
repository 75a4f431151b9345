//! One evaluator per schedule policy.
//!
//! Each evaluator is a pure function of the workflow config and the pass
//! snapshot. Errors propagate to the caller, which turns them into an ABORT
//! for that workflow only.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveTime, Timelike};

use crate::calendar::{hours_between, TimeWindow, UtcWindow};
use crate::decision::{Decision, DecisionBuilder};
use crate::error::{GamedayError, Result};
use crate::ledger::ExecutionQuery;
use crate::registry::{CollectionWindow, SchedulePolicy, WorkflowConfig};
use crate::schedule::Event;
use crate::types::{Action, AlertLevel, ExecutionStatus};

use super::context::EvalContext;

pub(crate) fn evaluate(wf: &WorkflowConfig, ctx: &EvalContext<'_>) -> Result<Decision> {
    match &wf.schedule {
        SchedulePolicy::SelfAware {
            ideal_window,
            late_until,
        } => self_aware(wf, ideal_window, *late_until, ctx),
        SchedulePolicy::GameAware {
            window_before_first_event_hours,
            business_hours,
            frequency_hours,
        } => game_aware(
            wf,
            *window_before_first_event_hours,
            business_hours,
            *frequency_hours,
            ctx,
        ),
        SchedulePolicy::GameAwareYesterday { windows, dataset } => {
            let events = ctx.events_yesterday()?;
            collection_windows(wf, windows, dataset, events, CollectionScope::Yesterday, ctx)
        }
        SchedulePolicy::GameAwareEarly {
            windows,
            dataset,
            cutoff_hour,
            min_minutes_after_start,
        } => {
            let events = ctx.events_today()?;
            let scope = CollectionScope::Early {
                cutoff_hour: *cutoff_hour,
                min_elapsed: Duration::minutes(i64::from(*min_minutes_after_start)),
            };
            collection_windows(wf, windows, dataset, events, scope, ctx)
        }
        SchedulePolicy::Discovery {
            retry_interval_minutes,
            max_attempts_per_day,
            require_game_day,
        } => discovery(
            wf,
            *retry_interval_minutes,
            *max_attempts_per_day,
            *require_game_day,
            ctx,
        ),
    }
}

fn skip(wf: &WorkflowConfig, reason: impl Into<String>) -> DecisionBuilder {
    DecisionBuilder::for_workflow(Action::Skip, wf, reason)
}

fn run(wf: &WorkflowConfig, reason: impl Into<String>) -> DecisionBuilder {
    DecisionBuilder::for_workflow(Action::Run, wf, reason)
}

/// Latest success of `wf` whose business date is today.
fn success_today(
    wf: &WorkflowConfig,
    ctx: &EvalContext<'_>,
) -> Result<Option<crate::ledger::ExecutionRecord>> {
    ctx.ledger.latest_execution(
        &ExecutionQuery::new()
            .workflow(&wf.name)
            .business_date(ctx.today)
            .status(ExecutionStatus::Success),
    )
}

fn already_succeeded(wf: &WorkflowConfig, ctx: &EvalContext<'_>) -> Result<Option<Decision>> {
    Ok(success_today(wf, ctx)?.map(|rec| {
        skip(wf, "already succeeded today")
            .context("execution_id", rec.execution_id.to_string())
            .context("completed_at", rec.finished_at())
            .build()
    }))
}

// ---------------------------------------------------------------------------
// self-aware
// ---------------------------------------------------------------------------

fn self_aware(
    wf: &WorkflowConfig,
    ideal: &TimeWindow,
    late_until: Option<NaiveTime>,
    ctx: &EvalContext<'_>,
) -> Result<Decision> {
    if let Some(done) = already_succeeded(wf, ctx)? {
        return Ok(done);
    }

    let window = ctx.calendar.resolve(ctx.today, ideal)?;
    if ctx.now < window.start {
        let reason = format!("too early: window opens at {}", ideal.start.format("%H:%M"));
        return Ok(skip(wf, reason).next_check(window.start).build());
    }
    if window.contains(ctx.now) {
        return Ok(run(wf, "inside ideal window").build());
    }

    let grace_end = match late_until {
        Some(t) => Some(ctx.calendar.instant(ctx.today, t)?),
        None => None,
    };
    if let Some(grace_end) = grace_end {
        if ctx.now < grace_end {
            let late = (ctx.now - window.end).num_minutes();
            return Ok(run(wf, format!("late: ideal window closed {late} min ago"))
                .alert(AlertLevel::Warning)
                .context("late_minutes", late)
                .build());
        }
    }

    let tomorrow = ctx
        .today
        .succ_opt()
        .ok_or_else(|| GamedayError::evaluation(&wf.name, "date out of range"))?;
    let next = ctx.calendar.instant(tomorrow, ideal.start)?;
    let reason = format!("too late: window closed at {}", ideal.end.format("%H:%M"));
    Ok(skip(wf, reason).next_check(next).build())
}

// ---------------------------------------------------------------------------
// game-aware
// ---------------------------------------------------------------------------

fn game_aware(
    wf: &WorkflowConfig,
    hours_before_first: u32,
    business_hours: &TimeWindow,
    frequency_hours: u32,
    ctx: &EvalContext<'_>,
) -> Result<Decision> {
    let events = ctx.events_today()?;
    let Some(first) = events.iter().min_by_key(|e| e.start_time) else {
        return Ok(skip(wf, "no events today").build());
    };

    let lead = Duration::hours(i64::from(hours_before_first));
    if first.start_time - ctx.now > lead {
        return Ok(skip(
            wf,
            format!(
                "too early: first event in {:.1}h (window {hours_before_first}h)",
                hours_between(ctx.now, first.start_time)
            ),
        )
        .next_check(first.start_time - lead)
        .context("first_event", &first.id)
        .build());
    }

    let hours = ctx.calendar.resolve(ctx.today, business_hours)?;
    if !hours.contains(ctx.now) {
        let mut decision = skip(wf, "outside business hours");
        if ctx.now < hours.start {
            decision = decision.next_check(hours.start);
        }
        return Ok(decision.build());
    }

    let frequency = Duration::hours(i64::from(frequency_hours));
    let last = ctx
        .ledger
        .latest_execution(
            &ExecutionQuery::new()
                .workflow(&wf.name)
                .triggered_since(ctx.now - frequency),
        )?
        .filter(|last| ctx.now - last.triggered_at < frequency);
    if let Some(last) = last {
        return Ok(skip(
            wf,
            format!(
                "ran {:.1}h ago ({}), frequency {frequency_hours}h",
                hours_between(last.triggered_at, ctx.now),
                last.status
            ),
        )
        .next_check(last.triggered_at + frequency)
        .build());
    }

    Ok(run(wf, format!("{} events today", events.len()))
        .targets(event_ids(events))
        .context("first_event_at", first.start_time)
        .build())
}

// ---------------------------------------------------------------------------
// game-aware-yesterday / game-aware-early
// ---------------------------------------------------------------------------

/// Which events a collection-window workflow is responsible for.
#[derive(Clone, Copy)]
enum CollectionScope {
    Yesterday,
    Early {
        cutoff_hour: u32,
        min_elapsed: Duration,
    },
}

/// Severity for collecting in window `index` of `total`.
fn window_alert(index: usize, total: usize) -> AlertLevel {
    if total > 1 && index == total - 1 {
        AlertLevel::Critical
    } else if index == 0 {
        AlertLevel::None
    } else {
        AlertLevel::Warning
    }
}

fn collection_windows(
    wf: &WorkflowConfig,
    windows: &[CollectionWindow],
    dataset: &str,
    events: &[Event],
    scope: CollectionScope,
    ctx: &EvalContext<'_>,
) -> Result<Decision> {
    let (data_date, label) = match scope {
        CollectionScope::Yesterday => (ctx.yesterday, "yesterday"),
        CollectionScope::Early { .. } => (ctx.today, "today"),
    };
    if events.is_empty() {
        return Ok(skip(wf, format!("no events {label}")).build());
    }

    let resolved = windows
        .iter()
        .map(|w| {
            let target = ctx.calendar.instant(ctx.today, w.target)?;
            Ok(UtcWindow::around(target, w.tolerance()))
        })
        .collect::<Result<Vec<_>>>()?;

    // Overlapping windows resolve to the later, more severe one.
    let Some(active) = resolved.iter().rposition(|w| w.contains(ctx.now)) else {
        let mut decision = skip(wf, "outside collection windows");
        let next = resolved.iter().map(|w| w.start).filter(|s| *s > ctx.now).min();
        if let Some(next) = next {
            decision = decision.next_check(next);
        }
        return Ok(decision.build());
    };

    let candidates: Vec<&Event> = match scope {
        CollectionScope::Yesterday => events.iter().collect(),
        CollectionScope::Early {
            cutoff_hour,
            min_elapsed,
        } => events
            .iter()
            .filter(|e| ctx.calendar.local_time(e.start_time).hour() < cutoff_hour)
            .filter(|e| ctx.now - e.start_time >= min_elapsed)
            .collect(),
    };
    if candidates.is_empty() {
        return Ok(skip(wf, "no eligible early events yet").build());
    }

    let window_label = format!("{}/{}", active + 1, windows.len());
    let mut alert = window_alert(active, windows.len());
    let mut presence_state = "available";
    let present: BTreeSet<String> = match ctx.presence.present_keys(dataset, data_date) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!(workflow = %wf.name, error = %e, "presence index unavailable");
            alert = alert.max(AlertLevel::Warning);
            presence_state = "unavailable";
            BTreeSet::new()
        }
    };

    let missing: Vec<String> = candidates
        .iter()
        .filter(|e| !present.contains(&e.id))
        .map(|e| e.id.clone())
        .collect();

    if missing.is_empty() {
        return Ok(skip(
            wf,
            format!("all {} events collected for {data_date}", candidates.len()),
        )
        .context("window", &window_label)
        .build());
    }

    Ok(run(
        wf,
        format!(
            "{} of {} events missing for {data_date} (window {window_label})",
            missing.len(),
            candidates.len()
        ),
    )
    .targets(missing)
    .alert(alert)
    .context("window", &window_label)
    .context("dataset", dataset)
    .context("presence_index", presence_state)
    .build())
}

// ---------------------------------------------------------------------------
// discovery
// ---------------------------------------------------------------------------

fn discovery(
    wf: &WorkflowConfig,
    retry_interval_minutes: u32,
    max_attempts: u32,
    require_game_day: bool,
    ctx: &EvalContext<'_>,
) -> Result<Decision> {
    if let Some(done) = already_succeeded(wf, ctx)? {
        return Ok(done);
    }
    if require_game_day && ctx.events_today()?.is_empty() {
        return Ok(skip(wf, "not a game day").build());
    }

    let attempts = ctx.ledger.executions(
        &ExecutionQuery::new()
            .workflow(&wf.name)
            .business_date(ctx.today),
    )?;
    let count = attempts.len();
    if count >= max_attempts as usize {
        return Ok(skip(wf, format!("max attempts reached ({count}/{max_attempts})"))
            .alert(AlertLevel::Warning)
            .context("attempts", count)
            .build());
    }

    let retry = Duration::minutes(i64::from(retry_interval_minutes));
    if let Some(last) = attempts.iter().map(|r| r.triggered_at).max() {
        if ctx.now - last < retry {
            return Ok(skip(
                wf,
                format!(
                    "retry interval not elapsed ({} of {retry_interval_minutes} min)",
                    (ctx.now - last).num_minutes()
                ),
            )
            .next_check(last + retry)
            .context("attempts", count)
            .build());
        }
    }

    Ok(run(wf, format!("attempt {} of {max_attempts}", count + 1))
        .context("attempts", count)
        .build())
}

fn event_ids(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_severity_escalates_towards_final_window() {
        assert_eq!(window_alert(0, 1), AlertLevel::None);
        assert_eq!(window_alert(0, 3), AlertLevel::None);
        assert_eq!(window_alert(1, 3), AlertLevel::Warning);
        assert_eq!(window_alert(2, 3), AlertLevel::Critical);
        assert_eq!(window_alert(1, 2), AlertLevel::Critical);
    }
}

//! Delta command - show what the next build would do

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use loom_build::{Builder, Delta, DeltaAction};
use std::path::Path;

pub fn run(root: &Path, json: bool, full: bool) -> Result<()> {
    let config = super::load_config(root)?;
    let plan = Builder::new(config)
        .with_full_scan(full)
        .plan()
        .context("Failed to compute delta")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.delta)?);
        return Ok(());
    }

    print_delta(&plan.delta);
    println!();
    println!("{} events across {} modules", plan.event_count(), plan.delta.len());
    Ok(())
}

/// Print events grouped by module; modules without events are skipped
pub fn print_delta(delta: &Delta) {
    for (module, events) in delta {
        if events.is_empty() {
            continue;
        }
        println!("{}", module.bold());
        for event in events {
            println!("  {} {}", action_label(event.action), event.path);
        }
    }
}

fn action_label(action: DeltaAction) -> ColoredString {
    let label = |name: &str| format!("{name:>8}");
    match action {
        DeltaAction::Added => label("added").green(),
        DeltaAction::Changed => label("changed").yellow(),
        DeltaAction::Removed => label("removed").red(),
        DeltaAction::Missing => label("missing").magenta(),
        DeltaAction::Dirty => label("dirty").cyan(),
    }
}

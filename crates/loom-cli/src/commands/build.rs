//! Build command - snapshot, delta, outputs and manifest

use anyhow::{Context, Result};
use colored::Colorize;
use loom_build::Builder;
use std::path::Path;

pub fn run(root: &Path, json: bool, full: bool) -> Result<()> {
    let config = super::load_config(root)?;
    let manifest_path = config.manifest_path.clone();
    let report = Builder::new(config)
        .with_full_scan(full)
        .build()
        .context("Build failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    super::delta::print_delta(&report.delta);
    if !report.pending.is_empty() {
        println!();
        println!("{}", "Pending compilation:".bold());
        for path in &report.pending {
            println!("  {}", path.display());
        }
    }

    println!();
    println!(
        "{} {} modules, {} copied, {} removed, {} pending ({:.2}s)",
        "Built".green().bold(),
        report.stats.total_modules,
        report.copied.len(),
        report.removed.len(),
        report.pending.len(),
        (report.stats.planning_time + report.stats.output_time).as_secs_f64()
    );
    println!("Manifest: {}", manifest_path.display());
    Ok(())
}

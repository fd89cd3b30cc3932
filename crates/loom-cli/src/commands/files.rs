//! Files command - query the manifest index of the last build

use anyhow::{bail, Context, Result};
use colored::Colorize;
use loom_build::{FindConfig, FolderCategory, ManifestIndex};
use serde_json::json;
use std::path::Path;

pub fn run(root: &Path, json: bool, categories: &[String]) -> Result<()> {
    let config = super::load_config(root)?;
    let index = ManifestIndex::load(&config.manifest_path)
        .with_context(|| format!("No usable manifest at {}", config.manifest_path.display()))?;

    let mut parsed = Vec::with_capacity(categories.len());
    for name in categories {
        match FolderCategory::from_name(name) {
            Some(category) => parsed.push(category),
            None => bail!("Unknown folder category '{name}'"),
        }
    }

    let query = FindConfig::from_config(&config).categories(parsed);
    let files = index.find(&query);

    if json {
        let entries: Vec<_> = files
            .iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "module": f.module,
                    "category": f.category.name(),
                    "source": f.source,
                    "output": f.output,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for file in &files {
        println!("{} {}", file.id.bold(), file.source.display().to_string().dimmed());
    }
    println!();
    if config.profiles.is_empty() {
        println!("{} source files", files.len());
    } else {
        println!(
            "{} source files (profiles: {})",
            files.len(),
            config.profiles.join(", ")
        );
    }
    Ok(())
}

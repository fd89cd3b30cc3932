//! Graph command - print the resolved module graph

use anyhow::{Context, Result};
use colored::Colorize;
use loom_package::{resolve_workspace, GraphNode};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> Result<()> {
    let config = super::load_config(root)?;
    let graph = resolve_workspace(&config.workspace_root).context("Failed to resolve module graph")?;

    if json {
        let nodes: Vec<&GraphNode> = graph.iter().collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    for node in graph.iter() {
        println!("{}", describe(node));
    }
    println!();
    println!("{} modules", graph.len());
    Ok(())
}

fn describe(node: &GraphNode) -> String {
    let mut flags = Vec::new();
    if node.main {
        flags.push("main");
    }
    if node.workspace {
        flags.push("workspace");
    }
    if node.internal {
        flags.push("internal");
    }
    if node.prod {
        flags.push("prod");
    }
    let roles: Vec<&str> = node.roles.iter().map(|r| r.name()).collect();

    let mut line = format!(
        "{}@{} [{}] roles: {}",
        node.name.bold(),
        node.version,
        flags.join(", "),
        roles.join(", ")
    );
    if !node.parents.is_empty() {
        let parents: Vec<&str> = node.parents.iter().map(String::as_str).collect();
        line.push_str(&format!(" <- {}", parents.join(", ")).dimmed().to_string());
    }
    line
}

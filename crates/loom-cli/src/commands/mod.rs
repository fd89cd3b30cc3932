//! CLI commands

pub mod build;
pub mod delta;
pub mod files;
pub mod graph;

use anyhow::{Context, Result};
use loom_config::{Config, ConfigLoader};
use std::path::Path;

/// Load the resolved configuration of the workspace at `root`
pub fn load_config(root: &Path) -> Result<Config> {
    ConfigLoader::new()
        .load(root)
        .with_context(|| format!("Failed to load configuration for {}", root.display()))
}

//! Loom Configuration System
//!
//! Resolves the paths and switches every build step needs before first use:
//! - Project configuration (`loom.toml`, optional)
//! - Environment overrides (`LOOM_*`)
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults (`.loom/...` below the workspace root)
//! 2. Project config (`./loom.toml`)
//! 3. Environment variables (`LOOM_OUTPUT_ROOT`, `LOOM_MANIFEST`, `LOOM_PROFILES`, `LOOM_COMPILER_URL`)
//!
//! # Example
//!
//! ```no_run
//! use loom_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load(Path::new(".")).unwrap();
//! println!("manifest at {}", config.manifest_path.display());
//! ```

pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid workspace root: {0}")]
    InvalidRoot(PathBuf),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use loader::{
    parse_profiles, Config, ConfigLoader, ENV_COMPILER_URL, ENV_MANIFEST, ENV_OUTPUT_ROOT,
    ENV_PROFILES, MANIFEST_FILE,
};
pub use project::{BuildSection, ProfilesSection, ProjectConfig};

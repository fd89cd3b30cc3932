//! Project Configuration (loom.toml)
//!
//! Handles the optional project-level configuration stored in `loom.toml`
//! at the workspace root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default tool folder below the workspace root
pub const DEFAULT_TOOL_FOLDER: &str = ".loom";

/// Project configuration from loom.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Build paths and scan exclusions
    #[serde(default)]
    pub build: BuildSection,

    /// Profile activation
    #[serde(default)]
    pub profiles: ProfilesSection,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildSection {
    /// Tool folder (default: ".loom")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<PathBuf>,

    /// Final output folder (default: "<tool>/out")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Compiler output folder (default: "<tool>/tsc")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_output: Option<PathBuf>,

    /// Type declaration output folder (default: "<tool>/types")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<PathBuf>,

    /// Extra top-level folders skipped while scanning modules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Compiler service URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_url: Option<String>,
}

/// `[profiles]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfilesSection {
    /// Profiles active when no environment override is present
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse project configuration from a TOML string
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|error| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error,
        })
    }

    /// Tool folder relative to the workspace root
    pub fn tool_folder(&self) -> PathBuf {
        self.build
            .tool
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL_FOLDER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProjectConfig::parse("", Path::new("loom.toml")).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.tool_folder(), PathBuf::from(".loom"));
    }

    #[test]
    fn test_parse_build_section() {
        let content = r#"
[build]
tool = ".build"
output = "dist"
compiler-output = ".build/tsc"
exclude = ["coverage", "tmp"]
compiler-url = "http://127.0.0.1:7000"

[profiles]
active = ["postgres"]
"#;
        let config = ProjectConfig::parse(content, Path::new("loom.toml")).unwrap();
        assert_eq!(config.tool_folder(), PathBuf::from(".build"));
        assert_eq!(config.build.output, Some(PathBuf::from("dist")));
        assert_eq!(config.build.exclude, vec!["coverage", "tmp"]);
        assert_eq!(
            config.build.compiler_url.as_deref(),
            Some("http://127.0.0.1:7000")
        );
        assert_eq!(config.profiles.active, vec!["postgres"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = "[build]\nturbo = true\n";
        let result = ProjectConfig::parse(content, Path::new("loom.toml"));
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }
}

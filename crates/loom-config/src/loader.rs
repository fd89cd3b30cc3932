//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::project::ProjectConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overrides the final output folder
pub const ENV_OUTPUT_ROOT: &str = "LOOM_OUTPUT_ROOT";
/// Overrides the manifest file location
pub const ENV_MANIFEST: &str = "LOOM_MANIFEST";
/// Comma-separated list of active profiles
pub const ENV_PROFILES: &str = "LOOM_PROFILES";
/// Overrides the compiler service URL
pub const ENV_COMPILER_URL: &str = "LOOM_COMPILER_URL";

/// Name of the manifest file inside the tool folder
pub const MANIFEST_FILE: &str = "manifest.json";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Defaults - lowest priority
/// 2. Project config (./loom.toml) - overrides defaults
/// 3. Environment variables (LOOM_*) - overrides project
pub struct ConfigLoader {
    /// Name of the project config file
    file_name: String,
}

/// Fully resolved configuration. Every path is absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workspace root (folder holding the root package.json)
    pub workspace_root: PathBuf,
    /// Tool folder (default `<root>/.loom`)
    pub tool_folder: PathBuf,
    /// Final output folder
    pub output_root: PathBuf,
    /// Compiler output folder
    pub compiler_output: PathBuf,
    /// Type declaration output folder
    pub types_output: PathBuf,
    /// Persisted manifest location
    pub manifest_path: PathBuf,
    /// Active profiles
    pub profiles: Vec<String>,
    /// Folders (relative to the workspace root) never scanned
    pub excluded: Vec<PathBuf>,
    /// Compiler service URL
    pub compiler_url: Option<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            file_name: "loom.toml".to_string(),
        }
    }

    /// Load configuration for the workspace rooted at `root`
    pub fn load(&self, root: &Path) -> ConfigResult<Config> {
        if !root.is_dir() {
            return Err(ConfigError::InvalidRoot(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| ConfigError::InvalidRoot(root.to_path_buf()))?;

        let config_path = root.join(&self.file_name);
        let project = if config_path.exists() {
            debug!(path = %config_path.display(), "loading project config");
            ProjectConfig::load_from_file(&config_path)?
        } else {
            ProjectConfig::default()
        };

        let config = Config::resolve(&root, &project);
        self.apply_env_overrides(config)
    }

    /// Apply environment variable overrides to a resolved config
    fn apply_env_overrides(&self, mut config: Config) -> ConfigResult<Config> {
        if let Ok(output) = env::var(ENV_OUTPUT_ROOT) {
            if output.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: ENV_OUTPUT_ROOT.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            config.output_root = absolutize(&config.workspace_root, Path::new(&output));
            if let Ok(rel) = config.output_root.strip_prefix(&config.workspace_root) {
                push_unique(&mut config.excluded, rel.to_path_buf());
            }
        }

        if let Ok(manifest) = env::var(ENV_MANIFEST) {
            config.manifest_path = absolutize(&config.workspace_root, Path::new(&manifest));
        }

        if let Ok(profiles) = env::var(ENV_PROFILES) {
            config.profiles = parse_profiles(&profiles);
        }

        if let Ok(url) = env::var(ENV_COMPILER_URL) {
            config.compiler_url = Some(url);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Resolve a project config against a workspace root, without consulting the environment
    pub fn resolve(root: &Path, project: &ProjectConfig) -> Self {
        let tool_rel = project.tool_folder();
        let tool_folder = absolutize(root, &tool_rel);
        let output_root = project
            .build
            .output
            .as_deref()
            .map(|p| absolutize(root, p))
            .unwrap_or_else(|| tool_folder.join("out"));
        let compiler_output = project
            .build
            .compiler_output
            .as_deref()
            .map(|p| absolutize(root, p))
            .unwrap_or_else(|| tool_folder.join("tsc"));
        let types_output = project
            .build
            .types
            .as_deref()
            .map(|p| absolutize(root, p))
            .unwrap_or_else(|| tool_folder.join("types"));

        let mut excluded = Vec::new();
        for folder in [&tool_folder, &output_root, &compiler_output, &types_output] {
            if let Ok(rel) = folder.strip_prefix(root) {
                push_unique(&mut excluded, rel.to_path_buf());
            }
        }
        for extra in &project.build.exclude {
            push_unique(&mut excluded, PathBuf::from(extra));
        }

        Self {
            workspace_root: root.to_path_buf(),
            manifest_path: tool_folder.join(MANIFEST_FILE),
            tool_folder,
            output_root,
            compiler_output,
            types_output,
            profiles: project.profiles.active.clone(),
            excluded,
            compiler_url: project.build.compiler_url.clone(),
        }
    }

    /// Name of the tool folder, used to locate per-module manifests
    pub fn tool_folder_name(&self) -> PathBuf {
        self.tool_folder
            .strip_prefix(&self.workspace_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(crate::project::DEFAULT_TOOL_FOLDER))
    }

    /// Whether a profile is active
    pub fn is_profile_active(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }
}

/// Split a comma-separated profile list, dropping blanks and duplicates
pub fn parse_profiles(raw: &str) -> Vec<String> {
    let mut profiles = Vec::new();
    for profile in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !profiles.iter().any(|p: &String| p == profile) {
            profiles.push(profile.to_string());
        }
    }
    profiles
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    if !path.as_os_str().is_empty() && !list.contains(&path) {
        list.push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_env() {
        env::remove_var(ENV_OUTPUT_ROOT);
        env::remove_var(ENV_MANIFEST);
        env::remove_var(ENV_PROFILES);
        env::remove_var(ENV_COMPILER_URL);
    }

    #[test]
    #[serial]
    fn test_defaults_without_project_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::new().load(temp_dir.path()).unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        assert_eq!(config.workspace_root, root);
        assert_eq!(config.tool_folder, root.join(".loom"));
        assert_eq!(config.output_root, root.join(".loom/out"));
        assert_eq!(config.manifest_path, root.join(".loom/manifest.json"));
        assert_eq!(
            config.excluded,
            vec![
                PathBuf::from(".loom"),
                PathBuf::from(".loom/out"),
                PathBuf::from(".loom/tsc"),
                PathBuf::from(".loom/types"),
            ]
        );
        assert!(config.profiles.is_empty());
    }

    #[test]
    #[serial]
    fn test_project_file_paths() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("loom.toml"),
            "[build]\noutput = \"dist\"\nexclude = [\"coverage\"]\n[profiles]\nactive = [\"dev\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new().load(temp_dir.path()).unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        assert_eq!(config.output_root, root.join("dist"));
        assert!(config.excluded.contains(&PathBuf::from("dist")));
        assert!(config.excluded.contains(&PathBuf::from("coverage")));
        assert!(config.is_profile_active("dev"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        env::set_var(ENV_OUTPUT_ROOT, "build/out");
        env::set_var(ENV_MANIFEST, "/tmp/loom-manifest.json");
        env::set_var(ENV_PROFILES, "postgres, redis,,postgres");

        let config = ConfigLoader::new().load(temp_dir.path()).unwrap();
        clear_env();

        let root = temp_dir.path().canonicalize().unwrap();
        assert_eq!(config.output_root, root.join("build/out"));
        assert!(config.excluded.contains(&PathBuf::from("build/out")));
        assert_eq!(config.manifest_path, PathBuf::from("/tmp/loom-manifest.json"));
        assert_eq!(config.profiles, vec!["postgres", "redis"]);
    }

    #[test]
    #[serial]
    fn test_empty_output_override_rejected() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        env::set_var(ENV_OUTPUT_ROOT, "  ");
        let result = ConfigLoader::new().load(temp_dir.path());
        clear_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_root_rejected() {
        let result = ConfigLoader::new().load(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(ConfigError::InvalidRoot(_))));
    }

    #[rstest]
    #[case("", vec![])]
    #[case("a", vec!["a"])]
    #[case(" a , b ", vec!["a", "b"])]
    #[case("a,a,b", vec!["a", "b"])]
    fn test_parse_profiles(#[case] raw: &str, #[case] expected: Vec<&str>) {
        assert_eq!(parse_profiles(raw), expected);
    }
}

//! Monorepo member discovery and package-manager detection

use crate::descriptor::PackageDescriptor;
use crate::{PackageError, PackageResult, DESCRIPTOR_FILE};
use serde::{Deserialize, Serialize};
use glob::{glob_with, MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Package manager driving the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManager {
    /// Detect the package manager from lock files in the workspace root
    pub fn detect(root: &Path) -> Self {
        if root.join("pnpm-lock.yaml").exists() {
            Self::Pnpm
        } else if root.join("yarn.lock").exists() {
            Self::Yarn
        } else if root.join("bun.lockb").exists() || root.join("bun.lock").exists() {
            Self::Bun
        } else {
            Self::Npm
        }
    }
}

/// Workspace-local packages keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceMembers {
    members: BTreeMap<String, PathBuf>,
}

impl WorkspaceMembers {
    /// Expand the root descriptor's workspace patterns.
    ///
    /// Patterns are globs relative to the root (`packages/*`, `apps/*-web`,
    /// `libs/**`); a leading `!` excludes matching folders. Folders without a
    /// descriptor, hidden folders and anything under `node_modules` are ignored.
    pub fn discover(root: &Path, root_descriptor: &PackageDescriptor) -> PackageResult<Self> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pattern in root_descriptor.workspace_patterns() {
            match pattern.strip_prefix('!') {
                Some(negated) => excludes.push(compile_pattern(pattern, negated)?),
                None => includes.push(pattern.as_str()),
            }
        }

        let mut members = BTreeMap::new();
        for pattern in includes {
            for dir in expand_pattern(root, pattern)? {
                let Ok(relative) = dir.strip_prefix(root) else {
                    continue;
                };
                if excludes.iter().any(|p| p.matches_path_with(relative, match_options())) {
                    debug!(member = %relative.display(), "Excluded workspace folder");
                    continue;
                }
                if !dir.join(DESCRIPTOR_FILE).is_file() {
                    continue;
                }
                let descriptor = PackageDescriptor::load(&dir)?;
                let name = descriptor.name_or(&dir);
                members.entry(name).or_insert(dir);
            }
        }

        Ok(Self { members })
    }

    /// Folder of a member package
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.members.get(name).map(PathBuf::as_path)
    }

    /// Whether `dir` is one of the member folders
    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.members.values().any(|d| d == dir)
    }

    /// Whether the workspace declares any members
    pub fn is_monorepo(&self) -> bool {
        !self.members.is_empty()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.members.iter().map(|(n, d)| (n.as_str(), d.as_path()))
    }
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

fn normalize(pattern: &str) -> PackageResult<&str> {
    let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
    let escapes = Path::new(trimmed)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if trimmed.is_empty() || escapes {
        return Err(PackageError::InvalidWorkspacePattern(pattern.to_string()));
    }
    Ok(trimmed)
}

fn compile_pattern(original: &str, pattern: &str) -> PackageResult<Pattern> {
    let trimmed = normalize(pattern)
        .map_err(|_| PackageError::InvalidWorkspacePattern(original.to_string()))?;
    Pattern::new(trimmed).map_err(|_| PackageError::InvalidWorkspacePattern(original.to_string()))
}

/// Folders matched by one workspace pattern, sorted
fn expand_pattern(root: &Path, pattern: &str) -> PackageResult<Vec<PathBuf>> {
    let trimmed = normalize(pattern)?;
    let root_text = root
        .to_str()
        .ok_or_else(|| PackageError::InvalidWorkspacePattern(pattern.to_string()))?;
    let full = format!("{}/{}", Pattern::escape(root_text), trimmed);
    let paths = glob_with(&full, match_options())
        .map_err(|_| PackageError::InvalidWorkspacePattern(pattern.to_string()))?;

    let mut dirs = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PackageError::io(path, e.into_error())
        })?;
        if !path.is_dir() {
            continue;
        }
        let skipped = path
            .strip_prefix(root)
            .map(|rel| {
                rel.components().any(|c| {
                    let name = c.as_os_str().to_string_lossy();
                    name == "node_modules" || name.starts_with('.')
                })
            })
            .unwrap_or(true);
        if !skipped {
            dirs.push(path);
        }
    }
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn write_package(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), format!(r#"{{"name":"{name}"}}"#)).unwrap();
    }

    #[test]
    fn test_discover_wildcard_and_exact_members() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_package(&root.join("packages/core"), "@shop/core");
        write_package(&root.join("packages/web"), "@shop/web");
        write_package(&root.join("tools/cli"), "@shop/cli");
        fs::create_dir_all(root.join("packages/notes")).unwrap();

        let root_desc = PackageDescriptor::parse(
            r#"{"name":"shop","workspaces":["packages/*","tools/cli"]}"#,
            Path::new("package.json"),
        )
        .unwrap();
        let members = WorkspaceMembers::discover(root, &root_desc).unwrap();

        assert_eq!(members.len(), 3);
        assert!(members.is_monorepo());
        assert_eq!(members.get("@shop/core"), Some(root.join("packages/core").as_path()));
        assert!(members.contains_dir(&root.join("tools/cli")));
        let names: Vec<_> = members.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["@shop/cli", "@shop/core", "@shop/web"]);
    }

    #[test]
    fn test_discover_recursive_and_named_globs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_package(&root.join("apps/shop-web"), "shop-web");
        write_package(&root.join("apps/admin-web"), "admin-web");
        write_package(&root.join("apps/worker"), "worker");
        write_package(&root.join("libs/data/orm"), "orm");
        write_package(&root.join("libs/data/orm/node_modules/left-pad"), "left-pad");
        write_package(&root.join("libs/.cache/stale"), "stale");

        let root_desc = PackageDescriptor::parse(
            r#"{"name":"shop","workspaces":["apps/*-web","libs/**"]}"#,
            Path::new("package.json"),
        )
        .unwrap();
        let members = WorkspaceMembers::discover(root, &root_desc).unwrap();

        let names: Vec<_> = members.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["admin-web", "orm", "shop-web"]);
    }

    #[test]
    fn test_negated_pattern_excludes_members() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_package(&root.join("packages/core"), "core");
        write_package(&root.join("packages/legacy"), "legacy");

        let root_desc = PackageDescriptor::parse(
            r#"{"name":"shop","workspaces":["packages/*","!packages/legacy"]}"#,
            Path::new("package.json"),
        )
        .unwrap();
        let members = WorkspaceMembers::discover(root, &root_desc).unwrap();

        assert_eq!(members.len(), 1);
        assert!(members.get("legacy").is_none());
    }

    #[test]
    fn test_no_workspaces_is_not_monorepo() {
        let temp = TempDir::new().unwrap();
        let members = WorkspaceMembers::discover(temp.path(), &PackageDescriptor::default()).unwrap();
        assert!(!members.is_monorepo());
    }

    #[rstest]
    #[case("../escape")]
    #[case("/abs/*")]
    #[case("packages/../../up")]
    #[case("packages/***")]
    fn test_invalid_patterns(#[case] pattern: &str) {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            expand_pattern(temp.path(), pattern),
            Err(PackageError::InvalidWorkspacePattern(_))
        ));
    }

    #[rstest]
    #[case("pnpm-lock.yaml", PackageManager::Pnpm)]
    #[case("yarn.lock", PackageManager::Yarn)]
    #[case("bun.lockb", PackageManager::Bun)]
    #[case("package-lock.json", PackageManager::Npm)]
    fn test_detect_package_manager(#[case] lock_file: &str, #[case] expected: PackageManager) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(lock_file), "").unwrap();
        assert_eq!(PackageManager::detect(temp.path()), expected);
    }
}

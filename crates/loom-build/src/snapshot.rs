//! Manifest snapshot construction
//!
//! Turns a completed [`ModuleGraph`] into a [`ManifestRoot`] by scanning
//! every module folder and classifying its files.

use crate::error::{BuildError, BuildResult};
use crate::manifest::{
    module_output, BuildPaths, FileEntry, MainModule, ManifestModule, ManifestRoot, WorkspaceInfo,
    MANIFEST_VERSION,
};
use crate::session::BuildSession;
use loom_config::Config;
use loom_package::{GraphNode, ModuleGraph, PackageManager};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Builds manifest snapshots from a module graph
pub struct SnapshotBuilder<'a> {
    config: &'a Config,
    session: &'a mut BuildSession,
    full: bool,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(config: &'a Config, session: &'a mut BuildSession) -> Self {
        Self {
            config,
            session,
            full: false,
        }
    }

    /// Scan every folder of every module, not only sources
    pub fn full_scan(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Produce a fresh manifest for the graph
    pub fn build(&mut self, graph: &ModuleGraph) -> BuildResult<ManifestRoot> {
        let main = graph
            .get(graph.root())
            .ok_or_else(|| BuildError::module_not_found(graph.root()))?;

        let mut modules = BTreeMap::new();
        for node in graph.iter() {
            let module = self.module_for(node)?;
            debug!(module = %module.name, files = module.file_count(), "snapshot module");
            modules.insert(module.name.clone(), module);
        }

        let monorepo = graph.iter().any(|n| n.workspace && !n.main);
        info!(modules = modules.len(), "manifest snapshot built");

        Ok(ManifestRoot {
            version: MANIFEST_VERSION,
            workspace: WorkspaceInfo {
                path: self.config.workspace_root.clone(),
                name: main.name.clone(),
                monorepo,
                package_manager: PackageManager::detect(&self.config.workspace_root),
            },
            paths: BuildPaths {
                compiler_output: self.config.compiler_output.clone(),
                output: self.config.output_root.clone(),
                tool: self.config.tool_folder_name(),
                types: self.config.types_output.clone(),
                compiler_service_url: self.config.compiler_url.clone(),
            },
            main: MainModule {
                name: main.name.clone(),
                version: main.version.clone(),
                source: main.dir.clone(),
            },
            generated: now_millis(),
            modules,
        })
    }

    fn module_for(&mut self, node: &GraphNode) -> BuildResult<ManifestModule> {
        let full = self.full || node.main;
        let excluded: &[_] = if node.main { &self.config.excluded } else { &[] };
        let scanned = self.session.scan(&node.name, &node.dir, full, excluded)?;

        let mut files: BTreeMap<_, Vec<FileEntry>> = BTreeMap::new();
        for file in scanned {
            let mut entry = FileEntry::new(file.path.clone(), file.file_type, file.updated);
            entry.role = file.role;
            entry.profiles = file_profiles(node, &file.path);
            files.entry(file.category).or_default().push(entry);
        }

        Ok(ManifestModule {
            name: node.name.clone(),
            version: node.version.clone(),
            source: node.dir.clone(),
            output: module_output(&self.config.output_root, &node.name),
            main: node.main,
            workspace: node.workspace,
            internal: node.internal,
            prod: node.prod,
            roles: node.roles.clone(),
            parents: node.parents.clone(),
            profiles: node.profiles.clone(),
            files,
        })
    }
}

/// Profiles of every `fileProfiles` prefix matching the path
fn file_profiles(node: &GraphNode, path: &str) -> Vec<String> {
    let mut profiles: Vec<String> = Vec::new();
    for (prefix, list) in &node.file_profiles {
        let prefix = prefix.trim_start_matches("./");
        let matches = path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/') || prefix.ends_with('/'));
        if matches {
            for profile in list {
                if !profiles.contains(profile) {
                    profiles.push(profile.clone());
                }
            }
        }
    }
    profiles
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_profiles_match_prefixes() {
        let mut node = GraphNode::new("db", "/db");
        node.file_profiles.insert("src/pg".into(), vec!["postgres".into()]);
        node.file_profiles.insert("src/".into(), vec!["sql".into()]);
        node.file_profiles.insert("src/mysql.ts".into(), vec!["mysql".into()]);

        assert_eq!(file_profiles(&node, "src/pg/pool.ts"), vec!["sql", "postgres"]);
        assert_eq!(file_profiles(&node, "src/mysql.ts"), vec!["sql", "mysql"]);
        assert_eq!(file_profiles(&node, "src/pgx.ts"), vec!["sql"]);
        assert!(file_profiles(&node, "index.ts").is_empty());
    }
}

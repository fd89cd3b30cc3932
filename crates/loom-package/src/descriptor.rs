//! Package descriptor parsing and types (package.json)

use crate::role::Role;
use crate::{PackageError, PackageResult, DESCRIPTOR_FILE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Package descriptor (package.json)
///
/// Only the fields the build backbone reads are modeled; everything else in
/// the file is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Workspaces>,
    /// Framework-specific metadata; its presence makes a package part of the graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loom: Option<LoomMetadata>,
}

/// Monorepo member declaration, either a bare list or `{ "packages": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Detailed {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    /// Member patterns
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::List(patterns) => patterns,
            Workspaces::Detailed { packages } => packages,
        }
    }
}

/// The `loom` key of a package descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoomMetadata {
    /// Roles the package declares for itself
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    /// Whether roles of dependents flow into this package
    #[serde(default = "default_true")]
    pub inherit_roles: bool,
    /// Marks a boundary where role inheritance starts
    #[serde(default)]
    pub role_root: bool,
    /// Part of the framework toolchain itself
    #[serde(default)]
    pub internal: bool,
    /// Profiles gating the whole module
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Profiles gating files, keyed by relative path prefix
    #[serde(default)]
    pub file_profiles: BTreeMap<String, Vec<String>>,
}

impl Default for LoomMetadata {
    fn default() -> Self {
        Self {
            roles: BTreeSet::new(),
            inherit_roles: true,
            role_root: false,
            internal: false,
            profiles: Vec::new(),
            file_profiles: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl PackageDescriptor {
    /// Parse a descriptor from a JSON string
    pub fn parse(content: &str, origin: &Path) -> PackageResult<Self> {
        serde_json::from_str(content).map_err(|error| PackageError::InvalidDescriptor {
            path: origin.to_path_buf(),
            error,
        })
    }

    /// Load the descriptor of the package rooted at `dir`
    pub fn load(dir: &Path) -> PackageResult<Self> {
        let path = dir.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return Err(PackageError::MissingDescriptor(dir.to_path_buf()));
        }
        let content =
            std::fs::read_to_string(&path).map_err(|e| PackageError::io(&path, e))?;
        Self::parse(&content, &path)
    }

    /// Package name, falling back to the folder name for unnamed roots
    pub fn name_or(&self, dir: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string())
        })
    }

    /// Package version, `0.0.0` when absent
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("0.0.0")
    }

    /// Whether the package carries framework metadata
    pub fn is_framework_package(&self) -> bool {
        self.loom.is_some()
    }

    /// Workspace member patterns (empty for non-monorepo roots)
    pub fn workspace_patterns(&self) -> &[String] {
        self.workspaces
            .as_ref()
            .map(Workspaces::patterns)
            .unwrap_or(&[])
    }
}

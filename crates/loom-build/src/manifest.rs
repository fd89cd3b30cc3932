//! Build manifest model
//!
//! A [`ManifestRoot`] describes every module of a workspace build: where its
//! sources live, where its output goes and which files it is made of, grouped
//! by [`FolderCategory`]. It is serialized as `manifest.json` in the tool
//! folder and is the only state carried from one build to the next.

use crate::error::{BuildError, BuildResult};
use loom_package::{PackageManager, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Schema version written into every manifest
pub const MANIFEST_VERSION: u32 = 1;

/// Folder category of a module file, a pure function of its relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderCategory {
    Root,
    Index,
    Package,
    Src,
    Bin,
    Support,
    Resources,
    Test,
    Doc,
    TestFixtures,
    SupportFixtures,
    SupportResources,
    Plugins,
}

impl FolderCategory {
    /// Categories that take part in delta computation
    pub const TRACKED: [FolderCategory; 8] = [
        FolderCategory::Root,
        FolderCategory::Index,
        FolderCategory::Package,
        FolderCategory::Src,
        FolderCategory::Bin,
        FolderCategory::Support,
        FolderCategory::Test,
        FolderCategory::Doc,
    ];

    pub const ALL: [FolderCategory; 13] = [
        FolderCategory::Root,
        FolderCategory::Index,
        FolderCategory::Package,
        FolderCategory::Src,
        FolderCategory::Bin,
        FolderCategory::Support,
        FolderCategory::Resources,
        FolderCategory::Test,
        FolderCategory::Doc,
        FolderCategory::TestFixtures,
        FolderCategory::SupportFixtures,
        FolderCategory::SupportResources,
        FolderCategory::Plugins,
    ];

    /// Whether files of this category are compared by the delta engine
    pub fn is_tracked(self) -> bool {
        Self::TRACKED.contains(&self)
    }

    /// Categories that only exist at compile time
    pub fn is_compile_time_only(self) -> bool {
        matches!(self, FolderCategory::Support | FolderCategory::Plugins)
    }

    /// Category with the given manifest name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Manifest name of the category
    pub fn name(self) -> &'static str {
        match self {
            FolderCategory::Root => "root",
            FolderCategory::Index => "index",
            FolderCategory::Package => "package",
            FolderCategory::Src => "src",
            FolderCategory::Bin => "bin",
            FolderCategory::Support => "support",
            FolderCategory::Resources => "resources",
            FolderCategory::Test => "test",
            FolderCategory::Doc => "doc",
            FolderCategory::TestFixtures => "test-fixtures",
            FolderCategory::SupportFixtures => "support-fixtures",
            FolderCategory::SupportResources => "support-resources",
            FolderCategory::Plugins => "plugins",
        }
    }
}

impl std::fmt::Display for FolderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a module file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Typings,
    Source,
    Compiled,
    Json,
    Package,
    Unknown,
    Fixture,
    Markdown,
}

/// One file of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the module source folder, `/`-separated
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Last update in milliseconds since the epoch
    pub updated: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, file_type: FileType, updated: u64) -> Self {
        Self {
            path: path.into(),
            file_type,
            updated,
            role: None,
            profiles: Vec::new(),
        }
    }

    /// Path of the compiled counterpart, relative to the module output folder
    pub fn output_path(&self) -> String {
        compiled_path(&self.path, self.file_type)
    }
}

/// A module of the build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestModule {
    pub name: String,
    pub version: String,
    /// Source folder
    pub source: PathBuf,
    /// Output folder (`<output-root>/node_modules/<name>`)
    pub output: PathBuf,
    pub main: bool,
    pub workspace: bool,
    pub internal: bool,
    pub prod: bool,
    pub roles: BTreeSet<Role>,
    pub parents: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    pub files: BTreeMap<FolderCategory, Vec<FileEntry>>,
}

impl ManifestModule {
    /// Every file of the module with its category
    pub fn entries(&self) -> impl Iterator<Item = (FolderCategory, &FileEntry)> {
        self.files
            .iter()
            .flat_map(|(category, files)| files.iter().map(move |f| (*category, f)))
    }

    /// Absolute source path of a file
    pub fn source_path(&self, entry: &FileEntry) -> PathBuf {
        self.source.join(&entry.path)
    }

    /// Absolute output path of a file
    pub fn output_path(&self, entry: &FileEntry) -> PathBuf {
        self.output.join(entry.output_path())
    }

    /// Number of files across all categories
    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Identity of the workspace a manifest was built for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInfo {
    pub path: PathBuf,
    pub name: String,
    pub monorepo: bool,
    pub package_manager: PackageManager,
}

/// Build folders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPaths {
    pub compiler_output: PathBuf,
    pub output: PathBuf,
    /// Tool folder name, relative to a package folder
    pub tool: PathBuf,
    pub types: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_service_url: Option<String>,
}

/// Descriptor of the workspace's main module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainModule {
    pub name: String,
    pub version: String,
    pub source: PathBuf,
}

/// Root of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRoot {
    pub version: u32,
    pub workspace: WorkspaceInfo,
    pub paths: BuildPaths,
    pub main: MainModule,
    /// Creation time in milliseconds since the epoch
    pub generated: u64,
    pub modules: BTreeMap<String, ManifestModule>,
}

impl ManifestRoot {
    /// Look up a module
    pub fn module(&self, name: &str) -> Option<&ManifestModule> {
        self.modules.get(name)
    }

    /// Parse a manifest, rejecting other schema versions
    pub fn from_json(content: &str, origin: &Path) -> BuildResult<Self> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| BuildError::manifest_read(origin, e))?;
        let found = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if found != MANIFEST_VERSION {
            return Err(BuildError::IncompatibleManifest {
                path: origin.to_path_buf(),
                found,
                expected: MANIFEST_VERSION,
            });
        }
        serde_json::from_value(value).map_err(|e| BuildError::manifest_read(origin, e))
    }

    /// Same manifest with `generated` cleared, for comparisons across builds
    pub fn without_timestamp(&self) -> Self {
        Self {
            generated: 0,
            ..self.clone()
        }
    }
}

/// Output folder of a module
pub fn module_output(output_root: &Path, name: &str) -> PathBuf {
    output_root.join("node_modules").join(name)
}

/// Relative output path of a file: sources get their compiled extension
pub fn compiled_path(path: &str, file_type: FileType) -> String {
    if file_type != FileType::Source {
        return path.to_string();
    }
    for (source, compiled) in [(".mts", ".mjs"), (".cts", ".cjs"), (".tsx", ".js"), (".ts", ".js")] {
        if let Some(stem) = path.strip_suffix(source) {
            return format!("{stem}{compiled}");
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_category_names_round_trip() {
        for category in FolderCategory::ALL {
            assert_eq!(FolderCategory::from_name(category.name()), Some(category));
        }
        assert_eq!(FolderCategory::from_name("vendor"), None);
    }

    #[rstest]
    #[case("src/user.ts", FileType::Source, "src/user.js")]
    #[case("src/view.tsx", FileType::Source, "src/view.js")]
    #[case("bin/run.mts", FileType::Source, "bin/run.mjs")]
    #[case("support/legacy.cts", FileType::Source, "support/legacy.cjs")]
    #[case("src/types.d.ts", FileType::Typings, "src/types.d.ts")]
    #[case("package.json", FileType::Package, "package.json")]
    #[case("index.js", FileType::Compiled, "index.js")]
    fn test_compiled_path(#[case] path: &str, #[case] ty: FileType, #[case] expected: &str) {
        assert_eq!(compiled_path(path, ty), expected);
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&FolderCategory::SupportFixtures).unwrap();
        assert_eq!(json, "\"support-fixtures\"");
        assert!(FolderCategory::Src.is_tracked());
        assert!(!FolderCategory::Resources.is_tracked());
        assert!(!FolderCategory::Plugins.is_tracked());
        assert!(FolderCategory::Plugins.is_compile_time_only());
    }

    #[test]
    fn test_file_entry_omits_empty_optionals() {
        let entry = FileEntry::new("src/a.ts", FileType::Source, 10);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "src/a.ts", "type": "source", "updated": 10})
        );
    }

    #[test]
    fn test_module_output_uses_node_modules_layout() {
        assert_eq!(
            module_output(Path::new("/out"), "@app/core"),
            PathBuf::from("/out/node_modules/@app/core")
        );
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let result = ManifestRoot::from_json(r#"{"version": 99}"#, Path::new("m.json"));
        assert!(matches!(
            result,
            Err(BuildError::IncompatibleManifest { found: 99, .. })
        ));
    }
}

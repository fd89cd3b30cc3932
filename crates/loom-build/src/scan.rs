//! Module folder scanning and file classification

use crate::error::{BuildError, BuildResult};
use crate::manifest::{FileType, FolderCategory};
use loom_package::{Role, DESCRIPTOR_FILE};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

/// First-level folders scanned for modules that are not the workspace root
pub const PARTIAL_SCAN_FOLDERS: [&str; 3] = ["src", "bin", "support"];

/// `support/<kind>.plugins.<ext>` or `support/<kind>.plugins/...`
static PLUGIN_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^support/(compile-time|test|doc|package)\.plugins(\.[^/]+|/.+)$")
        .unwrap_or_else(|e| unreachable!("invalid plugin path pattern: {e}"))
});

/// A classified file found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scanned folder, `/`-separated
    pub path: String,
    pub category: FolderCategory,
    pub file_type: FileType,
    pub role: Option<Role>,
    pub updated: u64,
}

/// Category and default role of a relative path.
///
/// Returns `None` when the first path segment is not a known folder.
pub fn classify(path: &str) -> Option<(FolderCategory, Option<Role>)> {
    if path == DESCRIPTOR_FILE {
        return Some((FolderCategory::Package, None));
    }

    let Some((first, _)) = path.split_once('/') else {
        if path.starts_with("index.") {
            return Some((FolderCategory::Index, None));
        }
        return Some((FolderCategory::Root, None));
    };

    if path.starts_with("test/fixtures/") {
        return Some((FolderCategory::TestFixtures, None));
    }
    if path.starts_with("support/fixtures/") {
        return Some((FolderCategory::SupportFixtures, None));
    }
    if path.starts_with("support/resources/") {
        return Some((FolderCategory::SupportResources, None));
    }
    if let Some(caps) = PLUGIN_PATH.captures(path) {
        let role = match &caps[1] {
            "compile-time" => Role::Compile,
            "test" => Role::Test,
            "doc" => Role::Doc,
            _ => Role::Build,
        };
        return Some((FolderCategory::Plugins, Some(role)));
    }

    match first {
        "src" => Some((FolderCategory::Src, None)),
        "bin" => Some((FolderCategory::Bin, None)),
        "support" => Some((FolderCategory::Support, None)),
        "resources" => Some((FolderCategory::Resources, None)),
        "test" => Some((FolderCategory::Test, Some(Role::Test))),
        "doc" => Some((FolderCategory::Doc, Some(Role::Doc))),
        _ => None,
    }
}

/// File type from the extension, with fixture and descriptor overrides
pub fn file_type_for(path: &str, category: FolderCategory) -> FileType {
    match category {
        FolderCategory::TestFixtures
        | FolderCategory::SupportFixtures
        | FolderCategory::SupportResources => return FileType::Fixture,
        FolderCategory::Package => return FileType::Package,
        _ => {}
    }

    if [".d.ts", ".d.mts", ".d.cts"].iter().any(|s| path.ends_with(s)) {
        return FileType::Typings;
    }
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("ts" | "tsx" | "mts" | "cts") => FileType::Source,
        Some("js" | "jsx" | "mjs" | "cjs") => FileType::Compiled,
        Some("json") => FileType::Json,
        Some("md") => FileType::Markdown,
        _ => FileType::Unknown,
    }
}

/// Last update of a file: the later of content modification and metadata change, in ms
pub fn timestamp(meta: &Metadata) -> u64 {
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    modified.max(changed_millis(meta))
}

#[cfg(unix)]
fn changed_millis(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    let secs = meta.ctime().max(0) as u64;
    let nanos = meta.ctime_nsec().max(0) as u64;
    secs * 1000 + nanos / 1_000_000
}

#[cfg(not(unix))]
fn changed_millis(_meta: &Metadata) -> u64 {
    0
}

/// Timestamp of a path, `None` when it cannot be read
pub fn path_timestamp(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| timestamp(&m))
}

/// Recursively scan a module folder.
///
/// Hidden entries, `node_modules`, nested packages and `excluded` folders are
/// skipped. Unless `full` is set only root files and the
/// [`PARTIAL_SCAN_FOLDERS`] are visited.
pub fn scan_folder(
    module: &str,
    dir: &Path,
    full: bool,
    excluded: &[PathBuf],
) -> BuildResult<Vec<ScannedFile>> {
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, dir, full, excluded));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative_path(dir, entry.path());
        let (category, role) = classify(&rel).ok_or_else(|| BuildError::UnexpectedFolder {
            module: module.to_string(),
            segment: rel.split('/').next().unwrap_or_default().to_string(),
            path: rel.clone(),
        })?;
        let meta = entry
            .metadata()
            .map_err(|e| BuildError::io(entry.path(), e.into()))?;

        files.push(ScannedFile {
            file_type: file_type_for(&rel, category),
            path: rel,
            category,
            role,
            updated: timestamp(&meta),
        });
    }
    Ok(files)
}

fn keep_entry(entry: &DirEntry, root: &Path, full: bool, excluded: &[PathBuf]) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || name == "node_modules" {
        return false;
    }
    if !entry.file_type().is_dir() {
        return true;
    }
    if excluded.iter().any(|e| entry.path() == root.join(e)) {
        return false;
    }
    if entry.path().join(DESCRIPTOR_FILE).is_file() {
        return false;
    }
    full || entry.depth() > 1 || PARTIAL_SCAN_FOLDERS.contains(&name.as_ref())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    #[case("package.json", FolderCategory::Package, None)]
    #[case("index.ts", FolderCategory::Index, None)]
    #[case("README.md", FolderCategory::Root, None)]
    #[case("src/services/user.ts", FolderCategory::Src, None)]
    #[case("bin/cli.ts", FolderCategory::Bin, None)]
    #[case("support/helpers.ts", FolderCategory::Support, None)]
    #[case("resources/logo.png", FolderCategory::Resources, None)]
    #[case("test/user.test.ts", FolderCategory::Test, Some(Role::Test))]
    #[case("test/fixtures/users.json", FolderCategory::TestFixtures, None)]
    #[case("support/fixtures/db.sql", FolderCategory::SupportFixtures, None)]
    #[case("support/resources/tpl.html", FolderCategory::SupportResources, None)]
    #[case("doc/guide.md", FolderCategory::Doc, Some(Role::Doc))]
    #[case("support/compile-time.plugins.ts", FolderCategory::Plugins, Some(Role::Compile))]
    #[case("support/test.plugins/mocks.ts", FolderCategory::Plugins, Some(Role::Test))]
    #[case("support/doc.plugins.ts", FolderCategory::Plugins, Some(Role::Doc))]
    #[case("support/package.plugins/zip/index.ts", FolderCategory::Plugins, Some(Role::Build))]
    #[case("support/runtime.plugins.ts", FolderCategory::Support, None)]
    fn test_classify(
        #[case] path: &str,
        #[case] category: FolderCategory,
        #[case] role: Option<Role>,
    ) {
        assert_eq!(classify(path), Some((category, role)));
    }

    #[test]
    fn test_classify_unknown_folder() {
        assert_eq!(classify("dist/index.js"), None);
    }

    #[rstest]
    #[case("src/a.ts", FolderCategory::Src, FileType::Source)]
    #[case("src/a.tsx", FolderCategory::Src, FileType::Source)]
    #[case("src/a.d.ts", FolderCategory::Src, FileType::Typings)]
    #[case("src/a.d.mts", FolderCategory::Src, FileType::Typings)]
    #[case("src/a.mjs", FolderCategory::Src, FileType::Compiled)]
    #[case("src/data.json", FolderCategory::Src, FileType::Json)]
    #[case("package.json", FolderCategory::Package, FileType::Package)]
    #[case("README.md", FolderCategory::Root, FileType::Markdown)]
    #[case("test/fixtures/a.ts", FolderCategory::TestFixtures, FileType::Fixture)]
    #[case("resources/logo.png", FolderCategory::Resources, FileType::Unknown)]
    fn test_file_type(#[case] path: &str, #[case] category: FolderCategory, #[case] expected: FileType) {
        assert_eq!(file_type_for(path, category), expected);
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_partial_scan_limits_folders() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for rel in [
            "package.json",
            "index.ts",
            "src/a.ts",
            "support/b.ts",
            "test/a.test.ts",
            "dist/a.js",
            ".cache/x",
            "node_modules/dep/index.js",
        ] {
            touch(root, rel);
        }

        let files = scan_folder("lib", root, false, &[]).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["index.ts", "package.json", "src/a.ts", "support/b.ts"]);
    }

    #[test]
    fn test_full_scan_rejects_unknown_folder() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/a.ts");
        touch(temp.path(), "dist/a.js");

        match scan_folder("app", temp.path(), true, &[]) {
            Err(BuildError::UnexpectedFolder { module, segment, .. }) => {
                assert_eq!(module, "app");
                assert_eq!(segment, "dist");
            }
            other => panic!("Expected UnexpectedFolder, got {:?}", other),
        }
    }

    #[test]
    fn test_full_scan_skips_excluded_and_nested_packages() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "src/a.ts");
        touch(root, "test/a.test.ts");
        touch(root, "dist/a.js");
        touch(root, "packages/core/package.json");
        touch(root, "packages/core/src/x.ts");

        let files = scan_folder("app", root, true, &[PathBuf::from("dist")]).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.ts", "test/a.test.ts"]);
        assert_eq!(files[1].role, Some(Role::Test));
        assert!(files[0].updated > 0);
    }
}

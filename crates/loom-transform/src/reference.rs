//! Cross-unit reference resolution seam
//!
//! The transform pipeline never reads the build manifest itself; it asks a
//! [`ReferenceResolver`] for stable ids, import targets and unit locations.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Kind of an import target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    File,
    /// A folder reached through its index file
    Directory,
}

/// Target of an import specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    /// Source path of the target file (the index file for directories)
    pub path: PathBuf,
    pub kind: ReferenceKind,
    /// Module owning the target
    pub project: Option<String>,
}

/// Where a unit lives in the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLocation {
    pub module: String,
    /// Folder category name (`src`, `support`, ...)
    pub category: String,
    /// Category only exists at compile time
    pub compile_time_only: bool,
}

/// Answers questions about units other than the one being transformed
pub trait ReferenceResolver {
    /// Stable id of a source file
    fn id_of(&self, source: &Path) -> Option<String>;

    /// Resolve an import specifier written in `from`
    fn resolve_reference(&self, from: &Path, specifier: &str) -> Option<ResolvedReference>;

    /// Module and category of a source file
    fn locate(&self, source: &Path) -> Option<UnitLocation>;
}

/// Resolver that knows no units
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn id_of(&self, _source: &Path) -> Option<String> {
        None
    }

    fn resolve_reference(&self, _from: &Path, _specifier: &str) -> Option<ResolvedReference> {
        None
    }

    fn locate(&self, _source: &Path) -> Option<UnitLocation> {
        None
    }
}

/// Whether a specifier is relative to the importing unit
pub fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Lexically normalize a path, folding `.` and `..`
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("./user", true)]
    #[case("../core", true)]
    #[case("..", true)]
    #[case("@app/core", false)]
    #[case("lodash", false)]
    #[case(".hidden", false)]
    fn test_is_relative(#[case] specifier: &str, #[case] expected: bool) {
        assert_eq!(is_relative(specifier), expected);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/ws/src/services/../models/./user")),
            PathBuf::from("/ws/src/models/user")
        );
    }
}

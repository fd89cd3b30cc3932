//! Manifest persistence

use crate::error::{BuildError, BuildResult};
use crate::manifest::ManifestRoot;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Read a persisted manifest
pub fn load_manifest(path: &Path) -> BuildResult<ManifestRoot> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::manifest_read(path, e))?;
    ManifestRoot::from_json(&content, path)
}

/// Read the previous manifest if one exists.
///
/// A missing file is a first build; an unreadable or incompatible one is
/// reported and treated the same way.
pub fn load_previous(path: &Path) -> Option<ManifestRoot> {
    if !path.is_file() {
        return None;
    }
    match load_manifest(path) {
        Ok(manifest) => Some(manifest),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring previous manifest");
            None
        }
    }
}

/// Write a manifest atomically: temp file in the same folder, then rename
pub fn save_manifest(manifest: &ManifestRoot, path: &Path) -> BuildResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

    let json = serde_json::to_string_pretty(manifest)?;
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
    temp.write_all(json.as_bytes())
        .map_err(|e| BuildError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| BuildError::io(path, e.error))?;

    debug!(path = %path.display(), modules = manifest.modules.len(), "manifest written");
    Ok(())
}

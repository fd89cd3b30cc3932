//! Per-build caches

use crate::error::BuildResult;
use crate::scan::{scan_folder, ScannedFile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

type ScanKey = (PathBuf, bool, Vec<PathBuf>);

/// State shared by the steps of one build.
///
/// Folder scans are memoized per folder, mode and excluded folders; a new
/// session starts from an empty cache.
#[derive(Debug, Default)]
pub struct BuildSession {
    scans: HashMap<ScanKey, Vec<ScannedFile>>,
    hits: usize,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a module folder, reusing an earlier scan with the same folder, mode
    /// and exclusions
    pub fn scan(
        &mut self,
        module: &str,
        dir: &Path,
        full: bool,
        excluded: &[PathBuf],
    ) -> BuildResult<&[ScannedFile]> {
        let mut skipped = excluded.to_vec();
        skipped.sort();
        skipped.dedup();
        let key = (dir.to_path_buf(), full, skipped);
        if self.scans.contains_key(&key) {
            self.hits += 1;
        } else {
            let files = scan_folder(module, dir, full, excluded)?;
            debug!(module, files = files.len(), full, "scanned module folder");
            self.scans.insert(key.clone(), files);
        }
        Ok(self.scans.get(&key).map(Vec::as_slice).unwrap_or_default())
    }

    /// Number of scans answered from the cache
    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    /// Forget every cached scan
    pub fn clear(&mut self) {
        self.scans.clear();
        self.hits = 0;
    }
}

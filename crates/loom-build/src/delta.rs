//! Incremental delta between two manifests
//!
//! Compares a fresh manifest against the previous one and the compiled
//! outputs actually on disk, and reports per module which files need work.

use crate::manifest::{module_output, FileEntry, FolderCategory, ManifestModule, ManifestRoot};
use crate::scan::path_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// What happened to a file since the previous build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaAction {
    /// New file without an up-to-date output
    Added,
    /// Source updated after its output was produced
    Changed,
    /// File gone from the sources, output still present
    Removed,
    /// Unchanged file whose output is gone
    Missing,
    /// Unchanged file whose output is older than the source
    Dirty,
}

impl DeltaAction {
    /// Whether the file must be (re)produced
    pub fn needs_output(self) -> bool {
        !matches!(self, DeltaAction::Removed)
    }
}

/// One file event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// Path relative to the module source folder
    pub path: String,
    pub category: FolderCategory,
    pub action: DeltaAction,
}

/// Events keyed by module name
pub type Delta = BTreeMap<String, Vec<DeltaEvent>>;

/// Compute the delta of `new` against `old`.
///
/// Every module of `new` has an entry, possibly empty. Modules only present
/// in `old` get `removed` events for outputs that are still on disk. Output
/// files that cannot be read count as absent.
pub fn produce_delta(output_root: &Path, new: &ManifestRoot, old: Option<&ManifestRoot>) -> Delta {
    let mut delta = Delta::new();

    for (name, module) in &new.modules {
        let previous = old.and_then(|o| o.modules.get(name));
        let events = module_delta(output_root, name, Some(module), previous);
        debug!(module = %name, events = events.len(), "module delta");
        delta.insert(name.clone(), events);
    }

    if let Some(old) = old {
        for (name, module) in &old.modules {
            if new.modules.contains_key(name) {
                continue;
            }
            let events = module_delta(output_root, name, None, Some(module));
            if !events.is_empty() {
                debug!(module = %name, events = events.len(), "removed module delta");
                delta.insert(name.clone(), events);
            }
        }
    }

    delta
}

/// Number of events across all modules
pub fn event_count(delta: &Delta) -> usize {
    delta.values().map(Vec::len).sum()
}

type TrackedFiles<'a> = BTreeMap<&'a str, (FolderCategory, &'a FileEntry)>;

fn tracked(module: Option<&ManifestModule>) -> TrackedFiles<'_> {
    module
        .into_iter()
        .flat_map(ManifestModule::entries)
        .filter(|(category, _)| category.is_tracked())
        .map(|(category, entry)| (entry.path.as_str(), (category, entry)))
        .collect()
}

fn module_delta(
    output_root: &Path,
    name: &str,
    new: Option<&ManifestModule>,
    old: Option<&ManifestModule>,
) -> Vec<DeltaEvent> {
    let output_dir = module_output(output_root, name);
    let new_files = tracked(new);
    let old_files = tracked(old);
    let mut events = Vec::new();

    for (path, (category, entry)) in &new_files {
        let output = path_timestamp(&output_dir.join(entry.output_path()));
        let action = match old_files.get(path) {
            None => match output {
                Some(out) if out >= entry.updated => None,
                _ => Some(DeltaAction::Added),
            },
            Some((_, previous)) if previous.updated != entry.updated => match output {
                Some(out) if entry.updated <= out => None,
                _ => Some(DeltaAction::Changed),
            },
            Some(_) => match output {
                None => Some(DeltaAction::Missing),
                Some(out) if out < entry.updated => Some(DeltaAction::Dirty),
                Some(_) => None,
            },
        };
        if let Some(action) = action {
            events.push(DeltaEvent {
                path: path.to_string(),
                category: *category,
                action,
            });
        }
    }

    for (path, (category, entry)) in &old_files {
        if new_files.contains_key(path) {
            continue;
        }
        if path_timestamp(&output_dir.join(entry.output_path())).is_some() {
            events.push(DeltaEvent {
                path: path.to_string(),
                category: *category,
                action: DeltaAction::Removed,
            });
        }
    }

    events
}

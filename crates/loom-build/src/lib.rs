//! Loom build pipeline
//!
//! Turns a workspace into build work:
//! - Manifest snapshots of every module reachable from the workspace root
//! - Incremental deltas against the previous manifest and the outputs on disk
//! - A manifest index for lookups by path, specifier and stable id
//! - Build orchestration with plugin dispatch through a compiler host

pub mod builder;
pub mod delta;
pub mod error;
pub mod index;
pub mod manifest;
pub mod persist;
pub mod scan;
pub mod session;
pub mod snapshot;

// Re-export main types
pub use builder::{BuildPlan, BuildReport, BuildStats, Builder};
pub use delta::{event_count, produce_delta, Delta, DeltaAction, DeltaEvent};
pub use error::{BuildError, BuildResult};
pub use index::{file_id, FindConfig, IndexedFile, ManifestIndex};
pub use manifest::{
    compiled_path, module_output, BuildPaths, FileEntry, FileType, FolderCategory, MainModule,
    ManifestModule, ManifestRoot, WorkspaceInfo, MANIFEST_VERSION,
};
pub use persist::{load_manifest, load_previous, save_manifest};
pub use scan::{classify, scan_folder, ScannedFile};
pub use session::BuildSession;
pub use snapshot::SnapshotBuilder;

// Re-export config types for convenience
pub use loom_config::Config;

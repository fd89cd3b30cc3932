//! Loom Package Graph
//!
//! Reads `package.json` descriptors, discovers monorepo members and walks the
//! transitive dependency graph of a workspace, then settles `prod` flags and
//! roles over that graph.

pub mod descriptor;
pub mod graph;
pub mod role;
pub mod visitor;
pub mod workspace;

pub use descriptor::{LoomMetadata, PackageDescriptor, Workspaces};
pub use graph::{DependencyKind, Edge, GraphNode, ModuleGraph};
pub use role::Role;
pub use visitor::{resolve_workspace, DependencyVisitor};
pub use workspace::{PackageManager, WorkspaceMembers};

use std::path::PathBuf;

/// Name of the package descriptor file
pub const DESCRIPTOR_FILE: &str = "package.json";

/// Package graph errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Invalid package descriptor at {path}: {error}")]
    InvalidDescriptor {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("No package descriptor found in {0}")]
    MissingDescriptor(PathBuf),

    #[error("Invalid workspace pattern '{0}'")]
    InvalidWorkspacePattern(String),

    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Circular dependency detected among: {}", unresolved.join(", "))]
    CircularDependency { unresolved: Vec<String> },
}

impl PackageError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }
}

pub type PackageResult<T> = std::result::Result<T, PackageError>;

/// Build pipeline error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unexpected folder '{segment}' in module '{module}' (file {path})")]
    UnexpectedFolder {
        module: String,
        segment: String,
        path: String,
    },

    #[error("Failed to read manifest at {path}: {error}")]
    ManifestReadError { path: PathBuf, error: String },

    #[error("Incompatible manifest at {path}: version {found}, expected {expected}")]
    IncompatibleManifest {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Module not found: {module}")]
    ModuleNotFound { module: String },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] loom_config::ConfigError),

    #[error(transparent)]
    Package(#[from] loom_package::PackageError),

    #[error(transparent)]
    Transform(#[from] loom_transform::TransformError),
}

impl BuildError {
    /// Create a manifest read error
    pub fn manifest_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::ManifestReadError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
        }
    }
}

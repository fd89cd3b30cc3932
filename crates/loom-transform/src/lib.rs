//! Loom unit transformation
//!
//! Rewrites parsed source units before they are emitted:
//! - Resolves declaration types into runtime-describable [`AnyType`] values
//! - Dispatches compiler plugins over the unit tree
//! - Normalizes imports into output form
//! - Prints the transformed unit as JavaScript

pub mod ast;
pub mod builtin;
pub mod dispatch;
pub mod emit;
pub mod host;
pub mod imports;
pub mod plugin;
pub mod reference;
pub mod resolver;
pub mod semantic;

pub use ast::SourceUnit;
pub use dispatch::{Dispatcher, MAX_DRAIN_ROUNDS, TOOLCHAIN_PACKAGES};
pub use emit::print_unit;
pub use host::{CompilerHost, MemoryHost};
pub use imports::ImportManager;
pub use plugin::{
    InsertAt, Node, NodeCategory, NodeTransformer, Phase, PluginCatalog, PluginContext,
    PluginInit, PluginRegistry, Transformer,
};
pub use reference::{NoReferences, ReferenceKind, ReferenceResolver, ResolvedReference, UnitLocation};
pub use resolver::{AnyType, CompositionOperator, TypeResolver, MAX_DEPTH};
pub use semantic::{
    Annotation, AnnotationKey, MemorySemanticModel, SemanticModel, TypeId, TypeSource, TypeStore,
};

use std::path::PathBuf;
use thiserror::Error;

/// Type resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Type nesting exceeds {limit} levels")]
    TooNested { limit: usize },

    #[error("Unknown type id {0}")]
    UnknownType(u32),

    #[error("Type '{0}' has no symbol")]
    MissingSymbol(String),
}

/// Failures raised by plugins
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin '{plugin}' expected a {expected} node but returned {found}")]
    UnexpectedNode {
        plugin: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Plugin '{plugin}' failed: {message}")]
    Failed { plugin: String, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl PluginError {
    /// Create a generic plugin failure
    pub fn failed(plugin: impl Into<String>, message: impl ToString) -> Self {
        Self::Failed {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

/// Unit transformation errors; every variant names the unit
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Transform of {path} failed: {error}")]
    Plugin { path: PathBuf, error: PluginError },

    #[error("Queued statements of {path} did not settle after {rounds} rounds")]
    DrainLimit { path: PathBuf, rounds: usize },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No unit available for {0}")]
    UnitNotFound(PathBuf),
}

impl TransformError {
    /// Wrap a plugin failure with the unit path
    pub fn plugin(path: impl Into<PathBuf>, error: PluginError) -> Self {
        Self::Plugin {
            path: path.into(),
            error,
        }
    }
}

pub type TransformResult<T> = Result<T, TransformError>;

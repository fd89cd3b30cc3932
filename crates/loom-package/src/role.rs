//! Module and file roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Build mode a module or file takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Shipped runtime code
    Standard,
    /// Only needed to run tests
    Test,
    /// Only needed to build documentation
    Doc,
    /// Compile-time only (transformer plugins and their helpers)
    Compile,
    /// Packaging and publishing tooling
    Build,
}

impl Role {
    /// Parse a role name
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "test" => Some(Self::Test),
            "doc" => Some(Self::Doc),
            "compile" => Some(Self::Compile),
            "build" => Some(Self::Build),
            _ => None,
        }
    }

    /// Role name as written in descriptors and manifests
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Test => "test",
            Self::Doc => "doc",
            Self::Compile => "compile",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

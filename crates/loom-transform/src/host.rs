//! Compiler host seam
//!
//! The builder does not parse or type-check sources itself. A host hands it
//! parsed units and the semantic model those units were checked against.

use crate::ast::{SourceUnit, Stmt};
use crate::semantic::{MemorySemanticModel, SemanticModel};
use crate::{TransformError, TransformResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub trait CompilerHost {
    /// Parse the unit at `path` whose current content is `text`
    fn parse(&self, path: &Path, text: &str) -> TransformResult<SourceUnit>;

    /// Semantic model covering every unit the host parses
    fn semantic(&self) -> &dyn SemanticModel;
}

/// Host over units that were parsed ahead of time
#[derive(Debug, Default)]
pub struct MemoryHost {
    units: HashMap<PathBuf, SourceUnit>,
    semantic: MemorySemanticModel,
}

impl MemoryHost {
    pub fn new(semantic: MemorySemanticModel) -> Self {
        Self {
            units: HashMap::new(),
            semantic,
        }
    }

    pub fn with_unit(mut self, unit: SourceUnit) -> Self {
        self.insert(unit);
        self
    }

    pub fn insert(&mut self, unit: SourceUnit) {
        self.units.insert(unit.path.clone(), unit);
    }

    /// Add a unit from its JSON statement list
    pub fn insert_json(&mut self, path: impl Into<PathBuf>, json: &str) -> TransformResult<()> {
        let path = path.into();
        let statements: Vec<Stmt> = serde_json::from_str(json).map_err(|e| TransformError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        self.insert(SourceUnit::new(path, statements));
        Ok(())
    }

    pub fn semantic_mut(&mut self) -> &mut MemorySemanticModel {
        &mut self.semantic
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl CompilerHost for MemoryHost {
    fn parse(&self, path: &Path, _text: &str) -> TransformResult<SourceUnit> {
        self.units
            .get(path)
            .cloned()
            .ok_or_else(|| TransformError::UnitNotFound(path.to_path_buf()))
    }

    fn semantic(&self) -> &dyn SemanticModel {
        &self.semantic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn test_parse_returns_registered_unit() {
        let unit = SourceUnit::new("/ws/src/a.ts", vec![Stmt::Expr(Expr::ident("a"))]);
        let host = MemoryHost::default().with_unit(unit.clone());
        assert_eq!(host.parse(Path::new("/ws/src/a.ts"), "").ok(), Some(unit));
        assert!(matches!(
            host.parse(Path::new("/ws/src/b.ts"), ""),
            Err(TransformError::UnitNotFound(_))
        ));
    }

    #[test]
    fn test_insert_json() {
        let mut host = MemoryHost::default();
        host.insert_json("/ws/src/a.ts", r#"[{"Expr": {"Ident": "main"}}]"#)
            .unwrap();
        assert_eq!(host.len(), 1);

        let err = host.insert_json("/ws/src/b.ts", "{").unwrap_err();
        assert!(matches!(err, TransformError::Parse { .. }));
    }
}

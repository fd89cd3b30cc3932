//! Import bookkeeping for one unit
//!
//! Plugins ask for imports while they rewrite a unit; [`ImportManager::finalize`]
//! merges those requests with the imports already present and brings every
//! specifier into output form.

use crate::ast::{ImportBinding, ImportDecl, SourceUnit, Stmt};
use crate::reference::{is_relative, ReferenceKind, ReferenceResolver};
use crate::semantic::SemanticModel;
use std::path::Path;
use tracing::debug;

/// Source and compiled extensions an output specifier may end with
const KNOWN_EXTENSIONS: [&str; 8] = [".tsx", ".mts", ".cts", ".ts", ".jsx", ".mjs", ".cjs", ".js"];

#[derive(Debug, Default)]
pub struct ImportManager {
    required: Vec<(String, ImportBinding)>,
}

impl ImportManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `binding` from `specifier`
    pub fn require(&mut self, specifier: &str, binding: ImportBinding) {
        let duplicate = self
            .required
            .iter()
            .any(|(s, b)| s == specifier && b.local == binding.local);
        if !duplicate {
            self.required.push((specifier.to_string(), binding));
        }
    }

    /// Number of pending requests
    pub fn pending(&self) -> usize {
        self.required.len()
    }

    /// Apply the requested imports and normalize existing ones.
    ///
    /// - `import type` declarations and unresolvable (third-party) specifiers are left as written
    /// - bindings that only name types are stripped; an import left without bindings is dropped
    /// - requests are merged into an import of the same target, or injected at the top
    pub fn finalize(
        self,
        mut unit: SourceUnit,
        semantic: &dyn SemanticModel,
        references: &dyn ReferenceResolver,
    ) -> SourceUnit {
        let path = unit.path.clone();
        let mut statements = Vec::with_capacity(unit.statements.len());
        let mut present: Vec<(String, usize)> = Vec::new();

        for stmt in std::mem::take(&mut unit.statements) {
            let mut import = match stmt {
                Stmt::Import(import) if !import.type_only => import,
                other => {
                    statements.push(other);
                    continue;
                }
            };

            let declared = import.bindings.len();
            let specifier = import.specifier.clone();
            import
                .bindings
                .retain(|b| semantic.binding_has_value(&path, &specifier, &b.local));
            if declared > 0 && import.bindings.is_empty() {
                debug!(unit = %path.display(), specifier = %specifier, "dropped type-only import");
                continue;
            }

            present.push((target_key(&path, &specifier, references), statements.len()));
            import.specifier = output_specifier(&path, &specifier, references);
            statements.push(Stmt::Import(import));
        }

        let mut injected: Vec<(String, ImportDecl)> = Vec::new();
        for (specifier, binding) in self.required {
            let key = target_key(&path, &specifier, references);

            if let Some((_, index)) = present.iter().find(|(k, _)| *k == key) {
                if let Some(Stmt::Import(existing)) = statements.get_mut(*index) {
                    add_binding(existing, binding);
                }
                continue;
            }
            if let Some((_, existing)) = injected.iter_mut().find(|(k, _)| *k == key) {
                add_binding(existing, binding);
                continue;
            }
            let decl = ImportDecl::new(output_specifier(&path, &specifier, references), vec![binding]);
            injected.push((key, decl));
        }

        unit.statements = injected
            .into_iter()
            .map(|(_, decl)| Stmt::Import(decl))
            .chain(statements)
            .collect();
        unit
    }
}

fn add_binding(import: &mut ImportDecl, binding: ImportBinding) {
    if !import.bindings.iter().any(|b| b.local == binding.local) {
        import.bindings.push(binding);
    }
}

/// Identity of an import target: its resolved source path, else the specifier
fn target_key(unit: &Path, specifier: &str, references: &dyn ReferenceResolver) -> String {
    references
        .resolve_reference(unit, specifier)
        .map(|r| r.path.to_string_lossy().into_owned())
        .unwrap_or_else(|| specifier.to_string())
}

/// Output form of a specifier written in `unit`
pub fn output_specifier(unit: &Path, specifier: &str, references: &dyn ReferenceResolver) -> String {
    let Some(target) = references.resolve_reference(unit, specifier) else {
        return specifier.to_string();
    };
    if !is_relative(specifier) {
        match target.project.as_deref() {
            None => return specifier.to_string(),
            Some(project) if project == specifier => return specifier.to_string(),
            Some(_) => {}
        }
    }

    let extension = output_extension(&target.path);
    match target.kind {
        ReferenceKind::Directory => format!("{}/index{}", specifier.trim_end_matches('/'), extension),
        ReferenceKind::File => {
            let stem = KNOWN_EXTENSIONS
                .iter()
                .find_map(|ext| specifier.strip_suffix(ext))
                .unwrap_or(specifier);
            format!("{stem}{extension}")
        }
    }
}

fn output_extension(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mts" | "mjs") => ".mjs",
        Some("cts" | "cjs") => ".cjs",
        _ => ".js",
    }
}

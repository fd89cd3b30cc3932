//! Compiler plugin contracts and registration

use crate::ast::{ClassMember, Decorator, Expr, ImportBinding, Param, SourceUnit, Stmt};
use crate::imports::ImportManager;
use crate::reference::ReferenceResolver;
use crate::resolver::{AnyType, TypeResolver};
use crate::semantic::{Annotation, AnnotationKey, SemanticModel, TypeId};
use crate::{PluginError, ResolveError};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// When a plugin runs relative to the node's children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

/// Node kinds plugins can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    File,
    Class,
    Interface,
    Type,
    Function,
    Constructor,
    Method,
    StaticMethod,
    Property,
    Getter,
    Setter,
    Parameter,
    Call,
}

impl NodeCategory {
    /// Category of a statement, `None` for statements plugins never see
    pub fn of_stmt(stmt: &Stmt) -> Option<Self> {
        match stmt {
            Stmt::Class(_) => Some(NodeCategory::Class),
            Stmt::Interface(_) => Some(NodeCategory::Interface),
            Stmt::TypeAlias(_) => Some(NodeCategory::Type),
            Stmt::Function(_) => Some(NodeCategory::Function),
            _ => None,
        }
    }

    pub fn of_member(member: &ClassMember) -> Self {
        match member {
            ClassMember::Constructor(_) => NodeCategory::Constructor,
            ClassMember::Method(m) if m.is_static => NodeCategory::StaticMethod,
            ClassMember::Method(_) => NodeCategory::Method,
            ClassMember::Property(_) => NodeCategory::Property,
            ClassMember::Getter(_) => NodeCategory::Getter,
            ClassMember::Setter(_) => NodeCategory::Setter,
        }
    }
}

/// A node handed to a plugin; plugins return the node that replaces it
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Unit(SourceUnit),
    Stmt(Stmt),
    Member(ClassMember),
    Param(Param),
    Expr(Expr),
}

impl Node {
    /// Decorators written on the node, `None` for nodes that cannot carry any
    pub fn decorators(&self) -> Option<&[Decorator]> {
        match self {
            Node::Stmt(Stmt::Class(class)) => Some(&class.decorators),
            Node::Member(member) => Some(member.decorators()),
            Node::Param(param) => Some(&param.decorators),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Unit(_) => "unit",
            Node::Stmt(_) => "statement",
            Node::Member(_) => "class member",
            Node::Param(_) => "parameter",
            Node::Expr(_) => "expression",
        }
    }
}

/// Where a queued statement goes in the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Start,
    End,
    /// Before the top-level statement at this index
    Before(usize),
}

/// Rewrites one node
pub trait Transformer {
    fn transform(&self, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError>;
}

impl<F> Transformer for F
where
    F: Fn(Node, &mut PluginContext<'_>) -> Result<Node, PluginError>,
{
    fn transform(&self, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
        self(node, ctx)
    }
}

/// A registered plugin
pub struct NodeTransformer {
    pub name: String,
    pub category: NodeCategory,
    pub phase: Phase,
    /// Annotation keys that trigger the plugin; empty means unconditional
    pub targets: Vec<AnnotationKey>,
    transformer: Box<dyn Transformer>,
}

impl NodeTransformer {
    pub fn new(
        name: impl Into<String>,
        category: NodeCategory,
        phase: Phase,
        transformer: impl Transformer + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            phase,
            targets: Vec::new(),
            transformer: Box::new(transformer),
        }
    }

    pub fn with_targets(mut self, targets: Vec<AnnotationKey>) -> Self {
        self.targets = targets;
        self
    }

    pub fn is_unconditional(&self) -> bool {
        self.targets.is_empty()
    }

    /// Whether one of the node's annotations declares a target of this plugin
    pub fn matches(&self, annotations: &[Annotation]) -> bool {
        annotations.iter().any(|a| a.targets_any(&self.targets))
    }

    pub fn apply(&self, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
        self.transformer.transform(node, ctx)
    }
}

impl fmt::Debug for NodeTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTransformer")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("phase", &self.phase)
            .field("targets", &self.targets)
            .finish()
    }
}

/// Installed plugins, in registration order
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<NodeTransformer>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: NodeTransformer) {
        debug!(plugin = %plugin.name, category = ?plugin.category, phase = ?plugin.phase, "registered plugin");
        self.plugins.push(plugin);
    }

    /// Plugins for a category and phase
    pub fn plugins(&self, category: NodeCategory, phase: Phase) -> impl Iterator<Item = &NodeTransformer> {
        self.plugins
            .iter()
            .filter(move |p| p.category == category && p.phase == phase)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Installs plugins into a registry
pub type PluginInit = fn(&mut PluginRegistry);

/// Maps plugin-registration file ids to their init functions
#[derive(Default, Clone)]
pub struct PluginCatalog {
    entries: HashMap<String, PluginInit>,
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("PluginCatalog").field("ids", &ids).finish()
    }
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, init: PluginInit) -> Self {
        self.register(id, init);
        self
    }

    pub fn register(&mut self, id: impl Into<String>, init: PluginInit) {
        self.entries.insert(id.into(), init);
    }

    /// Run the init function registered for `id`; unknown ids are reported and skipped
    pub fn install(&self, id: &str, registry: &mut PluginRegistry) -> bool {
        match self.entries.get(id) {
            Some(init) => {
                init(registry);
                true
            }
            None => {
                warn!(registration = %id, "no plugin init registered");
                false
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

/// What a plugin can see and do while transforming a node
pub struct PluginContext<'a> {
    pub(crate) unit: &'a Path,
    pub(crate) unit_id: Option<String>,
    pub(crate) semantic: &'a dyn SemanticModel,
    pub(crate) references: &'a dyn ReferenceResolver,
    pub(crate) imports: &'a mut ImportManager,
    pub(crate) queue: &'a mut Vec<(InsertAt, Stmt)>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) statement_index: Option<usize>,
    pub(crate) owner: Option<String>,
}

impl<'a> PluginContext<'a> {
    /// Path of the unit being transformed
    pub fn unit_path(&self) -> &Path {
        self.unit
    }

    /// Stable id of the unit, falling back to its path
    pub fn unit_id(&self) -> String {
        self.unit_id
            .clone()
            .unwrap_or_else(|| self.unit.display().to_string())
    }

    /// Annotations on the current node
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Name of the class owning the current member or parameter
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn semantic(&self) -> &dyn SemanticModel {
        self.semantic
    }

    pub fn references(&self) -> &dyn ReferenceResolver {
        self.references
    }

    /// Resolve a checker type to its runtime description
    pub fn resolve_type(&self, ty: TypeId) -> Result<AnyType, ResolveError> {
        TypeResolver::new(self.semantic.types(), self.references, self.unit).resolve(ty)
    }

    /// Ask for an import to be present in the output
    pub fn require_import(&mut self, specifier: &str, binding: ImportBinding) {
        self.imports.require(specifier, binding);
    }

    /// Queue a statement for insertion
    pub fn insert(&mut self, at: InsertAt, stmt: Stmt) {
        self.queue.push((at, stmt));
    }

    /// Queue a statement right after the top-level statement being visited,
    /// or at the end of the unit when there is none
    pub fn insert_after_current(&mut self, stmt: Stmt) {
        let at = match self.statement_index {
            Some(index) => InsertAt::Before(index + 1),
            None => InsertAt::End,
        };
        self.queue.push((at, stmt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{MethodDecl, PropertyDecl};

    fn noop(node: Node, _ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
        Ok(node)
    }

    #[test]
    fn test_member_categories() {
        let method = |is_static| {
            ClassMember::Method(MethodDecl {
                name: "run".into(),
                is_static,
                decorators: vec![],
                params: vec![],
                body: vec![],
                return_type: None,
            })
        };
        assert_eq!(NodeCategory::of_member(&method(false)), NodeCategory::Method);
        assert_eq!(NodeCategory::of_member(&method(true)), NodeCategory::StaticMethod);
        let prop = ClassMember::Property(PropertyDecl {
            name: "id".into(),
            is_static: false,
            decorators: vec![],
            ty: None,
            init: None,
        });
        assert_eq!(NodeCategory::of_member(&prop), NodeCategory::Property);
        assert_eq!(NodeCategory::of_stmt(&Stmt::Return(None)), None);
    }

    #[test]
    fn test_registry_filters_by_category_and_phase() {
        let mut registry = PluginRegistry::new();
        registry.register(NodeTransformer::new("a", NodeCategory::Class, Phase::Before, noop));
        registry.register(NodeTransformer::new("b", NodeCategory::Class, Phase::After, noop));
        registry.register(NodeTransformer::new("c", NodeCategory::Method, Phase::Before, noop));

        let names: Vec<_> = registry
            .plugins(NodeCategory::Class, Phase::Before)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_targets_match_annotation_targets() {
        let key = AnnotationKey::new("@loom/web", "Route");
        let plugin = NodeTransformer::new("routes", NodeCategory::Method, Phase::Before, noop)
            .with_targets(vec![key.clone()]);
        let get = Annotation {
            key: AnnotationKey::new("@loom/web", "Get"),
            targets: vec![key],
        };
        let other = Annotation {
            key: AnnotationKey::new("@loom/di", "Inject"),
            targets: vec![],
        };
        assert!(!plugin.is_unconditional());
        assert!(plugin.matches(&[other.clone(), get]));
        assert!(!plugin.matches(&[other]));
    }

    #[test]
    fn test_catalog_installs_known_ids() {
        fn install(registry: &mut PluginRegistry) {
            registry.register(NodeTransformer::new("x", NodeCategory::File, Phase::After, noop));
        }
        let catalog = PluginCatalog::new().with("@app/core/support:compile-time.plugins", install);
        let mut registry = PluginRegistry::new();
        assert!(catalog.install("@app/core/support:compile-time.plugins", &mut registry));
        assert!(!catalog.install("@app/core/support:test.plugins", &mut registry));
        assert_eq!(registry.len(), 1);
    }
}

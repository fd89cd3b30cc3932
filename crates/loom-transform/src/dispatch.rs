//! Plugin dispatch over a unit tree
//!
//! One traversal per unit. For every node with a category the dispatcher
//! runs, in order: unconditional `Before` plugins, `Before` plugins whose
//! targets appear in the node's annotations, the node's children,
//! unconditional `After` plugins, then annotated `After` plugins. Nodes
//! without a category only have their children visited.
//!
//! Statements queued by plugins are visited by the same dispatcher and
//! spliced into the unit until no new statements are queued.

use crate::ast::{ClassMember, Decorator, Expr, Param, SourceUnit, Stmt};
use crate::imports::ImportManager;
use crate::plugin::{InsertAt, Node, NodeCategory, NodeTransformer, Phase, PluginContext, PluginRegistry};
use crate::reference::ReferenceResolver;
use crate::semantic::{Annotation, SemanticModel};
use crate::{PluginError, TransformError, TransformResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rounds of queued statements drained before giving up
pub const MAX_DRAIN_ROUNDS: usize = 64;

/// Toolchain packages whose compile-time units are only import-normalized
pub const TOOLCHAIN_PACKAGES: [&str; 3] = ["@loom/compiler", "@loom/manifest", "@loom/transformer"];

/// Per-unit mutable state shared by all plugin invocations
struct UnitState {
    path: PathBuf,
    unit_id: Option<String>,
    imports: ImportManager,
    queue: Vec<(InsertAt, Stmt)>,
}

/// Position of the node being visited
#[derive(Debug, Clone, Default)]
struct Scope {
    annotations: Vec<Annotation>,
    /// Index of the enclosing top-level statement
    index: Option<usize>,
    /// Enclosing class
    owner: Option<String>,
}

impl Scope {
    fn nested(&self, annotations: Vec<Annotation>) -> Self {
        Self {
            annotations,
            index: self.index,
            owner: self.owner.clone(),
        }
    }
}

pub struct Dispatcher<'a> {
    registry: &'a PluginRegistry,
    semantic: &'a dyn SemanticModel,
    references: &'a dyn ReferenceResolver,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a PluginRegistry,
        semantic: &'a dyn SemanticModel,
        references: &'a dyn ReferenceResolver,
    ) -> Self {
        Self {
            registry,
            semantic,
            references,
        }
    }

    /// Whether a unit belongs to the toolchain's own compile-time code
    pub fn is_passthrough(&self, path: &Path) -> bool {
        self.references.locate(path).is_some_and(|location| {
            location.compile_time_only && TOOLCHAIN_PACKAGES.contains(&location.module.as_str())
        })
    }

    /// Run every plugin over a unit, drain queued statements and finalize imports
    pub fn transform(&self, unit: SourceUnit) -> TransformResult<SourceUnit> {
        let path = unit.path.clone();
        if self.is_passthrough(&path) {
            debug!(unit = %path.display(), "toolchain unit, normalizing imports only");
            return Ok(ImportManager::new().finalize(unit, self.semantic, self.references));
        }

        let mut state = UnitState {
            unit_id: self.references.id_of(&path),
            path: path.clone(),
            imports: ImportManager::new(),
            queue: Vec::new(),
        };

        let unit = self
            .visit_unit(unit, &mut state)
            .map_err(|e| TransformError::plugin(&path, e))?;
        let unit = self.drain(unit, &mut state)?;

        let UnitState { imports, .. } = state;
        Ok(imports.finalize(unit, self.semantic, self.references))
    }

    fn drain(&self, mut unit: SourceUnit, state: &mut UnitState) -> TransformResult<SourceUnit> {
        let mut rounds = 0;
        while !state.queue.is_empty() {
            if rounds == MAX_DRAIN_ROUNDS {
                return Err(TransformError::DrainLimit {
                    path: state.path.clone(),
                    rounds,
                });
            }
            rounds += 1;

            let batch = std::mem::take(&mut state.queue);
            debug!(unit = %state.path.display(), round = rounds, statements = batch.len(), "draining queued statements");
            let mut visited = Vec::with_capacity(batch.len());
            for (at, stmt) in batch {
                let stmt = self
                    .visit_stmt(stmt, &Scope::default(), state)
                    .map_err(|e| TransformError::plugin(&state.path, e))?;
                visited.push((at, stmt));
            }
            splice(&mut unit.statements, visited);
        }
        Ok(unit)
    }

    fn visit_unit(&self, unit: SourceUnit, state: &mut UnitState) -> Result<SourceUnit, PluginError> {
        let scope = Scope::default();
        let node = self.run_phase(Node::Unit(unit), NodeCategory::File, Phase::Before, &scope, state)?;
        let mut unit = into_unit(node)?;

        let statements = std::mem::take(&mut unit.statements);
        unit.statements = statements
            .into_iter()
            .enumerate()
            .map(|(index, stmt)| {
                let scope = Scope {
                    index: Some(index),
                    ..Scope::default()
                };
                self.visit_stmt(stmt, &scope, state)
            })
            .collect::<Result<_, _>>()?;

        let node = self.run_phase(Node::Unit(unit), NodeCategory::File, Phase::After, &scope, state)?;
        into_unit(node)
    }

    fn visit_stmt(&self, stmt: Stmt, scope: &Scope, state: &mut UnitState) -> Result<Stmt, PluginError> {
        let Some(category) = NodeCategory::of_stmt(&stmt) else {
            return self.stmt_children(stmt, scope, state);
        };
        let annotations = match &stmt {
            Stmt::Class(class) => self.annotations(&class.decorators, &state.path),
            _ => Vec::new(),
        };
        let scope = scope.nested(annotations);

        let node = self.run_phase(Node::Stmt(stmt), category, Phase::Before, &scope, state)?;
        let stmt = self.stmt_children(into_stmt(node)?, &scope, state)?;
        let node = self.run_phase(Node::Stmt(stmt), category, Phase::After, &scope, state)?;
        into_stmt(node)
    }

    fn stmt_children(&self, stmt: Stmt, scope: &Scope, state: &mut UnitState) -> Result<Stmt, PluginError> {
        Ok(match stmt {
            Stmt::Class(mut class) => {
                let member_scope = Scope {
                    annotations: Vec::new(),
                    index: scope.index,
                    owner: Some(class.name.clone()),
                };
                class.members = class
                    .members
                    .into_iter()
                    .map(|m| self.visit_member(m, &member_scope, state))
                    .collect::<Result<_, _>>()?;
                Stmt::Class(class)
            }
            Stmt::Function(mut function) => {
                let inner = scope.nested(Vec::new());
                function.params = self.visit_params(function.params, &inner, state)?;
                function.body = self.visit_body(function.body, &inner, state)?;
                Stmt::Function(function)
            }
            Stmt::Variable(mut variable) => {
                variable.init = self.visit_opt_expr(variable.init, scope, state)?;
                Stmt::Variable(variable)
            }
            Stmt::Expr(expr) => Stmt::Expr(self.visit_expr(expr, scope, state)?),
            Stmt::Return(expr) => Stmt::Return(self.visit_opt_expr(expr, scope, state)?),
            other => other,
        })
    }

    fn visit_member(&self, member: ClassMember, scope: &Scope, state: &mut UnitState) -> Result<ClassMember, PluginError> {
        let category = NodeCategory::of_member(&member);
        let scope = scope.nested(self.annotations(member.decorators(), &state.path));

        let node = self.run_phase(Node::Member(member), category, Phase::Before, &scope, state)?;
        let inner = scope.nested(Vec::new());
        let member = match into_member(node)? {
            ClassMember::Constructor(mut ctor) => {
                ctor.params = self.visit_params(ctor.params, &inner, state)?;
                ctor.body = self.visit_body(ctor.body, &inner, state)?;
                ClassMember::Constructor(ctor)
            }
            ClassMember::Method(mut method) => {
                method.params = self.visit_params(method.params, &inner, state)?;
                method.body = self.visit_body(method.body, &inner, state)?;
                ClassMember::Method(method)
            }
            ClassMember::Property(mut property) => {
                property.init = self.visit_opt_expr(property.init, &inner, state)?;
                ClassMember::Property(property)
            }
            ClassMember::Getter(mut accessor) => {
                accessor.body = self.visit_body(accessor.body, &inner, state)?;
                ClassMember::Getter(accessor)
            }
            ClassMember::Setter(mut accessor) => {
                accessor.params = self.visit_params(accessor.params, &inner, state)?;
                accessor.body = self.visit_body(accessor.body, &inner, state)?;
                ClassMember::Setter(accessor)
            }
        };
        let node = self.run_phase(Node::Member(member), category, Phase::After, &scope, state)?;
        into_member(node)
    }

    fn visit_params(&self, params: Vec<Param>, scope: &Scope, state: &mut UnitState) -> Result<Vec<Param>, PluginError> {
        params
            .into_iter()
            .map(|param| {
                let scope = scope.nested(self.annotations(&param.decorators, &state.path));
                let node = self.run_phase(Node::Param(param), NodeCategory::Parameter, Phase::Before, &scope, state)?;
                let node = self.run_phase(node, NodeCategory::Parameter, Phase::After, &scope, state)?;
                into_param(node)
            })
            .collect()
    }

    fn visit_body(&self, body: Vec<Stmt>, scope: &Scope, state: &mut UnitState) -> Result<Vec<Stmt>, PluginError> {
        body.into_iter()
            .map(|stmt| self.visit_stmt(stmt, scope, state))
            .collect()
    }

    fn visit_opt_expr(&self, expr: Option<Expr>, scope: &Scope, state: &mut UnitState) -> Result<Option<Expr>, PluginError> {
        expr.map(|e| self.visit_expr(e, scope, state)).transpose()
    }

    fn visit_expr(&self, expr: Expr, scope: &Scope, state: &mut UnitState) -> Result<Expr, PluginError> {
        let is_call = matches!(expr, Expr::Call { .. });
        let expr = if is_call {
            into_expr(self.run_phase(Node::Expr(expr), NodeCategory::Call, Phase::Before, scope, state)?)?
        } else {
            expr
        };

        let expr = match expr {
            Expr::Call { callee, args } => Expr::Call {
                callee: Box::new(self.visit_expr(*callee, scope, state)?),
                args: args
                    .into_iter()
                    .map(|a| self.visit_expr(a, scope, state))
                    .collect::<Result<_, _>>()?,
            },
            Expr::Member { object, property } => Expr::Member {
                object: Box::new(self.visit_expr(*object, scope, state)?),
                property,
            },
            Expr::Object(fields) => Expr::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| self.visit_expr(v, scope, state).map(|v| (k, v)))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Array(items) => Expr::Array(
                items
                    .into_iter()
                    .map(|i| self.visit_expr(i, scope, state))
                    .collect::<Result<_, _>>()?,
            ),
            leaf => leaf,
        };

        if is_call {
            into_expr(self.run_phase(Node::Expr(expr), NodeCategory::Call, Phase::After, scope, state)?)
        } else {
            Ok(expr)
        }
    }

    /// Run the unconditional, then the annotation-matched plugins of one phase.
    ///
    /// Annotations are read again from the node after the unconditional
    /// plugins ran, so matching sees the decorators they left behind.
    fn run_phase(
        &self,
        mut node: Node,
        category: NodeCategory,
        phase: Phase,
        scope: &Scope,
        state: &mut UnitState,
    ) -> Result<Node, PluginError> {
        let plugins = self.registry.plugins(category, phase);
        let (unconditional, annotated): (Vec<_>, Vec<_>) = plugins.partition(|p| p.is_unconditional());
        if unconditional.is_empty() && annotated.is_empty() {
            return Ok(node);
        }

        let mut ctx = PluginContext {
            unit: &state.path,
            unit_id: state.unit_id.clone(),
            semantic: self.semantic,
            references: self.references,
            imports: &mut state.imports,
            queue: &mut state.queue,
            annotations: scope.annotations.clone(),
            statement_index: scope.index,
            owner: scope.owner.clone(),
        };

        for plugin in unconditional {
            node = apply_checked(plugin, node, &mut ctx)?;
        }
        if annotated.is_empty() {
            return Ok(node);
        }

        if let Some(decorators) = node.decorators() {
            ctx.annotations = self.annotations(decorators, ctx.unit);
        }
        let matched: Vec<_> = annotated
            .into_iter()
            .filter(|p| p.matches(&ctx.annotations))
            .collect();
        for plugin in matched {
            node = apply_checked(plugin, node, &mut ctx)?;
        }
        Ok(node)
    }

    fn annotations(&self, decorators: &[Decorator], unit: &Path) -> Vec<Annotation> {
        decorators
            .iter()
            .filter_map(|d| self.semantic.annotation(unit, d))
            .collect()
    }
}

/// Apply one plugin; it must hand back a node of the kind it received
fn apply_checked(plugin: &NodeTransformer, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
    let expected = node.kind();
    let node = plugin.apply(node, ctx)?;
    if node.kind() != expected {
        return Err(PluginError::UnexpectedNode {
            plugin: plugin.name.clone(),
            expected,
            found: node.kind(),
        });
    }
    Ok(node)
}

/// Insert visited statements: indexed ones first (they refer to positions
/// before this batch), then `Start`, then `End`, keeping queue order
fn splice(statements: &mut Vec<Stmt>, batch: Vec<(InsertAt, Stmt)>) {
    let mut before = Vec::new();
    let mut start = Vec::new();
    let mut end = Vec::new();
    for (at, stmt) in batch {
        match at {
            InsertAt::Before(index) => before.push((index, stmt)),
            InsertAt::Start => start.push(stmt),
            InsertAt::End => end.push(stmt),
        }
    }

    before.sort_by_key(|(index, _)| *index);
    for (index, stmt) in before.into_iter().rev() {
        let index = index.min(statements.len());
        statements.insert(index, stmt);
    }
    for stmt in start.into_iter().rev() {
        statements.insert(0, stmt);
    }
    statements.extend(end);
}

fn unexpected(expected: &'static str, node: &Node) -> PluginError {
    PluginError::UnexpectedNode {
        plugin: "dispatch".to_string(),
        expected,
        found: node.kind(),
    }
}

fn into_unit(node: Node) -> Result<SourceUnit, PluginError> {
    match node {
        Node::Unit(unit) => Ok(unit),
        other => Err(unexpected("unit", &other)),
    }
}

fn into_stmt(node: Node) -> Result<Stmt, PluginError> {
    match node {
        Node::Stmt(stmt) => Ok(stmt),
        other => Err(unexpected("statement", &other)),
    }
}

fn into_member(node: Node) -> Result<ClassMember, PluginError> {
    match node {
        Node::Member(member) => Ok(member),
        other => Err(unexpected("class member", &other)),
    }
}

fn into_param(node: Node) -> Result<Param, PluginError> {
    match node {
        Node::Param(param) => Ok(param),
        other => Err(unexpected("parameter", &other)),
    }
}

fn into_expr(node: Node) -> Result<Expr, PluginError> {
    match node {
        Node::Expr(expr) => Ok(expr),
        other => Err(unexpected("expression", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expr_stmt(name: &str) -> Stmt {
        Stmt::Expr(Expr::ident(name))
    }

    fn names(statements: &[Stmt]) -> Vec<String> {
        statements
            .iter()
            .map(|s| match s {
                Stmt::Expr(Expr::Ident(n)) => n.clone(),
                other => other.kind().to_string(),
            })
            .collect()
    }

    #[test]
    fn test_splice_keeps_queue_order() {
        let mut statements = vec![expr_stmt("a"), expr_stmt("b"), expr_stmt("c")];
        splice(
            &mut statements,
            vec![
                (InsertAt::End, expr_stmt("z")),
                (InsertAt::Before(1), expr_stmt("x1")),
                (InsertAt::Start, expr_stmt("s1")),
                (InsertAt::Before(1), expr_stmt("x2")),
                (InsertAt::Before(3), expr_stmt("y")),
                (InsertAt::Start, expr_stmt("s2")),
                (InsertAt::Before(99), expr_stmt("w")),
            ],
        );
        assert_eq!(
            names(&statements),
            vec!["s1", "s2", "a", "x1", "x2", "b", "c", "y", "w", "z"]
        );
    }
}

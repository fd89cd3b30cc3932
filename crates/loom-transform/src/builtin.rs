//! Plugins every build installs

use crate::ast::{ClassMember, Expr, ImportBinding, Stmt};
use crate::plugin::{Node, NodeCategory, NodeTransformer, Phase, PluginContext, PluginRegistry, Transformer};
use crate::PluginError;
use tracing::debug;

/// Module the emitted registration calls import from
pub const RUNTIME_MODULE: &str = "@loom/runtime";

/// Local name of the runtime registry in transformed units
pub const RUNTIME_BINDING: &str = "__loom";

pub const CLASS_IDENTITY: &str = "class identity";
pub const SHAPE_METADATA: &str = "shape metadata";

/// Register the built-in plugins
pub fn install(registry: &mut PluginRegistry) {
    registry.register(NodeTransformer::new(
        CLASS_IDENTITY,
        NodeCategory::Class,
        Phase::After,
        ClassIdentity,
    ));
    registry.register(NodeTransformer::new(
        SHAPE_METADATA,
        NodeCategory::Property,
        Phase::After,
        ShapeMetadata,
    ));
}

fn runtime_call(ctx: &mut PluginContext<'_>, function: &str, args: Vec<Expr>) -> Stmt {
    ctx.require_import(RUNTIME_MODULE, ImportBinding::aliased("registry", RUNTIME_BINDING));
    Stmt::Expr(Expr::call(Expr::member(Expr::ident(RUNTIME_BINDING), function), args))
}

/// Emits `__loom.registerClass(Class, "<unit id>:Class", [methods])` after each class
pub struct ClassIdentity;

impl Transformer for ClassIdentity {
    fn transform(&self, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
        let Node::Stmt(Stmt::Class(class)) = &node else {
            return Ok(node);
        };

        let id = format!("{}:{}", ctx.unit_id(), class.name);
        let methods = class.method_names().into_iter().map(Expr::string).collect();
        debug!(class = %class.name, id = %id, "registering class identity");

        let stmt = runtime_call(
            ctx,
            "registerClass",
            vec![Expr::ident(class.name.clone()), Expr::string(id), Expr::Array(methods)],
        );
        ctx.insert_after_current(stmt);
        Ok(node)
    }
}

/// Emits `__loom.describeField(Class, "field", <type>)` for annotated, typed properties
pub struct ShapeMetadata;

impl Transformer for ShapeMetadata {
    fn transform(&self, node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
        let Node::Member(ClassMember::Property(property)) = &node else {
            return Ok(node);
        };
        if ctx.annotations().is_empty() {
            return Ok(node);
        }
        let Some(ty) = property.ty.as_ref().and_then(|t| t.id) else {
            return Ok(node);
        };
        let Some(owner) = ctx.owner().map(str::to_string) else {
            return Ok(node);
        };

        let resolved = ctx.resolve_type(ty)?;
        let description =
            serde_json::to_value(&resolved).map_err(|e| PluginError::failed(SHAPE_METADATA, e))?;

        let stmt = runtime_call(
            ctx,
            "describeField",
            vec![
                Expr::ident(owner),
                Expr::string(property.name.clone()),
                Expr::from_json(&description),
            ],
        );
        ctx.insert_after_current(stmt);
        Ok(node)
    }
}

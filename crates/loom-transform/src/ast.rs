//! Source unit tree
//!
//! The subset of the source language the transform pipeline works on. A
//! compiler host parses files into this tree; type annotations carry the
//! [`TypeId`] the host's checker assigned to them.

use crate::semantic::TypeId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One parsed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub statements: Vec<Stmt>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, statements: Vec<Stmt>) -> Self {
        Self {
            path: path.into(),
            statements,
        }
    }

    /// Import declarations of the unit
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.statements.iter().filter_map(|s| match s {
            Stmt::Import(import) => Some(import),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Import(ImportDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    TypeAlias(TypeAliasDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
    Expr(Expr),
    Return(Option<Expr>),
}

impl Stmt {
    /// Short kind name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::Import(_) => "import",
            Stmt::Class(_) => "class",
            Stmt::Interface(_) => "interface",
            Stmt::TypeAlias(_) => "type alias",
            Stmt::Function(_) => "function",
            Stmt::Variable(_) => "variable",
            Stmt::Expr(_) => "expression statement",
            Stmt::Return(_) => "return",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub specifier: String,
    pub bindings: Vec<ImportBinding>,
    /// `import type { ... }`
    pub type_only: bool,
}

impl ImportDecl {
    pub fn new(specifier: impl Into<String>, bindings: Vec<ImportBinding>) -> Self {
        Self {
            specifier: specifier.into(),
            bindings,
            type_only: false,
        }
    }
}

/// `imported as local`; `imported` is `default` or `*` for default and namespace imports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub imported: String,
    pub local: String,
}

impl ImportBinding {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            imported: name.clone(),
            local: name,
        }
    }

    pub fn aliased(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            imported: imported.into(),
            local: local.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decorator {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

impl Decorator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// Type annotation as written, plus the checker's type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAnnotation {
    pub text: String,
    pub id: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub exported: bool,
    pub decorators: Vec<Decorator>,
    pub extends: Option<String>,
    pub members: Vec<ClassMember>,
}

impl ClassDecl {
    /// Names of all methods, static ones included
    pub fn method_names(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Method(method) => Some(method.name.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassMember {
    Constructor(ConstructorDecl),
    Method(MethodDecl),
    Property(PropertyDecl),
    Getter(AccessorDecl),
    Setter(AccessorDecl),
}

impl ClassMember {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassMember::Constructor(_) => "constructor",
            ClassMember::Method(_) => "method",
            ClassMember::Property(_) => "property",
            ClassMember::Getter(_) => "getter",
            ClassMember::Setter(_) => "setter",
        }
    }

    pub fn decorators(&self) -> &[Decorator] {
        match self {
            ClassMember::Constructor(_) => &[],
            ClassMember::Method(m) => &m.decorators,
            ClassMember::Property(p) => &p.decorators,
            ClassMember::Getter(a) | ClassMember::Setter(a) => &a.decorators,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub is_static: bool,
    pub decorators: Vec<Decorator>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub return_type: Option<TypeAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    pub is_static: bool,
    pub decorators: Vec<Decorator>,
    pub ty: Option<TypeAnnotation>,
    pub init: Option<Expr>,
}

/// Getter or setter; setters have exactly one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub ty: Option<TypeAnnotation>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decorators: Vec::new(),
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub exported: bool,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: String,
    pub exported: bool,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub exported: bool,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    Const,
    Let,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub kind: VarKind,
    pub name: String,
    pub exported: bool,
    pub ty: Option<TypeAnnotation>,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident(String),
    Literal(Literal),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Member { object: Box<Expr>, property: String },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// `object.property`
    pub fn member(object: Expr, property: impl Into<String>) -> Self {
        Expr::Member {
            object: Box::new(object),
            property: property.into(),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// Convert a JSON value into an expression literal
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Expr::Literal(Literal::Null),
            Value::Bool(b) => Expr::Literal(Literal::Bool(*b)),
            Value::Number(n) => Expr::Literal(Literal::Number(n.as_f64().unwrap_or_default())),
            Value::String(s) => Expr::string(s.clone()),
            Value::Array(items) => Expr::Array(items.iter().map(Expr::from_json).collect()),
            Value::Object(map) => Expr::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Expr::from_json(v)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
}

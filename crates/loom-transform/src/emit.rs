//! JavaScript printer for transformed units
//!
//! Type-only constructs never reach the output: interfaces, type aliases,
//! `import type`, type annotations and decorators are erased.

use crate::ast::{ClassDecl, ClassMember, Expr, ImportDecl, Literal, Param, SourceUnit, Stmt, VarKind};
use std::fmt::Write;

const INDENT: &str = "  ";

/// Print a unit as JavaScript
pub fn print_unit(unit: &SourceUnit) -> String {
    let mut printer = Printer::default();
    for stmt in &unit.statements {
        printer.stmt(stmt);
    }
    printer.out
}

/// Print a single expression
pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, head: &str, body: &[Stmt]) {
        if body.is_empty() {
            self.line(&format!("{head} {{}}"));
            return;
        }
        self.line(&format!("{head} {{"));
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import(import) if import.type_only => {}
            Stmt::Import(import) => self.line(&import_line(import)),
            Stmt::Class(class) => self.class(class),
            Stmt::Interface(_) | Stmt::TypeAlias(_) => {}
            Stmt::Function(function) => {
                let head = format!(
                    "{}function {}({})",
                    export_prefix(function.exported),
                    function.name,
                    params(&function.params)
                );
                self.block(&head, &function.body);
            }
            Stmt::Variable(variable) => {
                let keyword = match variable.kind {
                    VarKind::Const => "const",
                    VarKind::Let => "let",
                };
                let mut text = format!("{}{keyword} {}", export_prefix(variable.exported), variable.name);
                if let Some(init) = &variable.init {
                    text.push_str(" = ");
                    write_expr(&mut text, init);
                }
                text.push(';');
                self.line(&text);
            }
            Stmt::Expr(expr) => self.line(&format!("{};", print_expr(expr))),
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(expr)) => self.line(&format!("return {};", print_expr(expr))),
        }
    }

    fn class(&mut self, class: &ClassDecl) {
        let mut head = format!("{}class {}", export_prefix(class.exported), class.name);
        if let Some(base) = &class.extends {
            let _ = write!(head, " extends {base}");
        }
        if class.members.is_empty() {
            self.line(&format!("{head} {{}}"));
            return;
        }

        self.line(&format!("{head} {{"));
        self.depth += 1;
        for member in &class.members {
            self.member(member);
        }
        self.depth -= 1;
        self.line("}");
    }

    fn member(&mut self, member: &ClassMember) {
        match member {
            ClassMember::Constructor(ctor) => {
                self.block(&format!("constructor({})", params(&ctor.params)), &ctor.body);
            }
            ClassMember::Method(method) => {
                let head = format!(
                    "{}{}({})",
                    static_prefix(method.is_static),
                    method.name,
                    params(&method.params)
                );
                self.block(&head, &method.body);
            }
            ClassMember::Property(property) => {
                let mut text = format!("{}{}", static_prefix(property.is_static), property.name);
                if let Some(init) = &property.init {
                    text.push_str(" = ");
                    write_expr(&mut text, init);
                }
                text.push(';');
                self.line(&text);
            }
            ClassMember::Getter(accessor) => {
                self.block(&format!("get {}()", accessor.name), &accessor.body);
            }
            ClassMember::Setter(accessor) => {
                let head = format!("set {}({})", accessor.name, params(&accessor.params));
                self.block(&head, &accessor.body);
            }
        }
    }
}

fn export_prefix(exported: bool) -> &'static str {
    if exported {
        "export "
    } else {
        ""
    }
}

fn static_prefix(is_static: bool) -> &'static str {
    if is_static {
        "static "
    } else {
        ""
    }
}

fn params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn import_line(import: &ImportDecl) -> String {
    let specifier = quote(&import.specifier);
    if import.bindings.is_empty() {
        return format!("import {specifier};");
    }
    let bindings = import
        .bindings
        .iter()
        .map(|b| {
            if b.imported == b.local {
                b.local.clone()
            } else {
                format!("{} as {}", b.imported, b.local)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("import {{ {bindings} }} from {specifier};")
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Ident(name) => out.push_str(name),
        Expr::Literal(literal) => write_literal(out, literal),
        Expr::Call { callee, args } => {
            write_expr(out, callee);
            out.push('(');
            write_list(out, args);
            out.push(')');
        }
        Expr::Member { object, property } => {
            write_expr(out, object);
            out.push('.');
            out.push_str(property);
        }
        Expr::Object(fields) if fields.is_empty() => out.push_str("{}"),
        Expr::Object(fields) => {
            out.push_str("{ ");
            for (i, (key, value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&quote(key));
                out.push_str(": ");
                write_expr(out, value);
            }
            out.push_str(" }");
        }
        Expr::Array(items) => {
            out.push('[');
            write_list(out, items);
            out.push(']');
        }
    }
}

fn write_list(out: &mut String, items: &[Expr]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item);
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::String(s) => out.push_str(&quote(s)),
        // integral values print without a fraction
        Literal::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            let _ = write!(out, "{}", *n as i64);
        }
        Literal::Number(n) if n.is_nan() => out.push_str("NaN"),
        Literal::Number(n) if n.is_infinite() => {
            out.push_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
        }
        Literal::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Literal::Bool(b) => {
            let _ = write!(out, "{b}");
        }
        Literal::Null => out.push_str("null"),
        Literal::Undefined => out.push_str("undefined"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Decorator, ImportBinding, InterfaceDecl, MethodDecl, PropertyDecl, TypeAnnotation,
        VariableDecl,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_erases_type_only_constructs() {
        let mut type_import = ImportDecl::new("./types", vec![ImportBinding::named("Shape")]);
        type_import.type_only = true;

        let class = ClassDecl {
            name: "UserService".into(),
            exported: true,
            decorators: vec![Decorator::new("Injectable")],
            extends: Some("Base".into()),
            members: vec![
                ClassMember::Property(PropertyDecl {
                    name: "count".into(),
                    is_static: true,
                    decorators: vec![Decorator::new("Field")],
                    ty: Some(TypeAnnotation {
                        text: "number".into(),
                        id: None,
                    }),
                    init: Some(Expr::Literal(Literal::Number(0.0))),
                }),
                ClassMember::Method(MethodDecl {
                    name: "find".into(),
                    is_static: false,
                    decorators: vec![],
                    params: vec![Param::new("id")],
                    body: vec![Stmt::Return(Some(Expr::call(
                        Expr::member(Expr::ident("this"), "load"),
                        vec![Expr::ident("id")],
                    )))],
                    return_type: None,
                }),
            ],
        };

        let unit = SourceUnit::new(
            "/ws/src/user.ts",
            vec![
                Stmt::Import(type_import),
                Stmt::Import(ImportDecl::new(
                    "@loom/runtime",
                    vec![ImportBinding::aliased("registry", "__loom")],
                )),
                Stmt::Interface(InterfaceDecl {
                    name: "Shape".into(),
                    exported: true,
                    ty: None,
                }),
                Stmt::Class(class),
                Stmt::Variable(VariableDecl {
                    kind: VarKind::Const,
                    name: "meta".into(),
                    exported: false,
                    ty: None,
                    init: Some(Expr::Object(vec![
                        ("name".into(), Expr::string("a \"b\"")),
                        ("tags".into(), Expr::Array(vec![Expr::Literal(Literal::Bool(true))])),
                    ])),
                }),
            ],
        );

        let expected = r#"import { registry as __loom } from "@loom/runtime";
export class UserService extends Base {
  static count = 0;
  find(id) {
    return this.load(id);
  }
}
const meta = { "name": "a \"b\"", "tags": [true] };
"#;
        assert_eq!(print_unit(&unit), expected);
    }

    #[test]
    fn test_literals() {
        assert_eq!(print_expr(&Expr::Literal(Literal::Number(1.5))), "1.5");
        assert_eq!(print_expr(&Expr::Literal(Literal::Number(-3.0))), "-3");
        assert_eq!(print_expr(&Expr::Literal(Literal::Undefined)), "undefined");
        assert_eq!(print_expr(&Expr::Object(vec![])), "{}");
        assert_eq!(print_expr(&Expr::string("line\nbreak")), r#""line\nbreak""#);
    }

    #[test]
    fn test_side_effect_import_and_empty_bodies() {
        let unit = SourceUnit::new(
            "/ws/src/main.ts",
            vec![
                Stmt::Import(ImportDecl::new("./polyfill.js", vec![])),
                Stmt::Class(ClassDecl {
                    name: "Empty".into(),
                    exported: false,
                    decorators: vec![],
                    extends: None,
                    members: vec![],
                }),
                Stmt::Return(None),
            ],
        );
        assert_eq!(
            print_unit(&unit),
            "import \"./polyfill.js\";\nclass Empty {}\nreturn;\n"
        );
    }
}

//! P4-syntax printer.
//!
//! Output is deterministic: four-space indentation, one declaration or
//! statement per line, branches always braced. Dumps and snapshot tests
//! rely on it.

use std::fmt::{self, Write as _};

use crate::decl::{Declaration, DeclarationKind, Method, Parameter, Program};
use crate::expr::{Expression, ExpressionKind};
use crate::stmt::{Block, Statement, StatementKind, SwitchLabel};
use crate::ty::Type;

pub fn print_program(program: &Program) -> String {
    let mut p = Printer::default();
    for decl in &program.declarations {
        p.declaration(decl);
    }
    p.out
}

pub fn print_declaration(decl: &Declaration) -> String {
    let mut p = Printer::default();
    p.declaration(decl);
    p.out
}

pub fn print_statement(stmt: &Statement) -> String {
    let mut p = Printer::default();
    p.statement(stmt);
    p.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn declaration(&mut self, decl: &Declaration) {
        let name = &decl.name;
        match &decl.kind {
            DeclarationKind::Header { fields } | DeclarationKind::Struct { fields } => {
                let keyword = if matches!(decl.kind, DeclarationKind::Header { .. }) {
                    "header"
                } else {
                    "struct"
                };
                self.line(format!("{keyword} {name} {{"));
                self.nested(|p| {
                    for field in fields {
                        p.line(format!("{} {};", field.ty, field.name));
                    }
                });
                self.line("}");
            }
            DeclarationKind::Extern(ext) => {
                self.line(format!("extern {name}{} {{", type_params(&ext.type_params)));
                self.nested(|p| {
                    for ctor in &ext.constructors {
                        p.line(format!("{name}({});", params(&ctor.params)));
                    }
                    for method in &ext.methods {
                        p.line(format!("{};", signature(method)));
                    }
                });
                self.line("}");
            }
            DeclarationKind::ExternFunction(method) => {
                self.line(format!("extern {};", signature(method)));
            }
            DeclarationKind::Action(action) => {
                self.line(format!("action {name}({}) {{", params(&action.params)));
                self.nested(|p| p.block_body(&action.body));
                self.line("}");
            }
            DeclarationKind::Table(table) => {
                self.line(format!("table {name} {{"));
                self.nested(|p| {
                    if !table.key.is_empty() {
                        p.line("key = {");
                        p.nested(|p| {
                            for key in &table.key {
                                p.line(format!("{}: {};", key.expression, key.match_kind));
                            }
                        });
                        p.line("}");
                    }
                    p.line("actions = {");
                    p.nested(|p| {
                        for action in &table.actions {
                            p.line(format!("{action};"));
                        }
                    });
                    p.line("}");
                    if let Some(default_action) = &table.default_action {
                        p.line(format!("default_action = {default_action};"));
                    }
                });
                self.line("}");
            }
            DeclarationKind::Control(control) => {
                let ctor = if control.ctor_params.is_empty() {
                    String::new()
                } else {
                    format!("({})", params(&control.ctor_params))
                };
                self.line(format!(
                    "control {name}{}({}){ctor} {{",
                    type_params(&control.type_params),
                    params(&control.apply_params)
                ));
                self.nested(|p| {
                    for local in &control.locals {
                        p.declaration(local);
                    }
                    p.line("apply {");
                    p.nested(|p| p.block_body(&control.body));
                    p.line("}");
                });
                self.line("}");
            }
            DeclarationKind::Package {
                type_params: tps,
                params: ps,
            } => {
                self.line(format!("package {name}{}({});", type_params(tps), params(ps)));
            }
            DeclarationKind::Instance { ty, args } => {
                self.line(format!("{ty}({}) {name};", exprs(args)));
            }
            DeclarationKind::Variable { ty, init: None } => {
                self.line(format!("{ty} {name};"));
            }
            DeclarationKind::Variable {
                ty,
                init: Some(init),
            } => {
                self.line(format!("{ty} {name} = {init};"));
            }
            DeclarationKind::Constant { ty, value } => {
                self.line(format!("const {ty} {name} = {value};"));
            }
        }
    }

    fn block_body(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.statement(stmt);
        }
    }

    /// `{ ... }` opened on the current line by the caller.
    fn braced(&mut self, stmt: &Statement) {
        self.nested(|p| match &stmt.kind {
            StatementKind::Block(block) => p.block_body(block),
            _ => p.statement(stmt),
        });
    }

    fn statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Block(block) => {
                self.line("{");
                self.nested(|p| p.block_body(block));
                self.line("}");
            }
            StatementKind::Assignment { left, right } => self.line(format!("{left} = {right};")),
            StatementKind::MethodCall(call) => self.line(format!("{call};")),
            StatementKind::If {
                condition,
                if_true,
                if_false,
            } => {
                self.line(format!("if ({condition}) {{"));
                self.braced(if_true);
                if let Some(if_false) = if_false {
                    self.line("} else {");
                    self.braced(if_false);
                }
                self.line("}");
            }
            StatementKind::Switch { expression, cases } => {
                self.line(format!("switch ({expression}) {{"));
                self.nested(|p| {
                    for case in cases {
                        let label = match &case.label {
                            SwitchLabel::Name(name) => name.as_str(),
                            SwitchLabel::Default => "default",
                        };
                        match &case.body {
                            Some(body) => {
                                p.line(format!("{label}: {{"));
                                p.nested(|p| p.block_body(body));
                                p.line("}");
                            }
                            None => p.line(format!("{label}:")),
                        }
                    }
                });
                self.line("}");
            }
            StatementKind::Declaration(decl) => self.declaration(decl),
            StatementKind::Return(None) => self.line("return;"),
            StatementKind::Return(Some(value)) => self.line(format!("return {value};")),
            StatementKind::Exit => self.line("exit;"),
            StatementKind::Empty => self.line(";"),
        }
    }
}

fn type_params(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("<{}>", names.join(", "))
    }
}

fn params(params: &[std::rc::Rc<Parameter>]) -> String {
    let mut out = String::new();
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}{} {}", p.direction, p.ty, p.name);
    }
    out
}

fn signature(method: &Method) -> String {
    format!(
        "{} {}{}({})",
        method.return_type,
        method.name,
        type_params(&method.type_params),
        params(&method.params)
    )
}

fn exprs(exprs: &[std::rc::Rc<Expression>]) -> String {
    let mut out = String::new();
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{e}");
    }
    out
}

/// Operands that need parentheses when nested under an operator.
fn operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    match expr.kind {
        ExpressionKind::Binary { .. } => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Constant { value, ty } => match **ty {
                Type::Bits { width, signed } => {
                    let tag = if signed { 's' } else { 'w' };
                    if *value < 0 {
                        write!(f, "-{width}{tag}{}", value.unsigned_abs())
                    } else {
                        write!(f, "{width}{tag}{value}")
                    }
                }
                _ => write!(f, "{value}"),
            },
            ExpressionKind::Bool(value) => write!(f, "{value}"),
            ExpressionKind::Path(name) => f.write_str(name),
            ExpressionKind::Member { expr, member } => {
                operand(f, expr)?;
                write!(f, ".{member}")
            }
            ExpressionKind::ArrayIndex { base, index } => {
                operand(f, base)?;
                write!(f, "[{index}]")
            }
            ExpressionKind::MethodCall {
                method,
                type_args,
                args,
            } => {
                write!(f, "{method}")?;
                if !type_args.is_empty() {
                    let tys: Vec<String> = type_args.iter().map(|t| t.to_string()).collect();
                    write!(f, "<{}>", tys.join(", "))?;
                }
                write!(f, "({})", exprs(args))
            }
            ExpressionKind::ConstructorCall { ty, args } => write!(f, "{ty}({})", exprs(args)),
            ExpressionKind::Unary { op, operand: inner } => {
                f.write_str(op.symbol())?;
                operand(f, inner)
            }
            ExpressionKind::Binary { op, left, right } => {
                operand(f, left)?;
                write!(f, " {op} ")?;
                operand(f, right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    #[test]
    fn literals() {
        assert_eq!(Expression::constant(5).to_string(), "5");
        assert_eq!(Expression::sized(5, 8).to_string(), "8w5");
        assert_eq!(Expression::boolean(true).to_string(), "true");
    }

    #[test]
    fn nested_operators_are_parenthesized() {
        let e = Expression::binary(
            BinaryOp::Mul,
            Expression::binary(BinaryOp::Add, Expression::path("a"), Expression::path("b")),
            Expression::constant(2),
        );
        assert_eq!(e.to_string(), "(a + b) * 2");
    }

    #[test]
    fn generic_call() {
        let e = Expression::call_generic(
            Expression::member(Expression::path("r"), "read"),
            vec![Type::bits(32)],
            vec![Expression::path("x")],
        );
        assert_eq!(e.to_string(), "r.read<bit<32>>(x)");
    }
}

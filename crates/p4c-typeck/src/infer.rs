//! Reference resolution and type inference over one program.
//!
//! A single walk in source order: every path is bound to its declaration,
//! every expression gets a type, writable locations are marked, and every
//! call records how it bound its callee's type parameters. Errors are
//! collected and the walk continues, typing the offending node as
//! [`Ty::Error`] so one mistake does not cascade.

use std::rc::Rc;

use p4c_common::SourceInfo;
use p4c_ir::{
    Action, Block, Declaration, DeclarationKind, Direction, Expression, ExpressionKind,
    ExternType, Method, Parameter, Program, Statement, StatementKind, Type, UnaryOp,
};

use crate::env::Scopes;
use crate::error::TypeError;
use crate::refs::{DeclRef, RefMap};
use crate::ty::{Bindings, MethodTy, ParamTy, Ty};
use crate::types::TypeMap;
use crate::Typeck;

pub(crate) fn infer(program: &Program) -> Typeck {
    let mut checker = Checker::default();
    checker.program(program);
    Typeck {
        refs: checker.refs,
        types: checker.types,
        errors: checker.errors,
    }
}

/// Built-in methods of headers and header stacks.
pub fn builtin_method(member: &str) -> Option<MethodTy> {
    let count = || ParamTy {
        name: "count".into(),
        direction: Direction::In,
        ty: Ty::InfInt,
    };
    match member {
        "isValid" => Some(MethodTy::new(vec![], Ty::Bool)),
        "setValid" | "setInvalid" => Some(MethodTy::new(vec![], Ty::Void)),
        "push_front" | "pop_front" => Some(MethodTy::new(vec![count()], Ty::Void)),
        _ => None,
    }
}

/// Bind the type parameters occurring in `param` from the argument type.
/// The first binding wins.
fn unify(param: &Ty, arg: &Ty, bindings: &mut Bindings) {
    match (param, arg) {
        (Ty::Param(name), _) => {
            if !arg.is_error() && !bindings.contains_key(name) {
                bindings.insert(name.clone(), arg.clone());
            }
        }
        (Ty::Decl { args: params, .. }, Ty::Decl { args, .. }) => {
            for (p, a) in params.iter().zip(args) {
                unify(p, a, bindings);
            }
        }
        (Ty::Stack { element: p, .. }, Ty::Stack { element: a, .. }) => unify(p, a, bindings),
        _ => {}
    }
}

fn callee_name(method: &Expression) -> String {
    match &method.kind {
        ExpressionKind::Path(name) => name.clone(),
        ExpressionKind::Member { member, .. } => member.clone(),
        _ => "expression".to_string(),
    }
}

#[derive(Default)]
struct Checker {
    scopes: Scopes,
    refs: RefMap,
    types: TypeMap,
    errors: Vec<TypeError>,
}

impl Checker {
    fn program(&mut self, program: &Program) {
        // Toplevel names are visible everywhere.
        for decl in &program.declarations {
            self.define(decl);
        }
        for decl in &program.declarations {
            self.declaration(decl);
        }
    }

    fn define(&mut self, decl: &Rc<Declaration>) {
        if let Some(previous) = self
            .scopes
            .define(&decl.name, DeclRef::Declaration(decl.clone()))
        {
            self.errors.push(TypeError::DuplicateDeclaration {
                name: decl.name.clone(),
                span: decl.span,
                previous: previous.span(),
            });
        }
    }

    fn define_param(&mut self, param: &Rc<Parameter>) {
        let ty = self.resolve_type(&param.ty, param.span);
        self.types.set_type(param.id, ty);
        if let Some(previous) = self
            .scopes
            .define(&param.name, DeclRef::Parameter(param.clone()))
        {
            self.errors.push(TypeError::DuplicateDeclaration {
                name: param.name.clone(),
                span: param.span,
                previous: previous.span(),
            });
        }
    }

    // ── Types ──────────────────────────────────────────────────────────

    fn resolve_type(&mut self, ty: &Type, span: Option<SourceInfo>) -> Ty {
        match ty {
            Type::Bool => Ty::Bool,
            Type::Bits { width, signed } => Ty::Bits {
                width: *width,
                signed: *signed,
            },
            Type::InfInt => Ty::InfInt,
            Type::Void => Ty::Void,
            Type::Named(name) => self.named_type(name, Vec::new(), span),
            Type::Specialized { base, args } => {
                let args = args.iter().map(|a| self.resolve_type(a, span)).collect();
                self.named_type(base, args, span)
            }
            Type::Stack { element, size } => Ty::Stack {
                element: Box::new(self.resolve_type(element, span)),
                size: *size,
            },
        }
    }

    fn named_type(&mut self, name: &str, args: Vec<Ty>, span: Option<SourceInfo>) -> Ty {
        if self.scopes.is_type_param(name) {
            return Ty::Param(name.to_string());
        }
        match self.scopes.lookup(name).and_then(|d| d.as_declaration()).cloned() {
            Some(decl) if decl.is_type() => {
                self.refs.mark_used(decl.id);
                Ty::Decl { decl, args }
            }
            _ => {
                self.errors.push(TypeError::UnknownType {
                    name: name.to_string(),
                    span,
                });
                Ty::Error
            }
        }
    }

    fn params_ty(&mut self, params: &[Rc<Parameter>]) -> Vec<ParamTy> {
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            let ty = self.resolve_type(&p.ty, p.span);
            self.types.set_type(p.id, ty.clone());
            out.push(ParamTy {
                name: p.name.clone(),
                direction: p.direction,
                ty,
            });
        }
        out
    }

    fn method_ty(&mut self, method: &Method) -> MethodTy {
        self.scopes.push_type_params(&method.type_params);
        let params = self.params_ty(&method.params);
        let ret = self.resolve_type(&method.return_type, method.span);
        self.scopes.pop_type_params();
        MethodTy {
            type_params: method.type_params.clone(),
            params,
            ret,
        }
    }

    /// Generic signature of an extern method: the extern's type parameters
    /// come first, then the method's own.
    fn extern_method_ty(&mut self, ext: &ExternType, method: &Method) -> MethodTy {
        self.scopes.push_type_params(&ext.type_params);
        let mut ty = self.method_ty(method);
        self.scopes.pop_type_params();
        let mut type_params = ext.type_params.clone();
        type_params.append(&mut ty.type_params);
        ty.type_params = type_params;
        ty
    }

    fn action_ty(&mut self, action: &Action) -> Rc<MethodTy> {
        let params = self.params_ty(&action.params);
        Rc::new(MethodTy::new(params, Ty::Void))
    }

    fn constructor_arity(&mut self, target: &Declaration, found: usize, span: Option<SourceInfo>) {
        let expected: Vec<usize> = match &target.kind {
            DeclarationKind::Extern(ext) if ext.constructors.is_empty() => vec![0],
            DeclarationKind::Extern(ext) => ext.constructors.iter().map(|c| c.params.len()).collect(),
            DeclarationKind::Control(control) => vec![control.ctor_params.len()],
            DeclarationKind::Package { params, .. } => vec![params.len()],
            _ => return,
        };
        if !expected.contains(&found) {
            self.errors.push(TypeError::ArgumentCount {
                callee: target.name.clone(),
                expected: expected[0],
                found,
                span,
            });
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn declaration(&mut self, decl: &Rc<Declaration>) {
        match &decl.kind {
            DeclarationKind::Header { fields } | DeclarationKind::Struct { fields } => {
                for field in fields {
                    self.resolve_type(&field.ty, decl.span);
                }
            }
            DeclarationKind::Extern(ext) => {
                for method in ext.constructors.iter().chain(&ext.methods) {
                    self.extern_method_ty(ext, method);
                }
            }
            DeclarationKind::ExternFunction(method) => {
                let ty = self.method_ty(method);
                self.types.set_type(decl.id, Ty::Method(Rc::new(ty)));
            }
            DeclarationKind::Action(action) => {
                let ty = self.action_ty(action);
                self.types.set_type(decl.id, Ty::Method(ty));
                self.scopes.push();
                for p in &action.params {
                    self.define_param(p);
                }
                self.statements(&action.body.statements);
                self.scopes.pop();
            }
            DeclarationKind::Table(table) => {
                for key in &table.key {
                    self.expression(&key.expression);
                }
                for action in &table.actions {
                    self.action_ref(action);
                }
                if let Some(default_action) = &table.default_action {
                    self.action_ref(default_action);
                }
                self.types.set_type(decl.id, Ty::Table(decl.clone()));
            }
            DeclarationKind::Control(control) => {
                self.scopes.push_type_params(&control.type_params);
                self.scopes.push();
                for p in control.ctor_params.iter().chain(&control.apply_params) {
                    self.define_param(p);
                }
                for local in &control.locals {
                    self.declaration(local);
                    self.define(local);
                }
                self.block(&control.body);
                self.scopes.pop();
                self.scopes.pop_type_params();
            }
            DeclarationKind::Package {
                type_params,
                params,
            } => {
                self.scopes.push_type_params(type_params);
                self.params_ty(params);
                self.scopes.pop_type_params();
            }
            DeclarationKind::Instance { ty, args } => {
                let instance_ty = self.resolve_type(ty, decl.span);
                for arg in args {
                    self.expression(arg);
                }
                if let Some(target) = instance_ty.decl() {
                    self.refs
                        .set_declaration(decl.id, DeclRef::Declaration(target.clone()));
                    self.constructor_arity(target, args.len(), decl.span);
                }
                self.types.set_type(decl.id, instance_ty);
            }
            DeclarationKind::Variable { ty, init } => {
                let declared = self.resolve_type(ty, decl.span);
                if let Some(init) = init {
                    let found = self.expression(init);
                    self.expect(&declared, &found, init.span.or(decl.span));
                }
                self.types.set_type(decl.id, declared);
            }
            DeclarationKind::Constant { ty, value } => {
                let declared = self.resolve_type(ty, decl.span);
                let found = self.expression(value);
                self.expect(&declared, &found, value.span.or(decl.span));
                self.types.set_type(decl.id, declared);
            }
        }
    }

    /// An entry of a table's action list: a path, or a call binding a
    /// prefix of the parameters (the rest come from the control plane).
    fn action_ref(&mut self, expr: &Rc<Expression>) {
        match &expr.kind {
            ExpressionKind::MethodCall { method, args, .. } => {
                let callee = self.expression(method);
                for arg in args {
                    self.expression(arg);
                }
                match &callee {
                    Ty::Method(sig) if args.len() > sig.arity() => {
                        self.errors.push(TypeError::ArgumentCount {
                            callee: callee_name(method),
                            expected: sig.arity(),
                            found: args.len(),
                            span: expr.span,
                        });
                    }
                    Ty::Method(_) | Ty::Error => {}
                    other => self.errors.push(TypeError::NotCallable {
                        ty: other.clone(),
                        span: method.span,
                    }),
                }
                self.types.set_type(expr.id, Ty::Void);
            }
            _ => {
                self.expression(expr);
            }
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn block(&mut self, block: &Block) {
        self.scopes.push();
        self.statements(&block.statements);
        self.scopes.pop();
    }

    fn statements(&mut self, stmts: &[Rc<Statement>]) {
        for stmt in stmts {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Block(block) => self.block(block),
            StatementKind::Assignment { left, right } => {
                let target = self.expression(left);
                let value = self.expression(right);
                if !target.is_error() && !self.types.is_left_value(left.id) {
                    self.errors.push(TypeError::NotLeftValue {
                        span: left.span.or(stmt.span),
                    });
                }
                self.expect(&target, &value, right.span.or(stmt.span));
            }
            StatementKind::MethodCall(call) => {
                self.expression(call);
            }
            StatementKind::If {
                condition,
                if_true,
                if_false,
            } => {
                let ty = self.expression(condition);
                if !ty.is_bool() && !ty.is_error() {
                    self.errors.push(TypeError::NonBooleanCondition {
                        found: ty,
                        span: condition.span.or(stmt.span),
                    });
                }
                self.statement(if_true);
                if let Some(if_false) = if_false {
                    self.statement(if_false);
                }
            }
            StatementKind::Switch { expression, cases } => {
                self.expression(expression);
                for case in cases {
                    if let Some(body) = &case.body {
                        self.block(body);
                    }
                }
            }
            StatementKind::Declaration(decl) => {
                self.declaration(decl);
                self.define(decl);
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            StatementKind::Exit | StatementKind::Empty => {}
        }
    }

    fn expect(&mut self, expected: &Ty, found: &Ty, span: Option<SourceInfo>) {
        if !expected.accepts(found) {
            self.errors.push(TypeError::Mismatch {
                expected: expected.clone(),
                found: found.clone(),
                span,
            });
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn expression(&mut self, expr: &Rc<Expression>) -> Ty {
        let ty = self.infer(expr);
        self.types.set_type(expr.id, ty.clone());
        ty
    }

    fn infer(&mut self, expr: &Rc<Expression>) -> Ty {
        match &expr.kind {
            ExpressionKind::Constant { ty, .. } => self.resolve_type(ty, expr.span),
            ExpressionKind::Bool(_) => Ty::Bool,
            ExpressionKind::Path(name) => self.path(expr, name),
            ExpressionKind::Member { expr: base, member } => {
                let base_ty = self.expression(base);
                self.member(expr, base, &base_ty, member, None)
            }
            ExpressionKind::ArrayIndex { base, index } => {
                let base_ty = self.expression(base);
                self.expression(index);
                match base_ty {
                    Ty::Stack { element, .. } => {
                        if self.types.is_left_value(base.id) {
                            self.types.set_left_value(expr.id);
                        }
                        *element
                    }
                    Ty::Error => Ty::Error,
                    other => {
                        self.errors.push(TypeError::UnknownMember {
                            ty: other,
                            member: "[]".into(),
                            span: expr.span,
                        });
                        Ty::Error
                    }
                }
            }
            ExpressionKind::MethodCall {
                method,
                type_args,
                args,
            } => self.call(expr, method, type_args, args),
            ExpressionKind::ConstructorCall { ty, args } => {
                let target_ty = self.resolve_type(ty, expr.span);
                for arg in args {
                    self.expression(arg);
                }
                if let Some(target) = target_ty.decl() {
                    self.refs
                        .set_declaration(expr.id, DeclRef::Declaration(target.clone()));
                    self.constructor_arity(target, args.len(), expr.span);
                }
                target_ty
            }
            ExpressionKind::Unary { op, operand } => {
                let ty = self.expression(operand);
                match op {
                    UnaryOp::Not => Ty::Bool,
                    UnaryOp::Neg | UnaryOp::Complement => ty,
                }
            }
            ExpressionKind::Binary { op, left, right } => {
                let left_ty = self.expression(left);
                let right_ty = self.expression(right);
                if op.is_boolean() {
                    Ty::Bool
                } else if matches!(left_ty, Ty::InfInt) {
                    right_ty
                } else {
                    left_ty
                }
            }
        }
    }

    fn path(&mut self, expr: &Expression, name: &str) -> Ty {
        let Some(target) = self.scopes.lookup(name).cloned() else {
            self.errors.push(TypeError::UnresolvedName {
                name: name.to_string(),
                span: expr.span,
            });
            return Ty::Error;
        };
        self.refs.set_declaration(expr.id, target.clone());
        match &target {
            DeclRef::Parameter(p) => {
                if p.direction.copies_out() {
                    self.types.set_left_value(expr.id);
                }
                self.types.get_type(p.id).cloned().unwrap_or(Ty::Error)
            }
            DeclRef::Declaration(decl) => match &decl.kind {
                DeclarationKind::Variable { .. } => {
                    self.types.set_left_value(expr.id);
                    self.types.get_type(decl.id).cloned().unwrap_or(Ty::Error)
                }
                DeclarationKind::Constant { .. } | DeclarationKind::Instance { .. } => {
                    self.types.get_type(decl.id).cloned().unwrap_or(Ty::Error)
                }
                DeclarationKind::Action(action) => Ty::Method(self.action_ty(action)),
                DeclarationKind::ExternFunction(method) => {
                    Ty::Method(Rc::new(self.method_ty(method)))
                }
                DeclarationKind::Table(_) => Ty::Table(decl.clone()),
                _ => Ty::Decl {
                    decl: decl.clone(),
                    args: Vec::new(),
                },
            },
        }
    }

    /// `arity` is known when the member is being called; it selects among
    /// overloaded extern methods.
    fn member(
        &mut self,
        expr: &Expression,
        base: &Expression,
        base_ty: &Ty,
        member: &str,
        arity: Option<usize>,
    ) -> Ty {
        let unknown = |ty: &Ty| TypeError::UnknownMember {
            ty: ty.clone(),
            member: member.to_string(),
            span: expr.span,
        };
        match base_ty {
            Ty::Error => Ty::Error,
            Ty::Decl { decl, .. } => match &decl.kind {
                DeclarationKind::Header { fields } | DeclarationKind::Struct { fields } => {
                    if let Some(field) = fields.iter().find(|f| f.name == member) {
                        if self.types.is_left_value(base.id) {
                            self.types.set_left_value(expr.id);
                        }
                        return self.resolve_type(&field.ty, expr.span);
                    }
                    let is_header = matches!(decl.kind, DeclarationKind::Header { .. });
                    match builtin_method(member) {
                        Some(method) if is_header && member != "push_front" && member != "pop_front" => {
                            Ty::Method(Rc::new(method))
                        }
                        _ => {
                            self.errors.push(unknown(base_ty));
                            Ty::Error
                        }
                    }
                }
                DeclarationKind::Extern(ext) => {
                    let method = match arity {
                        Some(n) => ext.lookup_method(member, n),
                        None => ext.methods.iter().find(|m| m.name == member),
                    };
                    match method {
                        Some(method) => Ty::Method(Rc::new(self.extern_method_ty(ext, method))),
                        None => {
                            match (arity, ext.methods.iter().find(|m| m.name == member)) {
                                (Some(found), Some(other)) => {
                                    self.errors.push(TypeError::ArgumentCount {
                                        callee: member.to_string(),
                                        expected: other.params.len(),
                                        found,
                                        span: expr.span,
                                    })
                                }
                                _ => self.errors.push(unknown(base_ty)),
                            }
                            Ty::Error
                        }
                    }
                }
                DeclarationKind::Control(control) if member == "apply" => {
                    let params = self.params_ty(&control.apply_params);
                    Ty::Method(Rc::new(MethodTy::new(params, Ty::Void)))
                }
                _ => {
                    self.errors.push(unknown(base_ty));
                    Ty::Error
                }
            },
            Ty::Table(table) if member == "apply" => Ty::Method(Rc::new(MethodTy::new(
                Vec::new(),
                Ty::ApplyResult(table.clone()),
            ))),
            Ty::ApplyResult(table) => match member {
                "hit" | "miss" => Ty::Bool,
                "action_run" => Ty::ActionEnum(table.clone()),
                _ => {
                    self.errors.push(unknown(base_ty));
                    Ty::Error
                }
            },
            Ty::Stack { element, .. } => match member {
                "next" | "last" => {
                    if self.types.is_left_value(base.id) {
                        self.types.set_left_value(expr.id);
                    }
                    (**element).clone()
                }
                "size" | "nextIndex" | "lastIndex" => Ty::bits(32),
                "push_front" | "pop_front" => match builtin_method(member) {
                    Some(method) => Ty::Method(Rc::new(method)),
                    None => Ty::Error,
                },
                _ => {
                    self.errors.push(unknown(base_ty));
                    Ty::Error
                }
            },
            _ => {
                self.errors.push(unknown(base_ty));
                Ty::Error
            }
        }
    }

    fn call(
        &mut self,
        expr: &Expression,
        method: &Rc<Expression>,
        type_args: &[Rc<Type>],
        args: &[Rc<Expression>],
    ) -> Ty {
        let callee = match &method.kind {
            ExpressionKind::Member { expr: base, member } => {
                let base_ty = self.expression(base);
                let ty = self.member(method, base, &base_ty, member, Some(args.len()));
                self.types.set_type(method.id, ty.clone());
                ty
            }
            _ => self.expression(method),
        };
        let arg_tys: Vec<Ty> = args.iter().map(|a| self.expression(a)).collect();

        let sig = match &callee {
            Ty::Method(sig) => sig.clone(),
            Ty::Error => return Ty::Error,
            other => {
                self.errors.push(TypeError::NotCallable {
                    ty: other.clone(),
                    span: method.span.or(expr.span),
                });
                return Ty::Error;
            }
        };
        if sig.arity() != args.len() {
            self.errors.push(TypeError::ArgumentCount {
                callee: callee_name(method),
                expected: sig.arity(),
                found: args.len(),
                span: expr.span,
            });
            return Ty::Error;
        }

        // Receiver type arguments, then explicit ones, then the arguments.
        let mut bindings = Bindings::default();
        if let ExpressionKind::Member { expr: base, .. } = &method.kind {
            if let Some(Ty::Decl { decl, args: receiver_args }) = self.types.get_type(base.id) {
                if let Some(ext) = decl.as_extern() {
                    for (param, arg) in ext.type_params.iter().zip(receiver_args) {
                        bindings.insert(param.clone(), arg.clone());
                    }
                }
            }
        }
        let own: Vec<String> = sig
            .type_params
            .iter()
            .filter(|p| !bindings.contains_key(*p))
            .cloned()
            .collect();
        for (param, arg) in own.into_iter().zip(type_args) {
            let ty = self.resolve_type(arg, expr.span);
            bindings.insert(param, ty);
        }
        for (param, arg_ty) in sig.params.iter().zip(&arg_tys) {
            unify(&param.ty, arg_ty, &mut bindings);
        }

        for ((param, arg), arg_ty) in sig.params.iter().zip(args).zip(&arg_tys) {
            if param.direction.copies_out()
                && !arg_ty.is_error()
                && !self.types.is_left_value(arg.id)
            {
                self.errors.push(TypeError::NotLeftValue { span: arg.span });
            }
            self.expect(&param.ty.substitute(&bindings), arg_ty, arg.span.or(expr.span));
        }

        let ret = sig.ret.substitute(&bindings);
        if !bindings.is_empty() {
            self.types.set_bindings(expr.id, bindings);
        }
        ret
    }
}

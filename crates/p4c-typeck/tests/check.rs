//! Integration tests for reference resolution and type inference.

use std::rc::Rc;

use p4c_ir::{
    Block, Declaration, Direction, Expression, ExpressionKind, Field, KeyElement, Method,
    Parameter, Program, Statement, Type,
};
use p4c_typeck::{check, DeclRef, Ty, TypeError};

// ── Helpers ────────────────────────────────────────────────────────────

fn headers() -> Vec<Rc<Declaration>> {
    vec![
        Declaration::header("h_t", vec![Field::new(Type::bits(8), "f")]),
        Declaration::structure("headers_t", vec![Field::new(Type::named("h_t"), "h")]),
    ]
}

fn hdr_param() -> Rc<Parameter> {
    Parameter::new(Direction::InOut, Type::named("headers_t"), "hdr")
}

fn hdr_h_f() -> Rc<Expression> {
    Expression::member(Expression::member(Expression::path("hdr"), "h"), "f")
}

fn program_with_body(locals: Vec<Rc<Declaration>>, body: Vec<Rc<Statement>>) -> Rc<Program> {
    let mut decls = headers();
    decls.push(Declaration::control(
        "ingress",
        vec![hdr_param()],
        locals,
        Block::new(body),
    ));
    Program::new(decls)
}

fn codes(errors: &[TypeError]) -> Vec<&'static str> {
    errors.iter().map(|e| e.code()).collect()
}

// ── Resolution ─────────────────────────────────────────────────────────

#[test]
fn member_chain_is_typed_and_writable() {
    let target = hdr_h_f();
    let assign = Statement::assign(target.clone(), Expression::sized(1, 8));
    let program = program_with_body(vec![], vec![assign]);

    let result = check(&program);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.types.get_type(target.id), Some(&Ty::bits(8)));
    assert!(result.types.is_left_value(target.id));

    let ExpressionKind::Member { expr: h, .. } = &target.kind else {
        panic!("expected member");
    };
    let ExpressionKind::Member { expr: hdr, .. } = &h.kind else {
        panic!("expected member");
    };
    let Some(DeclRef::Parameter(p)) = result.refs.get_declaration(hdr.id) else {
        panic!("hdr should resolve to the apply parameter");
    };
    assert_eq!(p.name, "hdr");
}

#[test]
fn locals_shadow_and_resolve_in_order() {
    let x = Declaration::variable("x", Type::bits(8), None);
    let use_x = Expression::path("x");
    let program = program_with_body(
        vec![x.clone()],
        vec![Statement::assign(hdr_h_f(), use_x.clone())],
    );

    let result = check(&program);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let resolved = result.refs.get_declaration(use_x.id).map(|d| d.id());
    assert_eq!(resolved, Some(x.id));
    assert!(result.refs.is_used(x.id));
}

#[test]
fn table_apply_result_members() {
    let table = Declaration::table(
        "t",
        vec![KeyElement::new(hdr_h_f(), "exact")],
        vec![Expression::path("a")],
        None,
    );
    let action = Declaration::action("a", vec![], Block::empty());
    let hit = Expression::member(
        Expression::call(Expression::member(Expression::path("t"), "apply"), vec![]),
        "hit",
    );
    let program = program_with_body(
        vec![action.clone(), table],
        vec![Statement::if_else(hit.clone(), Statement::empty(), None)],
    );

    let result = check(&program);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.types.get_type(hit.id), Some(&Ty::Bool));
    assert!(result.refs.is_used(action.id));
}

#[test]
fn generic_extern_function_records_bindings() {
    let hash = Declaration::extern_function(Method::new(
        Type::named("T"),
        "identity",
        vec!["T".into()],
        vec![Parameter::new(Direction::In, Type::named("T"), "data")],
    ));
    let call = Expression::call(Expression::path("identity"), vec![hdr_h_f()]);
    let mut decls = headers();
    decls.push(hash);
    decls.push(Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![],
        Block::new(vec![Statement::assign(hdr_h_f(), call.clone())]),
    ));
    let program = Program::new(decls);

    let result = check(&program);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.types.get_type(call.id), Some(&Ty::bits(8)));
    let bindings = result.types.bindings(call.id).expect("call binds T");
    assert_eq!(bindings.get("T"), Some(&Ty::bits(8)));
}

#[test]
fn extern_instance_type_arguments_bind_methods() {
    let register = Declaration::extern_type(
        "register",
        vec!["T".into()],
        vec![Method::new(
            Type::void(),
            "register",
            vec![],
            vec![Parameter::new(Direction::None, Type::bits(32), "size")],
        )],
        vec![Method::new(
            Type::void(),
            "read",
            vec![],
            vec![
                Parameter::new(Direction::Out, Type::named("T"), "result"),
                Parameter::new(Direction::In, Type::bits(32), "index"),
            ],
        )],
    );
    let instance = Declaration::instance(
        "r",
        Type::specialized("register", vec![Type::bits(8)]),
        vec![Expression::sized(16, 32)],
    );
    let call = Expression::call(
        Expression::member(Expression::path("r"), "read"),
        vec![hdr_h_f(), Expression::constant(0)],
    );
    let mut decls = headers();
    decls.push(register.clone());
    decls.push(Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![instance.clone()],
        Block::new(vec![Statement::call(call.clone())]),
    ));
    let program = Program::new(decls);

    let result = check(&program);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let bindings = result.types.bindings(call.id).expect("receiver binds T");
    assert_eq!(bindings.get("T"), Some(&Ty::bits(8)));
    let instantiated = result.refs.get_declaration(instance.id).map(|d| d.id());
    assert_eq!(instantiated, Some(register.id));
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn reports_unresolved_and_keeps_going() {
    let program = program_with_body(
        vec![],
        vec![
            Statement::assign(hdr_h_f(), Expression::path("missing")),
            Statement::if_else(Expression::sized(1, 8), Statement::empty(), None),
            Statement::assign(Expression::constant(1), Expression::constant(2)),
        ],
    );

    let result = check(&program);
    assert_eq!(codes(&result.errors), vec!["E0001", "E0003", "E0007"]);
    let rendered: Vec<String> = result.diagnostics().map(|d| d.to_string()).collect();
    assert_eq!(rendered[0], "error[E0001]: unresolved name `missing`");
    assert_eq!(rendered[1], "error[E0003]: condition must be `bool`, found `bit<8>`");
}

#[test]
fn reports_duplicates_and_arity() {
    let action = Declaration::action(
        "a",
        vec![Parameter::new(Direction::In, Type::bits(8), "v")],
        Block::empty(),
    );
    let program = program_with_body(
        vec![
            action,
            Declaration::variable("x", Type::bits(8), None),
            Declaration::variable("x", Type::bits(8), None),
        ],
        vec![Statement::call(Expression::call(Expression::path("a"), vec![]))],
    );

    let result = check(&program);
    assert_eq!(codes(&result.errors), vec!["E0002", "E0004"]);
    assert_eq!(
        result.errors[1].to_string(),
        "`a` expects 1 arguments, found 0"
    );
}

#[test]
fn reports_unknown_member_and_type() {
    let program = program_with_body(
        vec![Declaration::variable("y", Type::named("nope_t"), None)],
        vec![Statement::assign(
            Expression::member(Expression::path("hdr"), "g"),
            Expression::constant(0),
        )],
    );

    let result = check(&program);
    assert_eq!(codes(&result.errors), vec!["E0008", "E0006"]);
}

//! Control and action inlining through the full pipelines.

use std::rc::Rc;

use p4c_common::SourceMap;
use p4c_ir::print::print_program;
use p4c_ir::visit::{walk_declaration, walk_expression, walk_program, Visitor};
use p4c_ir::{
    Block, Declaration, DeclarationKind, Direction, Expression, ExpressionKind, Field, Parameter,
    Program, Statement, Type,
};
use p4c_midend::{Dialect, MidEnd, MidEndOptions, MidendError, PassContext};

fn hdr_param() -> Rc<Parameter> {
    Parameter::new(Direction::InOut, Type::named("headers_t"), "hdr")
}

fn field(name: &str) -> Rc<Expression> {
    Expression::member(Expression::member(Expression::path("hdr"), "h"), name)
}

/// Headers, a `Pipe(ingress ig)` package and `main`, around `controls`.
fn program(controls: Vec<Rc<Declaration>>) -> Rc<Program> {
    let mut decls = vec![
        Declaration::header(
            "h_t",
            vec![
                Field::new(Type::bits(8), "a"),
                Field::new(Type::bits(8), "b"),
                Field::new(Type::bits(8), "c"),
            ],
        ),
        Declaration::structure("headers_t", vec![Field::new(Type::named("h_t"), "h")]),
    ];
    decls.extend(controls);
    decls.push(Declaration::package(
        "Pipe",
        vec![],
        vec![Parameter::new(Direction::None, Type::named("ingress"), "ig")],
    ));
    decls.push(Declaration::instance(
        "main",
        Type::named("Pipe"),
        vec![Expression::constructor(Type::named("ingress"), vec![])],
    ));
    Program::new(decls)
}

fn apply(instance: &str) -> Rc<Statement> {
    Statement::call(Expression::call(
        Expression::member(Expression::path(instance), "apply"),
        vec![Expression::path("hdr")],
    ))
}

fn context(dialect: Dialect) -> PassContext {
    PassContext::new(
        SourceMap::new(),
        MidEndOptions {
            dialect,
            ..MidEndOptions::default()
        },
    )
}

/// Every declared name, with repetitions.
#[derive(Default)]
struct Names(Vec<String>);

impl Visitor for Names {
    fn visit_declaration(&mut self, decl: &Rc<Declaration>) {
        self.0.push(decl.name.clone());
        walk_declaration(self, decl)
    }
}

/// Every called name.
#[derive(Default)]
struct Calls(Vec<String>);

impl Visitor for Calls {
    fn visit_expression(&mut self, expr: &Rc<Expression>) {
        if let ExpressionKind::MethodCall { method, .. } = &expr.kind {
            self.0.push(method.to_string());
        }
        walk_expression(self, expr)
    }
}

fn two_instances() -> Rc<Program> {
    let inner = Declaration::control(
        "inner",
        vec![hdr_param()],
        vec![Declaration::variable("tmp", Type::bits(8), None)],
        Block::new(vec![
            Statement::assign(Expression::path("tmp"), field("a")),
            Statement::assign(field("b"), Expression::path("tmp")),
        ]),
    );
    let ingress = Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![
            Declaration::variable("tmp", Type::bits(8), None),
            Declaration::instance("i1", Type::named("inner"), vec![]),
            Declaration::instance("i2", Type::named("inner"), vec![]),
        ],
        Block::new(vec![
            Statement::assign(Expression::path("tmp"), field("c")),
            apply("i1"),
            apply("i2"),
            Statement::assign(field("c"), Expression::path("tmp")),
        ]),
    );
    program(vec![inner, ingress])
}

#[test]
fn controls_are_inlined_without_collisions() {
    for dialect in [Dialect::Legacy, Dialect::Current] {
        let mut ctx = context(dialect);
        let toplevel = MidEnd::new()
            .process(two_instances(), &mut ctx)
            .unwrap()
            .expect("program has a main");
        assert!(!ctx.diagnostics.has_errors(), "{dialect:?}");

        let out = toplevel.program();
        assert!(out.find("inner").is_none(), "{dialect:?}: callee not removed");

        let ingress = out.find("ingress").unwrap().as_control().unwrap().clone();
        assert!(ingress
            .locals
            .iter()
            .all(|d| !matches!(d.kind, DeclarationKind::Instance { .. })));

        let mut calls = Calls::default();
        walk_program(&mut calls, out);
        assert!(
            calls.0.iter().all(|c| c != "i1.apply" && c != "i2.apply"),
            "{dialect:?}: {:?}",
            calls.0
        );

        let mut names = Names::default();
        walk_program(&mut names, out);
        let count = names.0.len();
        names.0.sort();
        names.0.dedup();
        assert_eq!(names.0.len(), count, "{dialect:?}:\n{}", print_program(out));

        let typeck = p4c_typeck::check(out);
        assert!(typeck.errors.is_empty(), "{:?}", typeck.errors);
    }
}

#[test]
fn direct_action_calls_are_inlined() {
    let ingress = Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![Declaration::action(
            "copy",
            vec![Parameter::new(Direction::In, Type::bits(8), "v")],
            Block::new(vec![Statement::assign(field("b"), Expression::path("v"))]),
        )],
        Block::new(vec![Statement::call(Expression::call(
            Expression::path("copy"),
            vec![field("a")],
        ))]),
    );
    let mut ctx = context(Dialect::Current);
    let toplevel = MidEnd::new()
        .process(program(vec![ingress]), &mut ctx)
        .unwrap()
        .expect("program has a main");

    let ingress = toplevel.program().find("ingress").unwrap().clone();
    insta::assert_snapshot!(p4c_ir::print::print_declaration(&ingress), @r"
    control ingress(inout headers_t hdr) {
        bit<8> v_0;
        action act() {
            v_0 = hdr.h.a;
            hdr.h.b = v_0;
        }
        table tbl_act {
            actions = {
                act;
            }
            default_action = act();
        }
        apply {
            tbl_act.apply();
        }
    }
    ");
}

#[test]
fn mutually_recursive_actions_are_fatal() {
    let a = Declaration::action(
        "a",
        vec![],
        Block::new(vec![Statement::call(Expression::call(
            Expression::path("b"),
            vec![],
        ))]),
    );
    let b = Declaration::action(
        "b",
        vec![],
        Block::new(vec![Statement::call(Expression::call(
            Expression::path("a"),
            vec![],
        ))]),
    );
    let ingress = Declaration::control("ingress", vec![hdr_param()], vec![], Block::empty());
    let mut ctx = context(Dialect::Current);

    let err = MidEnd::new()
        .process(program(vec![a, b, ingress]), &mut ctx)
        .unwrap_err();
    let MidendError::RecursiveInlining { cycle } = err else {
        panic!("expected a recursion error, got {err:?}");
    };
    assert!(cycle.contains(&"a".to_string()));
    assert!(cycle.contains(&"b".to_string()));
}

#[test]
fn exiting_callee_is_inlined() {
    for dialect in [Dialect::Legacy, Dialect::Current] {
        let inner = Declaration::control(
            "inner",
            vec![hdr_param()],
            vec![],
            Block::new(vec![
                Statement::assign(field("c"), Expression::sized(0, 8)),
                Statement::exit(),
            ]),
        );
        let ingress = Declaration::control(
            "ingress",
            vec![hdr_param()],
            vec![Declaration::instance("i", Type::named("inner"), vec![])],
            Block::new(vec![apply("i")]),
        );
        let mut ctx = context(dialect);
        let toplevel = MidEnd::new()
            .process(program(vec![inner, ingress]), &mut ctx)
            .unwrap()
            .expect("program has a main");
        assert!(!ctx.diagnostics.has_errors(), "{dialect:?}");

        let out = toplevel.program();
        assert!(out.find("inner").is_none(), "{dialect:?}: callee not removed");
        let printed = print_program(out);
        assert!(printed.contains("exit;"), "{dialect:?}:\n{printed}");
    }
}

#[test]
fn action_with_exit_is_inlined() {
    let drop_exit = Declaration::action(
        "drop_exit",
        vec![],
        Block::new(vec![
            Statement::assign(field("c"), Expression::sized(0, 8)),
            Statement::exit(),
        ]),
    );
    let ingress = Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![drop_exit],
        Block::new(vec![Statement::call(Expression::call(
            Expression::path("drop_exit"),
            vec![],
        ))]),
    );
    let mut ctx = context(Dialect::Current);
    let toplevel = MidEnd::new()
        .process(program(vec![ingress]), &mut ctx)
        .unwrap()
        .expect("program has a main");
    assert!(!ctx.diagnostics.has_errors());

    let ingress = toplevel.program().find("ingress").unwrap().clone();
    insta::assert_snapshot!(p4c_ir::print::print_declaration(&ingress), @r"
    control ingress(inout headers_t hdr) {
        action act() {
            hdr.h.c = 8w0;
        }
        table tbl_act {
            actions = {
                act;
            }
            default_action = act();
        }
        apply {
            tbl_act.apply();
            exit;
        }
    }
    ");
}

#[test]
fn returning_callees_are_inlined_after_return_removal() {
    let is_valid = || {
        Expression::call(
            Expression::member(Expression::member(Expression::path("hdr"), "h"), "isValid"),
            vec![],
        )
    };
    let maybe = Declaration::action(
        "maybe",
        vec![],
        Block::new(vec![
            Statement::if_else(is_valid(), Statement::ret(None), None),
            Statement::assign(field("c"), Expression::sized(0, 8)),
        ]),
    );
    let inner = Declaration::control(
        "inner",
        vec![hdr_param()],
        vec![],
        Block::new(vec![
            Statement::if_else(is_valid(), Statement::ret(None), None),
            Statement::assign(field("b"), Expression::sized(1, 8)),
        ]),
    );
    let ingress = Declaration::control(
        "ingress",
        vec![hdr_param()],
        vec![
            maybe,
            Declaration::instance("i", Type::named("inner"), vec![]),
        ],
        Block::new(vec![
            Statement::call(Expression::call(Expression::path("maybe"), vec![])),
            apply("i"),
        ]),
    );

    for dialect in [Dialect::Legacy, Dialect::Current] {
        let mut ctx = context(dialect);
        let toplevel = MidEnd::new()
            .process(program(vec![inner.clone(), ingress.clone()]), &mut ctx)
            .unwrap()
            .expect("program has a main");
        assert!(!ctx.diagnostics.has_errors(), "{dialect:?}");

        let out = toplevel.program();
        assert!(out.find("inner").is_none(), "{dialect:?}: control not inlined");
        let printed = print_program(out);
        assert!(!printed.contains("return"), "{dialect:?}:\n{printed}");
        assert!(!printed.contains("maybe()"), "{dialect:?}:\n{printed}");
        assert!(p4c_typeck::check(out).errors.is_empty(), "{dialect:?}");
    }
}

//! Snapshot tests for the P4 printer and structural sharing across rewrites.

use std::rc::Rc;

use p4c_ir::print::print_program;
use p4c_ir::transform::{transform_program, Transform};
use p4c_ir::{
    BinaryOp, Block, Declaration, Direction, Expression, ExpressionKind, Field, KeyElement,
    Method, Parameter, Program, Statement, Type,
};

// ── Helpers ────────────────────────────────────────────────────────────

fn hdr_f() -> Rc<Expression> {
    Expression::member(Expression::member(Expression::path("hdr"), "h"), "f")
}

fn sample() -> Rc<Program> {
    let header = Declaration::header(
        "h_t",
        vec![
            Field::new(Type::bits(8), "f"),
            Field::new(Type::bits(16), "g"),
        ],
    );
    let headers = Declaration::structure("headers_t", vec![Field::new(Type::named("h_t"), "h")]);
    let hash = Declaration::extern_function(Method::new(
        Type::bits(16),
        "hash",
        vec!["T".into()],
        vec![Parameter::new(Direction::In, Type::named("T"), "data")],
    ));

    let set = Declaration::action(
        "set",
        vec![Parameter::new(Direction::In, Type::bits(8), "v")],
        Block::new(vec![Statement::assign(hdr_f(), Expression::path("v"))]),
    );
    let table = Declaration::table(
        "t",
        vec![KeyElement::new(
            Expression::binary(BinaryOp::Add, hdr_f(), Expression::sized(1, 8)),
            "exact",
        )],
        vec![Expression::path("set")],
        Some(Expression::call(
            Expression::path("set"),
            vec![Expression::sized(0, 8)],
        )),
    );
    let apply_hit = Expression::member(
        Expression::call(Expression::member(Expression::path("t"), "apply"), vec![]),
        "hit",
    );
    let body = Block::new(vec![Statement::if_else(
        apply_hit,
        Statement::block(vec![Statement::assign(
            Expression::path("x"),
            Expression::sized(2, 8),
        )]),
        Some(Statement::exit()),
    )]);
    let control = Declaration::control(
        "ingress",
        vec![Parameter::new(
            Direction::InOut,
            Type::named("headers_t"),
            "hdr",
        )],
        vec![
            Declaration::variable("x", Type::bits(8), Some(Expression::sized(1, 8))),
            set,
            table,
        ],
        body,
    );
    Program::new(vec![header, headers, hash, control])
}

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn prints_program() {
    insta::assert_snapshot!(print_program(&sample()), @r"
    header h_t {
        bit<8> f;
        bit<16> g;
    }
    struct headers_t {
        h_t h;
    }
    extern bit<16> hash<T>(in T data);
    control ingress(inout headers_t hdr) {
        bit<8> x = 8w1;
        action set(in bit<8> v) {
            hdr.h.f = v;
        }
        table t {
            key = {
                hdr.h.f + 8w1: exact;
            }
            actions = {
                set;
            }
            default_action = set(8w0);
        }
        apply {
            if (t.apply().hit) {
                x = 8w2;
            } else {
                exit;
            }
        }
    }
    ");
}

struct WidenLiterals;

impl Transform for WidenLiterals {
    fn postorder_expression(&mut self, expr: Rc<Expression>) -> Rc<Expression> {
        match &expr.kind {
            ExpressionKind::Constant { value, .. } => expr.rebuild(ExpressionKind::Constant {
                value: *value,
                ty: Type::bits(16),
            }),
            _ => expr,
        }
    }
}

#[test]
fn rewrite_leaves_type_declarations_shared() {
    let before = sample();
    let after = transform_program(&mut WidenLiterals, &before);

    for i in 0..3 {
        assert!(Rc::ptr_eq(&before.declarations[i], &after.declarations[i]));
    }
    assert!(!Rc::ptr_eq(&before.declarations[3], &after.declarations[3]));
    assert_eq!(before.declarations[3].id, after.declarations[3].id);

    let printed = print_program(&after);
    assert!(printed.contains("bit<8> x = 16w1;"));
    assert!(printed.contains("default_action = set(16w0);"));
}

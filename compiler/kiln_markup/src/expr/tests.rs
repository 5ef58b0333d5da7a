#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_ir::{BinaryOp, Expr, Literal, UnaryOp};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::Binary(op, Box::new(l), Box::new(r))
}

#[test]
fn precedence_of_arithmetic_and_comparison() {
    let e = parse_expr("a + b * 2 < c and not d").unwrap();
    assert_eq!(
        e,
        bin(
            BinaryOp::And,
            bin(
                BinaryOp::Lt,
                bin(
                    BinaryOp::Add,
                    Expr::name("a"),
                    bin(BinaryOp::Mul, Expr::name("b"), int(2))
                ),
                Expr::name("c")
            ),
            Expr::name("d").not()
        )
    );
}

#[test]
fn not_in_is_one_operator() {
    let e = parse_expr("x not in xs").unwrap();
    assert_eq!(e, bin(BinaryOp::NotIn, Expr::name("x"), Expr::name("xs")));
}

#[test]
fn conditional_is_right_associative() {
    let e = parse_expr("a if p else b if q else c").unwrap();
    assert_eq!(e.to_string(), "(a if p else (b if q else c))");
}

#[test]
fn postfix_chain() {
    let e = parse_expr("page.items[0].title.upper()").unwrap();
    assert_eq!(e.to_string(), "page.items[0].title.upper()");
}

#[test]
fn keyword_arguments() {
    let e = parse_expr("f(1, x == 2, level=3)").unwrap();
    let Expr::Call { args, kwargs, .. } = e else {
        panic!("expected call");
    };
    assert_eq!(args.len(), 2);
    assert_eq!(kwargs, vec![("level".to_owned(), int(3))]);
}

#[test]
fn positional_after_keyword_is_rejected() {
    let err = parse_expr("f(a=1, 2)").unwrap_err();
    assert!(err.message.contains("positional argument follows"));
}

#[test]
fn negative_literals_fold() {
    assert_eq!(parse_expr("-5").unwrap(), int(-5));
    assert_eq!(parse_expr("-9223372036854775808").unwrap(), int(i64::MIN));
    assert_eq!(
        parse_expr("-x").unwrap(),
        Expr::Unary(UnaryOp::Neg, Box::new(Expr::name("x")))
    );
    assert!(parse_expr("9223372036854775808").is_err());
}

#[test]
fn literals_and_collections() {
    let e = parse_expr(r#"{'a': [1, 2.5, None], "b": True}"#).unwrap();
    assert_eq!(e.to_string(), r#"{"a": [1, 2.5, None], "b": True}"#);
}

#[test]
fn string_escapes() {
    assert_eq!(
        parse_expr(r#""tab\there \u{e9} \"q\"""#).unwrap(),
        Expr::str("tab\there \u{e9} \"q\"")
    );
    assert!(parse_expr(r#""\q""#).is_err());
    assert!(parse_expr("'open").is_err());
}

#[test]
fn errors_carry_offsets() {
    let err = parse_expr("a + ").unwrap_err();
    assert_eq!(err.offset, 4);
    let err = parse_expr("a b").unwrap_err();
    assert_eq!(err.offset, 2);
    assert!(err.to_string().contains("end of expression"));
}

#[test]
fn keywords_are_not_names() {
    assert!(parse_expr("and").is_err());
    assert!(parse_expr("x.if").is_ok());
}

#[test]
fn for_each_headers() {
    let (targets, iter) = parse_for_each("item in items").unwrap();
    assert_eq!(targets.as_slice(), ["item"]);
    assert_eq!(iter, Expr::name("items"));

    let (targets, iter) = parse_for_each("(k, v) in d.items()").unwrap();
    assert_eq!(targets.as_slice(), ["k", "v"]);
    assert_eq!(iter.to_string(), "d.items()");

    assert!(parse_for_each("items").is_err());
}

#[test]
fn signatures() {
    let (name, params) = parse_signature("entry(title, level=1)").unwrap();
    assert_eq!(name, "entry");
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].default, None);
    assert_eq!(params[1].default, Some(int(1)));

    assert_eq!(parse_signature("footer").unwrap(), ("footer".to_owned(), vec![]));
    assert_eq!(parse_signature("footer()").unwrap().1, vec![]);
    assert!(parse_signature("f(a=1, b)").is_err());
    assert!(parse_signature("f(a, a)").is_err());
}

#[test]
fn with_bindings() {
    let bindings = parse_with_bindings("a=1; b=a + 1;").unwrap();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[1].0, "b");
    assert_eq!(bindings[1].1.to_string(), "(a + 1)");
    assert!(parse_with_bindings("").is_err());
    assert!(parse_with_bindings("a == 1").is_err());
}

#[test]
fn identifiers() {
    assert!(is_identifier("page_2"));
    assert!(!is_identifier("2page"));
    assert!(!is_identifier("not"));
    assert!(!is_identifier("a-b"));
}

// Printed expressions are re-parsed by the assembler, so printing must be
// exactly invertible.

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}".prop_filter("keyword", |s| !parser::is_keyword(s))
}

fn arb_literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::None),
        any::<bool>().prop_map(Literal::Bool),
        any::<i64>().prop_map(Literal::Int),
        (-1000i32..1000).prop_map(|n| Literal::Float(f64::from(n) / 4.0)),
        "[ -~\\n\\t]{0,8}".prop_map(Literal::Str),
    ]
}

fn arb_binop() -> impl Strategy<Value = BinaryOp> {
    prop::sample::select(vec![
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::FloorDiv,
        BinaryOp::Mod,
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::Lt,
        BinaryOp::LtEq,
        BinaryOp::Gt,
        BinaryOp::GtEq,
        BinaryOp::In,
        BinaryOp::NotIn,
        BinaryOp::And,
        BinaryOp::Or,
    ])
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        arb_literal().prop_map(Expr::Literal),
        arb_name().prop_map(Expr::Name),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), arb_name()).prop_map(|(o, name)| Expr::Attr {
                object: Box::new(o),
                name
            }),
            (inner.clone(), inner.clone()).prop_map(|(o, i)| Expr::Index {
                object: Box::new(o),
                index: Box::new(i)
            }),
            (
                inner.clone(),
                prop::collection::vec(inner.clone(), 0..3),
                prop::collection::btree_map(arb_name(), inner.clone(), 0..2)
            )
                .prop_map(|(c, args, kwargs)| Expr::Call {
                    callee: Box::new(c),
                    args,
                    kwargs: kwargs.into_iter().collect()
                }),
            inner.clone().prop_map(|e| e.not()),
            inner
                .clone()
                .prop_filter("negated numeric literal folds", |e| {
                    !matches!(e, Expr::Literal(Literal::Int(_) | Literal::Float(_)))
                })
                .prop_map(|e| Expr::Unary(UnaryOp::Neg, Box::new(e))),
            (arb_binop(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| bin(op, l, r)),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(t, a, b)| Expr::Cond {
                test: Box::new(t),
                then: Box::new(a),
                otherwise: Box::new(b)
            }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Expr::List),
            prop::collection::vec((inner.clone(), inner), 0..3).prop_map(Expr::Map),
        ]
    })
}

proptest! {
    #[test]
    fn printing_reparses_to_the_same_tree(e in arb_expr()) {
        let printed = e.to_string();
        prop_assert_eq!(parse_expr(&printed).unwrap(), e, "printed as {}", printed);
    }
}

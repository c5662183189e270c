//! Property-based tests for construction-time simplification.
//!
//! Expressions are generated as small shapes over a handful of
//! symbols, then built in a fresh arena.

use proptest::prelude::*;
use satoracle::{ArithOp, CmpOp, Value};
use std::rc::Rc;
use theory_engine::expr::ProductOp;
use theory_engine::{Exprs, NodeId, SymbolDecl};

#[derive(Clone, Debug)]
enum IntShape {
    Lit(i64),
    Sym(usize),
    Add(Box<IntShape>, Box<IntShape>),
    Mul(Box<IntShape>, Box<IntShape>),
    Neg(Box<IntShape>),
}

#[derive(Clone, Debug)]
enum BoolShape {
    Lit(bool),
    Atom(usize),
    Cmp(CmpOp, IntShape, IntShape),
    And(Vec<BoolShape>),
    Or(Vec<BoolShape>),
    Not(Box<BoolShape>),
    Implies(Box<BoolShape>, Box<BoolShape>),
}

const CMP_OPS: [CmpOp; 6] = [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge];

fn int_shape(symbols: bool) -> impl Strategy<Value = IntShape> {
    let leaf = if symbols {
        prop_oneof![(-5i64..6).prop_map(IntShape::Lit), (0usize..2).prop_map(IntShape::Sym)].boxed()
    } else {
        (-5i64..6).prop_map(IntShape::Lit).boxed()
    };

    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| IntShape::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| IntShape::Mul(Box::new(a), Box::new(b))),
            inner.prop_map(|a| IntShape::Neg(Box::new(a))),
        ]
    })
}

fn cmp_op() -> impl Strategy<Value = CmpOp> {
    (0usize..CMP_OPS.len()).prop_map(|i| CMP_OPS[i])
}

fn bool_shape() -> impl Strategy<Value = BoolShape> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(BoolShape::Lit),
        (0usize..3).prop_map(BoolShape::Atom),
        (cmp_op(), int_shape(true), int_shape(true)).prop_map(|(op, a, b)| BoolShape::Cmp(op, a, b)),
    ];

    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(BoolShape::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(BoolShape::Or),
            inner.clone().prop_map(|a| BoolShape::Not(Box::new(a))),
            (inner.clone(), inner).prop_map(|(a, b)| BoolShape::Implies(Box::new(a), Box::new(b))),
        ]
    })
}

fn atom(exprs: &mut Exprs, name: &str, out: &str) -> NodeId {
    let decl = Rc::new(SymbolDecl::new(name, &[], out));
    exprs.apply(decl, vec![]).expect("ok")
}

fn build_int(exprs: &mut Exprs, shape: &IntShape) -> NodeId {
    match shape {
        IntShape::Lit(n) => exprs.int(*n),
        IntShape::Sym(i) => atom(exprs, &format!("x{}", i), "Int"),
        IntShape::Add(a, b) => {
            let (a, b) = (build_int(exprs, a), build_int(exprs, b));
            exprs.add(a, b).expect("ok")
        }
        IntShape::Mul(a, b) => {
            let (a, b) = (build_int(exprs, a), build_int(exprs, b));
            exprs.product(vec![ProductOp::Mul], vec![a, b]).expect("ok")
        }
        IntShape::Neg(a) => {
            let a = build_int(exprs, a);
            exprs.neg(a).expect("ok")
        }
    }
}

fn build_bool(exprs: &mut Exprs, shape: &BoolShape) -> NodeId {
    match shape {
        BoolShape::Lit(b) => exprs.truth(*b),
        BoolShape::Atom(i) => atom(exprs, &format!("p{}", i), "Bool"),
        BoolShape::Cmp(op, a, b) => {
            let (a, b) = (build_int(exprs, a), build_int(exprs, b));
            exprs.compare(*op, a, b).expect("ok")
        }
        BoolShape::And(parts) => {
            let parts = parts.iter().map(|p| build_bool(exprs, p)).collect();
            exprs.and(parts).expect("ok")
        }
        BoolShape::Or(parts) => {
            let parts = parts.iter().map(|p| build_bool(exprs, p)).collect();
            exprs.or(parts).expect("ok")
        }
        BoolShape::Not(a) => {
            let a = build_bool(exprs, a);
            exprs.not(a).expect("ok")
        }
        BoolShape::Implies(a, b) => {
            let (a, b) = (build_bool(exprs, a), build_bool(exprs, b));
            exprs.implies(a, b).expect("ok")
        }
    }
}

/// Evaluates a symbol-free shape directly.
fn eval_int(shape: &IntShape) -> Value {
    match shape {
        IntShape::Lit(n) => Value::int(*n),
        IntShape::Sym(_) => unreachable!("symbol-free shapes only"),
        IntShape::Add(a, b) => Value::arith(ArithOp::Add, &eval_int(a), &eval_int(b)).expect("number"),
        IntShape::Mul(a, b) => Value::arith(ArithOp::Mul, &eval_int(a), &eval_int(b)).expect("number"),
        IntShape::Neg(a) => eval_int(a).negate().expect("number"),
    }
}

proptest! {
    /// Rewriting a node a second time changes nothing.
    #[test]
    fn rewrite_is_idempotent(shape in bool_shape()) {
        let mut exprs = Exprs::new();
        let e = build_bool(&mut exprs, &shape);
        let once = exprs.rewrite(e).expect("ok");
        let twice = exprs.rewrite(once).expect("ok");
        prop_assert_eq!(exprs.code(once), exprs.code(twice));
        prop_assert!(exprs.same_as(e, once));
    }

    /// `same_as` is reflexive and symmetric, and transitive across the
    /// neutral wrappers of a node.
    #[test]
    fn same_as_is_an_equivalence(a in bool_shape(), b in bool_shape()) {
        let mut exprs = Exprs::new();
        let (a, b) = (build_bool(&mut exprs, &a), build_bool(&mut exprs, &b));
        prop_assert!(exprs.same_as(a, a));
        prop_assert_eq!(exprs.same_as(a, b), exprs.same_as(b, a));

        let verum = exprs.truth(true);
        let conj = exprs.and(vec![a, verum]).expect("ok");
        let bracket = exprs.bracket(a).expect("ok");
        let not = exprs.not(a).expect("ok");
        let not_not = exprs.not(not).expect("ok");
        let wrappers = [a, conj, bracket, not_not];
        for x in wrappers {
            for y in wrappers {
                prop_assert!(exprs.same_as(x, y), "{} vs {}", exprs.code(x), exprs.code(y));
            }
        }
    }

    /// Folding agrees with evaluating the operators directly.
    #[test]
    fn folding_matches_evaluation(op in cmp_op(), a in int_shape(false), b in int_shape(false)) {
        let mut exprs = Exprs::new();
        let (x, y) = (build_int(&mut exprs, &a), build_int(&mut exprs, &b));
        let (va, vb) = (eval_int(&a), eval_int(&b));
        prop_assert_eq!(exprs.to_value(x), Some(va.clone()));
        prop_assert_eq!(exprs.to_value(y), Some(vb.clone()));

        let cmp = exprs.compare(op, x, y).expect("ok");
        prop_assert_eq!(exprs.truth_value(cmp), Some(Value::compare(op, &va, &vb)));
    }

    /// A false conjunct decides a conjunction wherever it sits, and is
    /// the only child kept.
    #[test]
    fn conjunction_pruning(atoms in prop::collection::vec(0usize..3, 1..5), position in 0usize..5) {
        let mut exprs = Exprs::new();
        let mut children: Vec<NodeId> = atoms
            .iter()
            .map(|i| atom(&mut exprs, &format!("p{}", i), "Bool"))
            .collect();
        let falsum = exprs.truth(false);
        children.insert(position.min(children.len()), falsum);

        let conj = exprs.and(children).expect("ok");
        prop_assert_eq!(exprs.node(conj).value, Some(falsum));
        prop_assert_eq!(exprs.children(conj), &[falsum]);
    }
}

#[test]
fn two_plus_two_is_four() {
    let mut exprs = Exprs::new();
    let (two, four) = (exprs.int(2), exprs.int(4));
    let sum = exprs.add(two, two).expect("ok");
    let cmp = exprs.compare(CmpOp::Eq, sum, four).expect("ok");
    assert_eq!(exprs.truth_value(cmp), Some(true));
}

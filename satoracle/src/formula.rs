//! The ground intermediate representation accepted by the oracle.
//!
//! Callers translate whatever richer language they manipulate into
//! `Formula`e over opaque atoms.  Quantifiers, definitions and
//! interpretations must all be expanded away by then: the oracle only
//! sees propositional structure, finite-domain choices, and arithmetic
//! on rigid values.
use super::{StateAtom, Value};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "≠",
            CmpOp::Lt => "<",
            CmpOp::Le => "≤",
            CmpOp::Gt => ">",
            CmpOp::Ge => "≥",
        }
    }

    /// Returns the operator for `!(a op b)`.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Division that truncates towards zero.
    IntDiv,
    Mod,
    Pow,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Formula<A: StateAtom> {
    Const(bool),
    Atom(A),
    Not(Box<Formula<A>>),
    And(Vec<Formula<A>>),
    Or(Vec<Formula<A>>),
    Implies(Box<Formula<A>>, Box<Formula<A>>),
    Iff(Box<Formula<A>>, Box<Formula<A>>),
    Compare(CmpOp, Box<Term<A>>, Box<Term<A>>),
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Term<A: StateAtom> {
    Const(Value),
    /// An uninterpreted term that takes exactly one value in `domain`.
    Choice { atom: A, domain: Vec<Value> },
    /// A boolean-valued term.
    Formula(Box<Formula<A>>),
    Ite(Box<Formula<A>>, Box<Term<A>>, Box<Term<A>>),
    Arith(ArithOp, Box<Term<A>>, Box<Term<A>>),
    Neg(Box<Term<A>>),
}

impl<A: StateAtom> Formula<A> {
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(inner: Formula<A>) -> Self {
        match inner {
            Formula::Const(b) => Formula::Const(!b),
            Formula::Not(x) => *x,
            other => Formula::Not(Box::new(other)),
        }
    }

    #[must_use]
    pub fn implies(lhs: Formula<A>, rhs: Formula<A>) -> Self {
        Formula::Implies(Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn iff(lhs: Formula<A>, rhs: Formula<A>) -> Self {
        Formula::Iff(Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn compare(op: CmpOp, lhs: Term<A>, rhs: Term<A>) -> Self {
        Formula::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    /// Returns the formula `term = value`.
    #[must_use]
    pub fn equals(term: Term<A>, value: Value) -> Self {
        Formula::compare(CmpOp::Eq, term, Term::Const(value))
    }
}

impl<A: StateAtom> Term<A> {
    #[must_use]
    pub fn arith(op: ArithOp, lhs: Term<A>, rhs: Term<A>) -> Self {
        Term::Arith(op, Box::new(lhs), Box::new(rhs))
    }

    #[must_use]
    pub fn ite(cond: Formula<A>, then: Term<A>, otherwise: Term<A>) -> Self {
        Term::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }
}

#[test]
fn test_not_simplifies() {
    let p = Formula::Atom(String::from("p"));

    assert_eq!(Formula::not(Formula::not(p.clone())), p);
    assert_eq!(Formula::<String>::not(Formula::Const(true)), Formula::Const(false));
}

#[test]
fn test_negate_cmp() {
    for op in [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge] {
        assert_eq!(op.negate().negate(), op);
        assert_ne!(op.negate(), op);
    }
}

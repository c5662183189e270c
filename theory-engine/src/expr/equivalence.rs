//! Equivalence up to simplification, and the "set condition" reading
//! of literals that decision tables merge.
use super::{ExprKind, Exprs, NodeId, UnaryOp};
use crate::error::Result;
use satoracle::CmpOp;

/// `term ∈ set` when `member`, `term ∉ set` otherwise.  Every element
/// of `set` is rigid.
#[derive(Clone, Debug, PartialEq)]
pub struct SetCondition {
    pub term: NodeId,
    pub member: bool,
    pub set: Vec<NodeId>,
}

impl Exprs {
    /// Follows `value` and `simpler` links, and unwraps brackets,
    /// until reaching a node that is its own normal form.
    #[must_use]
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = self.node(id);
            if let Some(value) = node.value {
                return value;
            }

            id = match (&node.kind, node.simpler) {
                (_, Some(simpler)) => simpler,
                (ExprKind::Bracket, None) => node.children[0],
                _ => return id,
            };
        }
    }

    /// Returns whether `a` and `b` are known to denote the same thing,
    /// syntactically, after simplification.
    #[must_use]
    pub fn same_as(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }

        let (a, b) = (self.resolve(a), self.resolve(b));
        if a == b {
            return true;
        }

        let (a, b) = (self.node(a), self.node(b));
        std::mem::discriminant(&a.kind) == std::mem::discriminant(&b.kind) && a.code == b.code
    }

    /// Reads `id` as a condition on the membership of a term in a set
    /// of rigid values.
    #[must_use]
    pub fn as_set_condition(&self, id: NodeId) -> Option<SetCondition> {
        let node = self.node(id);
        match &node.kind {
            ExprKind::Comparison(ops) if ops.len() == 1 && matches!(ops[0], CmpOp::Eq | CmpOp::Ne) => {
                let member = ops[0] == CmpOp::Eq;
                let (a, b) = (node.children[0], node.children[1]);
                match (self.rigid(a), self.rigid(b)) {
                    (None, Some(value)) => Some(SetCondition {
                        term: a,
                        member,
                        set: vec![value],
                    }),
                    (Some(value), None) => Some(SetCondition {
                        term: b,
                        member,
                        set: vec![value],
                    }),
                    _ => None,
                }
            }
            ExprKind::Unary(UnaryOp::Not) => {
                let mut inner = self.as_set_condition(node.children[0])?;
                inner.member = !inner.member;
                Some(inner)
            }
            ExprKind::Membership => {
                let term = node.children[0];
                if self.is_rigid(term) {
                    return None;
                }

                let set: Option<Vec<NodeId>> = node.children[1..].iter().map(|e| self.rigid(*e)).collect();
                Some(SetCondition {
                    term,
                    member: true,
                    set: set?,
                })
            }
            _ => None,
        }
    }

    /// Builds the node for `condition`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn set_condition_node(&mut self, condition: &SetCondition) -> Result<NodeId> {
        let membership = self.membership(condition.term, condition.set.clone())?;
        if condition.member {
            Ok(membership)
        } else {
            self.not(membership)
        }
    }
}

#[cfg(test)]
use super::test_symbol;

#[test]
fn test_same_as() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let verum = exprs.truth(true);

    let conj = exprs.and(vec![p, verum]).expect("ok");
    let bracket = exprs.bracket(p).expect("ok");
    assert!(exprs.same_as(conj, p));
    assert!(exprs.same_as(p, bracket));
    assert!(exprs.same_as(bracket, conj));

    let (two, three, five) = (exprs.int(2), exprs.int(3), exprs.int(5));
    let sum = exprs.add(two, three).expect("ok");
    assert!(exprs.same_as(sum, five));
    assert!(!exprs.same_as(sum, two));
    assert!(!exprs.same_as(p, verum));
}

#[test]
fn test_zero_variable_quantification() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let q = exprs.apply(test_symbol("q", &[], "Bool"), vec![]).expect("ok");

    let all = exprs
        .quantification(super::Quantifier::Forall, vec![p, q])
        .expect("ok");
    let conj = exprs.and(vec![p, q]).expect("ok");
    assert_eq!(exprs.code(all), "∀[p; q]");
    assert!(exprs.same_as(all, conj));

    let some = exprs
        .quantification(super::Quantifier::Exists, vec![])
        .expect("ok");
    assert_eq!(exprs.resolve(some), exprs.truth(false));
}

#[test]
fn test_as_set_condition() {
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let (one, two) = (exprs.int(1), exprs.int(2));

    let eq = exprs.compare(CmpOp::Eq, one, x).expect("ok");
    assert_eq!(
        exprs.as_set_condition(eq),
        Some(SetCondition {
            term: x,
            member: true,
            set: vec![one]
        })
    );

    let member = exprs.membership(x, vec![one, two]).expect("ok");
    let not_member = exprs.not(member).expect("ok");
    let cond = exprs.as_set_condition(not_member).expect("set condition");
    assert!(!cond.member);
    assert_eq!(cond.set, vec![one, two]);
    assert_eq!(exprs.set_condition_node(&cond).expect("ok"), not_member);

    let lt = exprs.compare(CmpOp::Lt, x, one).expect("ok");
    assert_eq!(exprs.as_set_condition(lt), None);
}

//! Construction-time simplification, one rule per node kind.
//!
//! Each rule looks at the (already simplified) children of a node
//! that is about to be interned, and either folds it to a rigid
//! `value`, points it at a `simpler` equivalent, prunes its children,
//! or leaves it alone.
use super::{ExprKind, Exprs, Node, NodeId, ProductOp, Quantifier, SumOp, UnaryOp};
use crate::error::Result;
use crate::vocabulary::BaseType;
use satoracle::{ArithOp, CmpOp, Value};

impl Exprs {
    pub(super) fn simplify(&mut self, node: &mut Node) -> Result<()> {
        match node.kind.clone() {
            ExprKind::Conjunction => self.rewrite_junction(node, false),
            ExprKind::Disjunction => self.rewrite_junction(node, true),
            ExprKind::Implication => {
                let (p, q) = (node.children[0], node.children[1]);
                self.rewrite_implication(node, p, q)
            }
            ExprKind::RevImplication => {
                let (q, p) = (node.children[0], node.children[1]);
                self.rewrite_implication(node, p, q)
            }
            ExprKind::Equivalence => self.rewrite_equivalence(node),
            ExprKind::IfExpr => {
                let (cond, then, otherwise) = (node.children[0], node.children[1], node.children[2]);
                match self.truth_value(cond) {
                    Some(true) => self.settle(node, then),
                    Some(false) => self.settle(node, otherwise),
                    None if self.same_as(then, otherwise) => self.settle(node, then),
                    None => {}
                }
                Ok(())
            }
            ExprKind::Comparison(ops) => self.rewrite_comparison(node, &ops),
            ExprKind::Sum(ops) => {
                let ops: Vec<ArithOp> = ops
                    .iter()
                    .map(|op| match op {
                        SumOp::Add => ArithOp::Add,
                        SumOp::Sub => ArithOp::Sub,
                    })
                    .collect();
                self.fold_arithmetic(node, &ops);
                Ok(())
            }
            ExprKind::Product(ops) => {
                let integral = node.sort.as_deref().and_then(|s| self.base(s)) == Some(BaseType::Int);
                let ops: Vec<ArithOp> = ops
                    .iter()
                    .map(|op| match op {
                        ProductOp::Mul => ArithOp::Mul,
                        ProductOp::Div if integral => ArithOp::IntDiv,
                        ProductOp::Div => ArithOp::Div,
                        ProductOp::Mod => ArithOp::Mod,
                    })
                    .collect();
                self.fold_arithmetic(node, &ops);
                Ok(())
            }
            ExprKind::Power => {
                self.fold_arithmetic(node, &[ArithOp::Pow]);
                Ok(())
            }
            ExprKind::Unary(UnaryOp::Not) => {
                let child = node.children[0];
                if let Some(b) = self.truth_value(child) {
                    node.value = Some(self.truth(!b));
                } else if self.kind(child) == &ExprKind::Unary(UnaryOp::Not) {
                    let inner = self.children(child)[0];
                    self.settle(node, inner);
                }
                Ok(())
            }
            ExprKind::Unary(UnaryOp::Neg) => {
                if let Some(value) = self.to_value(node.children[0]).and_then(|v| v.negate()) {
                    node.value = Some(self.constant(&value, node));
                }
                Ok(())
            }
            ExprKind::Quantification(quantifier) => {
                if self.quantee_count(&node.children) > 0 {
                    return Ok(());
                }

                let instances = node.children.clone();
                let expanded = match quantifier {
                    Quantifier::Forall => self.and(instances)?,
                    Quantifier::Exists => self.or(instances)?,
                };
                self.settle(node, expanded);
                Ok(())
            }
            ExprKind::Aggregate(_) => {
                if self.quantee_count(&node.children) > 0 {
                    return Ok(());
                }

                let instances = node.children.clone();
                let total = match instances.len() {
                    0 => self.int(0),
                    1 => instances[0],
                    n => self.sum(vec![SumOp::Add; n - 1], instances)?,
                };
                self.settle(node, total);
                Ok(())
            }
            ExprKind::Membership => self.rewrite_membership(node),
            ExprKind::Bracket => {
                node.value = self.rigid(node.children[0]);
                Ok(())
            }
            ExprKind::Applied(_)
            | ExprKind::Boolean(_)
            | ExprKind::Number(_)
            | ExprKind::Date(_)
            | ExprKind::Constructor(_)
            | ExprKind::Symbol(_)
            | ExprKind::Variable(_)
            | ExprKind::Quantee { .. } => Ok(()),
        }
    }

    /// Makes `node` equivalent to `target`: its value when `target` is
    /// constant, and a `simpler` link otherwise.
    fn settle(&self, node: &mut Node, target: NodeId) {
        match self.rigid(target) {
            Some(value) => node.value = Some(value),
            None => node.simpler = Some(target),
        }
    }

    fn constant(&mut self, value: &Value, node: &Node) -> NodeId {
        let sort = node.sort.clone().unwrap_or_else(|| String::from("Real"));
        self.from_value(value, &sort)
    }

    /// Conjunction when `absorbing` is false, disjunction when true.
    fn rewrite_junction(&mut self, node: &mut Node, absorbing: bool) -> Result<()> {
        let mut culprit = None;
        let mut remaining = Vec::new();

        for child in &node.children {
            match self.truth_value(*child) {
                Some(b) if b == absorbing => {
                    culprit = culprit.or(Some(*child));
                }
                Some(_) => {}
                None => remaining.push(*child),
            }
        }

        if let Some(culprit) = culprit {
            node.value = Some(self.truth(absorbing));
            // Keep the child that decided the outcome.
            if !remaining.is_empty() {
                node.children = vec![culprit];
            }
            return Ok(());
        }

        match remaining.len() {
            0 => node.value = Some(self.truth(!absorbing)),
            1 => self.settle(node, remaining[0]),
            n if n < node.children.len() => {
                let pruned = if absorbing {
                    self.or(remaining)?
                } else {
                    self.and(remaining)?
                };
                node.simpler = Some(pruned);
            }
            _ => {}
        }

        Ok(())
    }

    fn rewrite_implication(&mut self, node: &mut Node, p: NodeId, q: NodeId) -> Result<()> {
        match (self.truth_value(p), self.truth_value(q)) {
            (Some(false), _) | (_, Some(true)) => node.value = Some(self.truth(true)),
            (Some(true), _) => self.settle(node, q),
            (None, Some(false)) => {
                let negated = self.not(p)?;
                self.settle(node, negated);
            }
            (None, None) => {}
        }

        Ok(())
    }

    fn rewrite_equivalence(&mut self, node: &mut Node) -> Result<()> {
        let truths: Vec<Option<bool>> = node.children.iter().map(|c| self.truth_value(*c)).collect();

        if truths.iter().all(Option::is_some) {
            let first = truths[0];
            node.value = Some(self.truth(truths.iter().all(|t| *t == first)));
            return Ok(());
        }

        if let [a, b] = node.children[..] {
            match (truths[0], truths[1]) {
                (Some(true), None) => self.settle(node, b),
                (None, Some(true)) => self.settle(node, a),
                (Some(false), None) => {
                    let negated = self.not(b)?;
                    self.settle(node, negated);
                }
                (None, Some(false)) => {
                    let negated = self.not(a)?;
                    self.settle(node, negated);
                }
                _ if self.same_as(a, b) => node.value = Some(self.truth(true)),
                _ => {}
            }
        }

        Ok(())
    }

    fn rewrite_comparison(&mut self, node: &mut Node, ops: &[CmpOp]) -> Result<()> {
        let values: Option<Vec<Value>> = node.children.iter().map(|c| self.to_value(*c)).collect();

        if let Some(values) = values {
            let holds = ops
                .iter()
                .zip(values.windows(2))
                .all(|(op, pair)| Value::compare(*op, &pair[0], &pair[1]));
            node.value = Some(self.truth(holds));
        } else if let ([CmpOp::Eq], [a, b]) = (ops, &node.children[..]) {
            if self.same_as(*a, *b) {
                node.value = Some(self.truth(true));
            }
        }

        Ok(())
    }

    /// Folds a left-associated chain of `ops` over rigid children.
    /// Undefined results (division by zero) are left unfolded.
    fn fold_arithmetic(&mut self, node: &mut Node, ops: &[ArithOp]) {
        let values: Option<Vec<Value>> = node.children.iter().map(|c| self.to_value(*c)).collect();
        let values = match values {
            Some(values) => values,
            None => return,
        };

        let mut acc = values[0].clone();
        for (op, value) in ops.iter().zip(&values[1..]) {
            match Value::arith(*op, &acc, value) {
                Some(result) => acc = result,
                None => return,
            }
        }

        node.value = Some(self.constant(&acc, node));
    }

    fn rewrite_membership(&mut self, node: &mut Node) -> Result<()> {
        let term = node.children[0];
        let elements = node.children[1..].to_vec();

        if elements.is_empty() {
            node.value = Some(self.truth(false));
            return Ok(());
        }

        if let Some(value) = self.to_value(term) {
            let values: Option<Vec<Value>> = elements.iter().map(|e| self.to_value(*e)).collect();
            if let Some(values) = values {
                node.value = Some(self.truth(values.contains(&value)));
                return Ok(());
            }
        }

        if let [single] = elements[..] {
            let equality = self.compare(CmpOp::Eq, term, single)?;
            self.settle(node, equality);
        }

        Ok(())
    }
}

#[cfg(test)]
use super::test_symbol;

#[cfg(test)]
fn atoms(exprs: &mut Exprs, names: &[&str]) -> Vec<NodeId> {
    names
        .iter()
        .map(|n| exprs.apply(test_symbol(n, &[], "Bool"), vec![]).expect("ok"))
        .collect()
}

#[test]
fn test_conjunction_pruning() {
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let y = exprs.apply(test_symbol("y", &[], "Int"), vec![]).expect("ok");
    let (zero, one) = (exprs.int(0), exprs.int(1));
    let x_is_one = exprs.compare(CmpOp::Eq, x, one).expect("ok");
    let y_pos = exprs.compare(CmpOp::Gt, y, zero).expect("ok");
    let falsum = exprs.truth(false);

    for order in [
        vec![x_is_one, falsum, y_pos],
        vec![falsum, x_is_one, y_pos],
        vec![x_is_one, y_pos, falsum],
    ] {
        let conj = exprs.and(order).expect("ok");
        assert_eq!(exprs.node(conj).value, Some(falsum));
        assert_eq!(exprs.children(conj), &[falsum]);
    }

    // Nothing unresolved: keep every child.
    let verum = exprs.truth(true);
    let conj = exprs.and(vec![verum, falsum]).expect("ok");
    assert_eq!(exprs.node(conj).value, Some(falsum));
    assert_eq!(exprs.children(conj).len(), 2);
}

#[test]
fn test_junction_simpler() {
    let mut exprs = Exprs::new();
    let v = atoms(&mut exprs, &["a", "b"]);
    let verum = exprs.truth(true);
    let falsum = exprs.truth(false);

    let single = exprs.and(vec![v[0], verum]).expect("ok");
    assert_eq!(exprs.node(single).simpler, Some(v[0]));

    let both = exprs.and(vec![v[0], verum, v[1]]).expect("ok");
    let pruned = exprs.and(vec![v[0], v[1]]).expect("ok");
    assert_eq!(exprs.node(both).simpler, Some(pruned));

    let disj = exprs.or(vec![v[0], verum]).expect("ok");
    assert_eq!(exprs.node(disj).value, Some(verum));
    let disj = exprs.or(vec![falsum, v[1]]).expect("ok");
    assert_eq!(exprs.node(disj).simpler, Some(v[1]));

    let empty = exprs.and(vec![]).expect("ok");
    assert_eq!(exprs.node(empty).value, Some(verum));
}

#[test]
fn test_implication() {
    let mut exprs = Exprs::new();
    let v = atoms(&mut exprs, &["p", "q"]);
    let (verum, falsum) = (exprs.truth(true), exprs.truth(false));

    let imp = exprs.implies(falsum, v[1]).expect("ok");
    assert_eq!(exprs.node(imp).value, Some(verum));
    let imp = exprs.implies(verum, v[1]).expect("ok");
    assert_eq!(exprs.node(imp).simpler, Some(v[1]));
    let imp = exprs.implies(v[0], verum).expect("ok");
    assert_eq!(exprs.node(imp).value, Some(verum));
    let imp = exprs.implies(v[0], falsum).expect("ok");
    let not_p = exprs.not(v[0]).expect("ok");
    assert_eq!(exprs.node(imp).simpler, Some(not_p));

    let rev = exprs.rev_implies(v[1], verum).expect("ok");
    assert_eq!(exprs.node(rev).simpler, Some(v[1]));

    let imp = exprs.implies(v[0], v[1]).expect("ok");
    assert_eq!(exprs.node(imp).value, None);
    assert_eq!(exprs.node(imp).simpler, None);
}

#[test]
fn test_folding() {
    let mut exprs = Exprs::new();
    let (two, four, seven) = (exprs.int(2), exprs.int(4), exprs.int(7));

    let sum = exprs.add(two, two).expect("ok");
    let eq = exprs.compare(CmpOp::Eq, sum, four).expect("ok");
    assert_eq!(exprs.node(eq).value, Some(exprs.truth(true)));

    let chain = exprs
        .chain(vec![CmpOp::Lt, CmpOp::Lt], vec![two, seven, four])
        .expect("ok");
    assert_eq!(exprs.node(chain).value, Some(exprs.truth(false)));

    let quotient = exprs.product(vec![ProductOp::Div], vec![seven, two]).expect("ok");
    let expected = exprs.int(3);
    assert_eq!(exprs.node(quotient).value, Some(expected));

    let zero = exprs.int(0);
    let undefined = exprs.product(vec![ProductOp::Div], vec![seven, zero]).expect("ok");
    assert_eq!(exprs.node(undefined).value, None);

    let power = exprs.power(two, four).expect("ok");
    let expected = exprs.int(16);
    assert_eq!(exprs.node(power).value, Some(expected));

    let neg = exprs.neg(seven).expect("ok");
    let expected = exprs.int(-7);
    assert_eq!(exprs.node(neg).value, Some(expected));
}

#[test]
fn test_membership() {
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let (one, two) = (exprs.int(1), exprs.int(2));

    let empty = exprs.membership(x, vec![]).expect("ok");
    assert_eq!(exprs.node(empty).value, Some(exprs.truth(false)));

    let single = exprs.membership(x, vec![one]).expect("ok");
    let eq = exprs.compare(CmpOp::Eq, x, one).expect("ok");
    assert_eq!(exprs.node(single).simpler, Some(eq));

    let rigid = exprs.membership(two, vec![one, two]).expect("ok");
    assert_eq!(exprs.node(rigid).value, Some(exprs.truth(true)));
    assert_eq!(exprs.code(rigid), "2 ∈ {1, 2}");
}

#[test]
fn test_bracket_and_not() {
    let mut exprs = Exprs::new();
    let v = atoms(&mut exprs, &["p"]);
    let (two, three) = (exprs.int(2), exprs.int(3));
    let sum = exprs.add(two, three).expect("ok");

    let bracket = exprs.bracket(sum).expect("ok");
    assert_eq!(exprs.code(bracket), "(2 + 3)");
    let expected = exprs.int(5);
    assert_eq!(exprs.node(bracket).value, Some(expected));

    let not_p = exprs.not(v[0]).expect("ok");
    let not_not_p = exprs.not(not_p).expect("ok");
    assert_eq!(exprs.node(not_not_p).simpler, Some(v[0]));
}

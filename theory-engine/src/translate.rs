//! Lowering of ground expressions to the oracle's `Formula`/`Term`
//! language.
//!
//! Ground boolean applications become atoms, and ground function
//! applications become finite-domain choices, both named by their
//! canonical code.  An application whose arguments are not rigid is
//! unrolled into an if-then-else over the argument's type.  Every
//! node is lowered through its resolved (simplest) form.
use crate::assignments::Assignment;
use crate::error::{Error, Result};
use crate::expr::{ExprKind, Exprs, NodeId, ProductOp, SumOp, UnaryOp};
use crate::vocabulary::{BaseType, Vocabulary};
use satoracle::{ArithOp, Formula, Model, Term, Value};

/// How to observe a question in the oracle's models.
#[derive(Clone, Debug, PartialEq)]
pub enum Probe {
    /// A boolean question, through its (reified) atom.
    Bool(Formula<String>),
    Term(Term<String>),
}

impl Probe {
    /// Reads the question's value in `model`.
    #[must_use]
    pub fn read(&self, model: &Model<String>, model_completion: bool) -> Option<Value> {
        match self {
            Probe::Bool(formula) => model
                .eval_formula(formula, model_completion)
                .map(Value::Bool),
            Probe::Term(term) => model.eval_term(term, model_completion),
        }
    }

    /// Returns the formula stating that the question has `value`.
    #[must_use]
    pub fn literal(&self, value: &Value) -> Formula<String> {
        match (self, value) {
            (Probe::Bool(formula), Value::Bool(true)) => formula.clone(),
            (Probe::Bool(formula), Value::Bool(false)) => Formula::not(formula.clone()),
            (Probe::Bool(formula), _) => Formula::equals(Term::Formula(Box::new(formula.clone())), value.clone()),
            (Probe::Term(term), _) => Formula::equals(term.clone(), value.clone()),
        }
    }
}

pub struct Translator<'a> {
    exprs: &'a mut Exprs,
    vocabulary: &'a Vocabulary,
}

impl<'a> Translator<'a> {
    pub fn new(exprs: &'a mut Exprs, vocabulary: &'a Vocabulary) -> Self {
        Translator { exprs, vocabulary }
    }

    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` when `id` is not a ground
    /// boolean expression over finite types.
    pub fn formula(&mut self, id: NodeId) -> Result<Formula<String>> {
        let id = self.exprs.resolve(id);
        if let Some(b) = self.exprs.truth_value(id) {
            return Ok(Formula::Const(b));
        }

        let children = self.exprs.children(id).to_vec();
        let ret = match self.exprs.kind(id).clone() {
            ExprKind::Applied(_) if self.is_boolean(id) => {
                if self.has_rigid_args(id) {
                    Formula::Atom(self.exprs.code(id).to_string())
                } else {
                    let lifted = self.lift(id)?;
                    Formula::equals(lifted, Value::Bool(true))
                }
            }
            ExprKind::Conjunction => Formula::And(self.formulas(&children)?),
            ExprKind::Disjunction => Formula::Or(self.formulas(&children)?),
            ExprKind::Implication => {
                let (p, q) = (self.formula(children[0])?, self.formula(children[1])?);
                Formula::implies(p, q)
            }
            ExprKind::RevImplication => {
                let (q, p) = (self.formula(children[0])?, self.formula(children[1])?);
                Formula::implies(p, q)
            }
            ExprKind::Equivalence => {
                let first = self.formula(children[0])?;
                let mut pairs = Vec::new();
                for other in &children[1..] {
                    pairs.push(Formula::iff(first.clone(), self.formula(*other)?));
                }

                conjoin(pairs)
            }
            ExprKind::Unary(UnaryOp::Not) => Formula::not(self.formula(children[0])?),
            ExprKind::Comparison(ops) => {
                let terms = self.terms(&children)?;
                let pairs = ops
                    .iter()
                    .zip(terms.windows(2))
                    .map(|(op, pair)| Formula::compare(*op, pair[0].clone(), pair[1].clone()))
                    .collect();
                conjoin(pairs)
            }
            ExprKind::Membership => {
                let term = self.term(children[0])?;
                let elements = self.terms(&children[1..])?;
                Formula::Or(
                    elements
                        .into_iter()
                        .map(|e| Formula::compare(satoracle::CmpOp::Eq, term.clone(), e))
                        .collect(),
                )
            }
            ExprKind::IfExpr => {
                let cond = self.formula(children[0])?;
                let (then, otherwise) = (self.formula(children[1])?, self.formula(children[2])?);
                Formula::Or(vec![
                    Formula::And(vec![cond.clone(), then]),
                    Formula::And(vec![Formula::not(cond), otherwise]),
                ])
            }
            _ => return Err(self.unsupported(id, "a ground formula")),
        };

        Ok(ret)
    }

    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` when `id` is not a ground term
    /// over finite types.
    pub fn term(&mut self, id: NodeId) -> Result<Term<String>> {
        let id = self.exprs.resolve(id);
        if let Some(value) = self.exprs.to_value(id) {
            return Ok(Term::Const(value));
        }

        let children = self.exprs.children(id).to_vec();
        let ret = match self.exprs.kind(id).clone() {
            ExprKind::Applied(_) if self.is_boolean(id) => Term::Formula(Box::new(self.formula(id)?)),
            ExprKind::Applied(_) if self.has_rigid_args(id) => {
                let sort = self.exprs.sort(id).unwrap_or("Int").to_string();
                Term::Choice {
                    atom: self.exprs.code(id).to_string(),
                    domain: self.domain(&sort)?,
                }
            }
            ExprKind::Applied(_) => self.lift(id)?,
            ExprKind::Sum(ops) => {
                let ops = ops
                    .iter()
                    .map(|op| match op {
                        SumOp::Add => ArithOp::Add,
                        SumOp::Sub => ArithOp::Sub,
                    })
                    .collect();
                self.fold(ops, &children)?
            }
            ExprKind::Product(ops) => {
                let integral = self.exprs.sort(id).and_then(|s| self.exprs.base(s)) == Some(BaseType::Int);
                let ops = ops
                    .iter()
                    .map(|op| match op {
                        ProductOp::Mul => ArithOp::Mul,
                        ProductOp::Div if integral => ArithOp::IntDiv,
                        ProductOp::Div => ArithOp::Div,
                        ProductOp::Mod => ArithOp::Mod,
                    })
                    .collect();
                self.fold(ops, &children)?
            }
            ExprKind::Power => self.fold(vec![ArithOp::Pow], &children)?,
            ExprKind::Unary(UnaryOp::Neg) => Term::Neg(Box::new(self.term(children[0])?)),
            ExprKind::IfExpr => {
                let cond = self.formula(children[0])?;
                Term::ite(cond, self.term(children[1])?, self.term(children[2])?)
            }
            ExprKind::Conjunction
            | ExprKind::Disjunction
            | ExprKind::Implication
            | ExprKind::RevImplication
            | ExprKind::Equivalence
            | ExprKind::Comparison(_)
            | ExprKind::Membership
            | ExprKind::Unary(UnaryOp::Not) => Term::Formula(Box::new(self.formula(id)?)),
            _ => return Err(self.unsupported(id, "a ground term")),
        };

        Ok(ret)
    }

    /// Returns how to observe question `id`, and the axiom that ties
    /// its atom to its meaning, if it needs one.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` if `id` cannot be translated.
    pub fn probe(&mut self, id: NodeId) -> Result<(Probe, Option<Formula<String>>)> {
        if !self.is_boolean(id) {
            return Ok((Probe::Term(self.term(id)?), None));
        }

        let atom = Formula::Atom(self.exprs.code(id).to_string());
        let meaning = self.formula(id)?;
        if meaning == atom {
            return Ok((Probe::Bool(atom), None));
        }

        Ok((Probe::Bool(atom.clone()), Some(Formula::iff(atom, meaning))))
    }

    /// Returns the formula for a decided assignment.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` if the sentence cannot be
    /// translated.
    pub fn assignment(&mut self, assignment: &Assignment) -> Result<Option<Formula<String>>> {
        match assignment.literal(self.exprs)? {
            Some(literal) => Ok(Some(self.formula(literal)?)),
            None => Ok(None),
        }
    }

    /// Converts an oracle value back to a rigid node of `id`'s type.
    pub fn node_for(&mut self, id: NodeId, value: &Value) -> NodeId {
        let sort = self.exprs.sort(id).unwrap_or("Bool").to_string();
        self.exprs.from_value(value, &sort)
    }

    fn formulas(&mut self, ids: &[NodeId]) -> Result<Vec<Formula<String>>> {
        ids.iter().map(|id| self.formula(*id)).collect()
    }

    fn terms(&mut self, ids: &[NodeId]) -> Result<Vec<Term<String>>> {
        ids.iter().map(|id| self.term(*id)).collect()
    }

    fn fold(&mut self, ops: Vec<ArithOp>, children: &[NodeId]) -> Result<Term<String>> {
        let mut acc = self.term(children[0])?;
        for (op, child) in ops.into_iter().zip(&children[1..]) {
            acc = Term::arith(op, acc, self.term(*child)?);
        }

        Ok(acc)
    }

    /// `f(t)` with a non-rigid `t` becomes
    /// `if t = e1 then f(e1) else if ... else f(ek)`.
    fn lift(&mut self, id: NodeId) -> Result<Term<String>> {
        let node = self.exprs.node(id);
        let (children, decl) = (node.children.clone(), node.decl.clone());
        let decl = decl.ok_or_else(|| Error::UnknownSymbol(node.code.clone()))?;
        let pos = match children.iter().position(|c| !self.exprs.is_rigid(*c)) {
            Some(pos) => pos,
            None => return self.term(id),
        };

        let sort = decl.args[pos].clone();
        let arg = self.term(children[pos])?;
        let mut branches = Vec::new();
        for value in self.domain(&sort)? {
            let mut args = children.clone();
            args[pos] = self.exprs.from_value(&value, &sort);
            let instance = self.exprs.apply(decl.clone(), args)?;
            branches.push((Formula::equals(arg.clone(), value), self.term(instance)?));
        }

        let (_, mut acc) = branches
            .pop()
            .ok_or_else(|| Error::unsupported(format!("type {} is empty", sort)))?;
        for (cond, then) in branches.into_iter().rev() {
            acc = Term::ite(cond, then, acc);
        }

        Ok(acc)
    }

    fn domain(&self, sort: &str) -> Result<Vec<Value>> {
        self.vocabulary
            .domain(sort)
            .map(<[Value]>::to_vec)
            .ok_or_else(|| Error::unsupported(format!("type {} is not enumerated", sort)))
    }

    fn is_boolean(&self, id: NodeId) -> bool {
        self.exprs.sort(id) == Some("Bool")
    }

    fn has_rigid_args(&self, id: NodeId) -> bool {
        self.exprs
            .children(id)
            .iter()
            .all(|c| self.exprs.is_rigid(*c))
    }

    fn unsupported(&self, id: NodeId, what: &str) -> Error {
        Error::unsupported(format!("{} is not {}", self.exprs.code(id), what))
    }
}

fn conjoin(mut formulas: Vec<Formula<String>>) -> Formula<String> {
    if formulas.len() == 1 {
        formulas.remove(0)
    } else {
        Formula::And(formulas)
    }
}

#[cfg(test)]
use crate::expr::test_symbol;
#[cfg(test)]
use crate::vocabulary::{Declaration, SymbolDecl, TypeDecl};
#[cfg(test)]
use satoracle::CmpOp;

#[cfg(test)]
fn color_vocabulary() -> Vocabulary {
    let mut voc = Vocabulary::new();
    voc.declare(Declaration::Type(TypeDecl::enumeration("Color", &["red", "green"])))
        .expect("ok");
    voc.declare(Declaration::Symbol(SymbolDecl::new("paint", &[], "Color")))
        .expect("ok");
    voc
}

#[test]
fn test_translate_atoms_and_choices() {
    let voc = color_vocabulary();
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let paint = exprs.apply(voc.symbol("paint").expect("ok"), vec![]).expect("ok");
    let red = exprs.constructor("red", "Color");
    let is_red = exprs.compare(CmpOp::Eq, paint, red).expect("ok");
    let both = exprs.and(vec![p, is_red]).expect("ok");

    let mut translator = Translator::new(&mut exprs, &voc);
    let paint_term = Term::Choice {
        atom: String::from("paint"),
        domain: vec![Value::name("red"), Value::name("green")],
    };
    assert_eq!(
        translator.formula(both).expect("ok"),
        Formula::And(vec![
            Formula::Atom(String::from("p")),
            Formula::compare(CmpOp::Eq, paint_term.clone(), Term::Const(Value::name("red"))),
        ])
    );

    let (probe, axiom) = translator.probe(is_red).expect("ok");
    assert_eq!(probe, Probe::Bool(Formula::Atom(String::from("paint = red"))));
    assert!(axiom.is_some());
    let (probe, axiom) = translator.probe(paint).expect("ok");
    assert_eq!(probe, Probe::Term(paint_term));
    assert!(axiom.is_none());
}

#[test]
fn test_translate_unsupported() {
    let voc = Vocabulary::new();
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let v = exprs.variable("v", "Int");

    let mut translator = Translator::new(&mut exprs, &voc);
    assert!(matches!(translator.term(x), Err(Error::UnsupportedQuery(_))));
    assert!(matches!(translator.term(v), Err(Error::UnsupportedQuery(_))));
}

#[test]
fn test_lift_nested_application() {
    use satoracle::{Check, Oracle, SatOracle};

    let mut voc = color_vocabulary();
    voc.declare(Declaration::Symbol(SymbolDecl::predicate("warm", &["Color"])))
        .expect("ok");
    let mut exprs = Exprs::new();
    let paint = exprs.apply(voc.symbol("paint").expect("ok"), vec![]).expect("ok");
    let warm_paint = exprs.apply(voc.symbol("warm").expect("ok"), vec![paint]).expect("ok");
    let green = exprs.constructor("green", "Color");
    let warm_green = exprs.apply(voc.symbol("warm").expect("ok"), vec![green]).expect("ok");
    let not_warm_green = exprs.not(warm_green).expect("ok");

    let mut translator = Translator::new(&mut exprs, &voc);
    let mut oracle = SatOracle::<String>::new();
    oracle.add(&translator.formula(warm_paint).expect("ok"));
    oracle.add(&translator.formula(not_warm_green).expect("ok"));
    assert_eq!(oracle.check(), Check::Sat);

    let (probe, _) = translator.probe(paint).expect("ok");
    let model = oracle.model().expect("model");
    assert_eq!(probe.read(model, true), Some(Value::name("red")));
}

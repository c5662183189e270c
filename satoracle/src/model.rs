//! A `Model` is the oracle's answer to a satisfiable check: a value
//! for every atom and choice the solver knows about.
use super::{Formula, StateAtom, Term, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Model<A: StateAtom> {
    atoms: HashMap<A, bool>,
    choices: HashMap<A, Value>,
}

impl<A: StateAtom> Model<A> {
    #[must_use]
    pub fn new(atoms: HashMap<A, bool>, choices: HashMap<A, Value>) -> Self {
        Self { atoms, choices }
    }

    #[must_use]
    pub fn atom(&self, atom: &A) -> Option<bool> {
        self.atoms.get(atom).copied()
    }

    #[must_use]
    pub fn choice(&self, atom: &A) -> Option<&Value> {
        self.choices.get(atom)
    }

    /// Evaluates `formula` in this model.
    ///
    /// Atoms that the solver never encoded have no value, unless
    /// `model_completion` is set, in which case they are false.
    #[must_use]
    pub fn eval_formula(&self, formula: &Formula<A>, model_completion: bool) -> Option<bool> {
        match formula {
            Formula::Const(b) => Some(*b),
            Formula::Atom(atom) => self
                .atom(atom)
                .or(if model_completion { Some(false) } else { None }),
            Formula::Not(inner) => self.eval_formula(inner, model_completion).map(|b| !b),
            Formula::And(conjuncts) => {
                self.eval_junction(conjuncts.iter(), false, model_completion)
            }
            Formula::Or(disjuncts) => self.eval_junction(disjuncts.iter(), true, model_completion),
            Formula::Implies(lhs, rhs) => {
                match (
                    self.eval_formula(lhs, model_completion),
                    self.eval_formula(rhs, model_completion),
                ) {
                    (Some(false), _) | (_, Some(true)) => Some(true),
                    (Some(true), Some(false)) => Some(false),
                    _ => None,
                }
            }
            Formula::Iff(lhs, rhs) => Some(
                self.eval_formula(lhs, model_completion)?
                    == self.eval_formula(rhs, model_completion)?,
            ),
            Formula::Compare(op, lhs, rhs) => Some(Value::compare(
                *op,
                &self.eval_term(lhs, model_completion)?,
                &self.eval_term(rhs, model_completion)?,
            )),
        }
    }

    /// Evaluates `term` in this model.  With `model_completion`,
    /// unknown choices take the first value in their domain.
    #[must_use]
    pub fn eval_term(&self, term: &Term<A>, model_completion: bool) -> Option<Value> {
        match term {
            Term::Const(value) => Some(value.clone()),
            Term::Choice { atom, domain } => match self.choice(atom) {
                Some(value) => Some(value.clone()),
                None if model_completion => domain.first().cloned(),
                None => None,
            },
            Term::Formula(formula) => self.eval_formula(formula, model_completion).map(Value::Bool),
            Term::Ite(cond, then, otherwise) => {
                if self.eval_formula(cond, model_completion)? {
                    self.eval_term(then, model_completion)
                } else {
                    self.eval_term(otherwise, model_completion)
                }
            }
            Term::Arith(op, lhs, rhs) => Value::arith(
                *op,
                &self.eval_term(lhs, model_completion)?,
                &self.eval_term(rhs, model_completion)?,
            ),
            Term::Neg(inner) => self.eval_term(inner, model_completion)?.negate(),
        }
    }

    /// Evaluates an n-ary conjunction (`absorbing = false`) or
    /// disjunction (`absorbing = true`).  The absorbing value wins
    /// even when some operands are unknown.
    fn eval_junction<'a, I>(&self, operands: I, absorbing: bool, model_completion: bool) -> Option<bool>
    where
        I: Iterator<Item = &'a Formula<A>>,
        A: 'a,
    {
        let mut unknown = false;
        for operand in operands {
            match self.eval_formula(operand, model_completion) {
                Some(b) if b == absorbing => return Some(absorbing),
                Some(_) => {}
                None => unknown = true,
            }
        }

        if unknown {
            None
        } else {
            Some(!absorbing)
        }
    }
}

#[test]
fn test_eval_completion() {
    use super::CmpOp;

    let model = Model::new(
        [(String::from("p"), true)].iter().cloned().collect(),
        [(String::from("f"), Value::int(2))].iter().cloned().collect(),
    );

    let q = Formula::Atom(String::from("q"));
    assert_eq!(model.eval_formula(&q, false), None);
    assert_eq!(model.eval_formula(&q, true), Some(false));

    // `p or q` is true even though `q` is unknown.
    let either = Formula::Or(vec![Formula::Atom(String::from("p")), q]);
    assert_eq!(model.eval_formula(&either, false), Some(true));

    let g = Term::Choice {
        atom: String::from("g"),
        domain: vec![Value::int(5), Value::int(6)],
    };
    assert_eq!(model.eval_term(&g, false), None);
    assert_eq!(model.eval_term(&g, true), Some(Value::int(5)));

    let f = Term::Choice {
        atom: String::from("f"),
        domain: vec![Value::int(1), Value::int(2)],
    };
    let cmp = Formula::compare(CmpOp::Lt, f, Term::Const(Value::int(3)));
    assert_eq!(model.eval_formula(&cmp, false), Some(true));
}

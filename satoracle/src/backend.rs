//! `SatOracle` encodes ground `Formula`e into a single incremental
//! CryptoMiniSat instance.
//!
//! Booleans map to one variable each.  Finite-domain `Choice` terms
//! map to one variable per domain value, under an exactly-one choice
//! constraint.  Every composite term becomes a "value table": a list
//! of `(value, literal)` pairs where, in any model, exactly the
//! literal for the term's value is true (or none, when the term is
//! undefined, e.g., on division by zero).
//!
//! CryptoMiniSat has no push/pop.  Each scope instead owns a selector
//! literal: clauses added in a scope are guarded by the selector,
//! every solve assumes the live selectors, and popping a scope adds a
//! unit clause that permanently disables its selector.
use super::gadgets;
use super::solver_state::SolverState;
use super::solver_state::VariableMeaning;
use super::{ChoiceConstraint, Check, Formula, Model, Oracle, StateAtom, Term, Value};
use cryptominisat::Lbool;
use cryptominisat::Lit;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tracing::trace;

type ValueTable = Vec<(Value, Lit)>;

pub struct SatOracle<A: StateAtom> {
    sat_state: SolverState<A>,
    // Always true; anchors constant formulas and rigid terms.
    top: Lit,
    // Selector literal for each open scope, innermost last.
    scopes: Vec<Lit>,
    // Tseitin outputs for formulas we have already encoded.
    gates: HashMap<Formula<A>, Lit>,
    domain: HashMap<A, ValueTable>,
    model: Option<Model<A>>,
}

impl<A: StateAtom> SatOracle<A> {
    #[must_use]
    pub fn new() -> Self {
        let mut sat_state = SolverState::new();
        let (top, _) = sat_state.ensure_var(None);
        sat_state.solver().add_clause(&[top]);

        Self {
            sat_state,
            top,
            scopes: Vec::new(),
            gates: HashMap::new(),
            domain: HashMap::new(),
            model: None,
        }
    }

    /// Refines the domain to take into account the "pick one of k"
    /// choice `constraint`, and returns the value table for its atom.
    ///
    /// Re-declaring an atom returns the table from its first
    /// declaration.
    pub fn declare_choice(&mut self, constraint: ChoiceConstraint<A>) -> ValueTable {
        if let Some(table) = self.domain.get(&constraint.atom) {
            return table.clone();
        }

        let table: ValueTable = constraint
            .options
            .iter()
            .map(|value| {
                let meaning = VariableMeaning::Choice(constraint.atom.clone(), value.clone());
                (value.clone(), self.sat_state.ensure_var(Some(meaning)).0)
            })
            .collect();
        let vars: Vec<Lit> = table.iter().map(|(_, lit)| *lit).collect();

        gadgets::add_at_least_one_constraint(self.sat_state.solver(), &vars);
        gadgets::add_at_most_one_constraint(self.sat_state.solver(), &vars);
        self.domain.insert(constraint.atom, table.clone());
        table
    }

    /// Returns a literal that is true exactly when `formula` holds.
    fn encode(&mut self, formula: &Formula<A>) -> Lit {
        if let Some(lit) = self.gates.get(formula) {
            return *lit;
        }

        let lit = match formula {
            Formula::Const(true) => self.top,
            Formula::Const(false) => !self.top,
            Formula::Atom(atom) => {
                self.sat_state
                    .ensure_var(Some(VariableMeaning::Atom(atom.clone())))
                    .0
            }
            Formula::Not(inner) => !self.encode(inner),
            Formula::And(conjuncts) => {
                let inputs: Vec<Lit> = conjuncts.iter().map(|x| self.encode(x)).collect();
                self.and_gate(&inputs)
            }
            Formula::Or(disjuncts) => {
                let inputs: Vec<Lit> = disjuncts.iter().map(|x| self.encode(x)).collect();
                self.or_gate(&inputs)
            }
            Formula::Implies(lhs, rhs) => {
                let inputs = [!self.encode(lhs), self.encode(rhs)];
                self.or_gate(&inputs)
            }
            Formula::Iff(lhs, rhs) => {
                let (lhs, rhs) = (self.encode(lhs), self.encode(rhs));
                let (output, _) = self.sat_state.ensure_var(None);
                gadgets::add_tseitin_iff(self.sat_state.solver(), output, lhs, rhs);
                output
            }
            Formula::Compare(op, lhs, rhs) => {
                let (lhs, rhs) = (self.table(lhs), self.table(rhs));
                let mut matches = Vec::new();
                for (lhs_value, lhs_lit) in &lhs {
                    for (rhs_value, rhs_lit) in &rhs {
                        if Value::compare(*op, lhs_value, rhs_value) {
                            matches.push(self.and_gate(&[*lhs_lit, *rhs_lit]));
                        }
                    }
                }

                self.or_gate(&matches)
            }
        };

        self.gates.insert(formula.clone(), lit);
        lit
    }

    /// Returns the value table for `term`.
    fn table(&mut self, term: &Term<A>) -> ValueTable {
        match term {
            Term::Const(value) => vec![(value.clone(), self.top)],
            Term::Choice { atom, domain } => {
                self.declare_choice(ChoiceConstraint::new(atom.clone(), domain.iter().cloned()))
            }
            Term::Formula(formula) => {
                let lit = self.encode(formula);
                vec![(Value::Bool(true), lit), (Value::Bool(false), !lit)]
            }
            Term::Ite(cond, then, otherwise) => {
                let cond = self.encode(cond);
                let mut groups: BTreeMap<Value, Vec<Lit>> = BTreeMap::new();
                for (guard, branch) in [(cond, then), (!cond, otherwise)] {
                    for (value, lit) in self.table(branch) {
                        let both = self.and_gate(&[guard, lit]);
                        groups.entry(value).or_default().push(both);
                    }
                }

                self.merge_groups(groups)
            }
            Term::Arith(op, lhs, rhs) => {
                let (lhs, rhs) = (self.table(lhs), self.table(rhs));
                let mut groups: BTreeMap<Value, Vec<Lit>> = BTreeMap::new();
                for (lhs_value, lhs_lit) in &lhs {
                    for (rhs_value, rhs_lit) in &rhs {
                        if let Some(value) = Value::arith(*op, lhs_value, rhs_value) {
                            let both = self.and_gate(&[*lhs_lit, *rhs_lit]);
                            groups.entry(value).or_default().push(both);
                        }
                    }
                }

                self.merge_groups(groups)
            }
            Term::Neg(inner) => self
                .table(inner)
                .into_iter()
                .filter_map(|(value, lit)| value.negate().map(|v| (v, lit)))
                .collect(),
        }
    }

    fn merge_groups(&mut self, groups: BTreeMap<Value, Vec<Lit>>) -> ValueTable {
        groups
            .into_iter()
            .map(|(value, lits)| (value, self.or_gate(&lits)))
            .collect()
    }

    fn and_gate(&mut self, inputs: &[Lit]) -> Lit {
        match inputs {
            [] => self.top,
            [single] => *single,
            _ => {
                let (output, _) = self.sat_state.ensure_var(None);
                gadgets::add_tseitin_and(self.sat_state.solver(), output, inputs);
                output
            }
        }
    }

    fn or_gate(&mut self, inputs: &[Lit]) -> Lit {
        match inputs {
            [] => !self.top,
            [single] => *single,
            _ => {
                let (output, _) = self.sat_state.ensure_var(None);
                gadgets::add_tseitin_or(self.sat_state.solver(), output, inputs);
                output
            }
        }
    }

    /// Solves under the live scopes and `extra` assumptions, and
    /// captures the model on success.
    fn solve(&mut self, extra: Option<Lit>) -> Check {
        let mut assumptions = self.scopes.clone();
        assumptions.extend(extra);

        match self.sat_state.solver().solve_with_assumptions(&assumptions) {
            Lbool::True => {
                self.model = Some(self.capture_model());
                Check::Sat
            }
            Lbool::False => {
                self.model = None;
                Check::Unsat
            }
            Lbool::Undef => {
                self.model = None;
                Check::Unknown
            }
        }
    }

    fn capture_model(&self) -> Model<A> {
        let mut atoms = HashMap::new();
        let mut choices = HashMap::new();

        for (meaning, value) in self.sat_state.model_values() {
            match meaning {
                VariableMeaning::Atom(atom) => {
                    atoms.insert(atom.clone(), value);
                }
                VariableMeaning::Choice(atom, choice) => {
                    if value {
                        choices.insert(atom.clone(), choice.clone());
                    }
                }
            }
        }

        Model::new(atoms, choices)
    }

    /// Tries the values of `term` in order, and returns the first one
    /// that is consistent with the current scopes.
    fn first_feasible(&mut self, term: &Term<A>, descending: bool) -> Option<Value> {
        let mut table = self.table(term);
        table.sort_by(|a, b| a.0.cmp(&b.0));
        if descending {
            table.reverse();
        }

        for (value, lit) in table {
            match self.solve(Some(lit)) {
                Check::Sat => return Some(value),
                Check::Unsat => continue,
                Check::Unknown => return None,
            }
        }

        None
    }
}

impl<A: StateAtom> Default for SatOracle<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: StateAtom> Oracle<A> for SatOracle<A> {
    fn push(&mut self) {
        let (selector, _) = self.sat_state.ensure_var(None);
        self.scopes.push(selector);
    }

    fn pop(&mut self) {
        if let Some(selector) = self.scopes.pop() {
            gadgets::add_nogood(self.sat_state.solver(), &[selector]);
        }
    }

    fn add(&mut self, formula: &Formula<A>) {
        let lit = self.encode(formula);
        let mut clause = vec![lit];
        clause.extend(self.scopes.last().map(|selector| !*selector));
        trace!(depth = self.scopes.len(), "asserting {:?}", formula);
        self.sat_state.solver().add_clause(&clause);
    }

    fn check(&mut self) -> Check {
        self.solve(None)
    }

    fn model(&self) -> Option<&Model<A>> {
        self.model.as_ref()
    }

    fn minimize(&mut self, term: &Term<A>) -> Option<Value> {
        self.first_feasible(term, false)
    }

    fn maximize(&mut self, term: &Term<A>) -> Option<Value> {
        self.first_feasible(term, true)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn fresh(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
fn choice(name: &str, domain: &[i64]) -> Term<String> {
    Term::Choice {
        atom: name.into(),
        domain: domain.iter().map(|x| Value::int(*x)).collect(),
    }
}

#[test]
fn test_smoke() {
    // An empty oracle is trivially satisfiable.
    let mut oracle = SatOracle::<String>::new();
    assert_eq!(oracle.check(), Check::Sat);

    oracle.add(&Formula::Const(false));
    assert_eq!(oracle.check(), Check::Unsat);
}

#[test]
fn test_push_pop() {
    let mut oracle = SatOracle::<String>::new();
    let p = Formula::Atom(String::from("p"));

    oracle.add(&p);
    oracle.push();
    oracle.add(&Formula::not(p.clone()));
    assert_eq!(oracle.check(), Check::Unsat);
    oracle.pop();

    assert_eq!(oracle.check(), Check::Sat);
    let model = oracle.model().expect("has model");
    assert_eq!(model.eval_formula(&p, false), Some(true));
}

#[test]
fn test_nested_scopes() {
    let mut oracle = SatOracle::<String>::new();
    let (p, q) = (
        Formula::Atom(String::from("p")),
        Formula::Atom(String::from("q")),
    );

    oracle.push();
    oracle.add(&p);
    oracle.push();
    oracle.add(&Formula::not(p.clone()));
    assert_eq!(oracle.check(), Check::Unsat);
    oracle.pop();
    oracle.add(&q);
    assert_eq!(oracle.check(), Check::Sat);
    oracle.pop();

    // Both scopes are gone: `not p and not q` is fine again.
    oracle.add(&Formula::not(p));
    oracle.add(&Formula::not(q));
    assert_eq!(oracle.check(), Check::Sat);
}

#[test]
fn test_blocking_enumeration() {
    // Enumerate all models of `p or q` with blocking clauses.
    let mut oracle = SatOracle::<String>::new();
    let (p, q) = (
        Formula::Atom(String::from("p")),
        Formula::Atom(String::from("q")),
    );
    oracle.add(&Formula::Or(vec![p.clone(), q.clone()]));

    let mut count = 0;
    while oracle.check() == Check::Sat {
        let model = oracle.model().expect("has model").clone();
        let literals: Vec<Formula<String>> = [&p, &q]
            .iter()
            .map(|atom| {
                if model.eval_formula(atom, true) == Some(true) {
                    (*atom).clone()
                } else {
                    Formula::not((*atom).clone())
                }
            })
            .collect();
        oracle.add(&Formula::not(Formula::And(literals)));
        count += 1;
        assert!(count <= 3);
    }

    assert_eq!(count, 3);
}

#[test]
fn test_choice_arithmetic() {
    // x, y in {1, 2, 3}, x + y = 5, x < y.
    let mut oracle = SatOracle::<String>::new();
    let (x, y) = (choice("x", &[1, 2, 3]), choice("y", &[1, 2, 3]));

    oracle.add(&Formula::equals(
        Term::arith(super::ArithOp::Add, x.clone(), y.clone()),
        Value::int(5),
    ));
    oracle.add(&Formula::compare(super::CmpOp::Lt, x.clone(), y.clone()));
    assert_eq!(oracle.check(), Check::Sat);

    let model = oracle.model().expect("has model");
    assert_eq!(model.eval_term(&x, false), Some(Value::int(2)));
    assert_eq!(model.eval_term(&y, false), Some(Value::int(3)));
}

#[test]
fn test_ite_and_division() {
    // z = if p then 6 / x else 0, with x in {0, 2}; z = 3 forces p.
    let mut oracle = SatOracle::<String>::new();
    let p = Formula::Atom(String::from("p"));
    let x = choice("x", &[0, 2]);
    let z = Term::ite(
        p.clone(),
        Term::arith(super::ArithOp::Div, Term::Const(Value::int(6)), x.clone()),
        Term::Const(Value::int(0)),
    );

    oracle.add(&Formula::equals(z, Value::int(3)));
    assert_eq!(oracle.check(), Check::Sat);

    let model = oracle.model().expect("has model");
    assert_eq!(model.eval_formula(&p, false), Some(true));
    assert_eq!(model.eval_term(&x, false), Some(Value::int(2)));
}

#[test]
fn test_optimize() {
    let mut oracle = SatOracle::<String>::new();
    let x = choice("x", &[1, 2, 3, 4, 5]);

    oracle.add(&Formula::compare(
        super::CmpOp::Gt,
        x.clone(),
        Term::Const(Value::int(1)),
    ));
    oracle.push();
    oracle.add(&Formula::compare(
        super::CmpOp::Ne,
        x.clone(),
        Term::Const(Value::int(5)),
    ));

    assert_eq!(oracle.minimize(&x), Some(Value::int(2)));
    assert_eq!(oracle.maximize(&x), Some(Value::int(4)));
    // The model reflects the last optimum found.
    assert_eq!(
        oracle.model().expect("has model").eval_term(&x, false),
        Some(Value::int(4))
    );

    oracle.pop();
    assert_eq!(oracle.maximize(&x), Some(Value::int(5)));
}

#[test]
fn test_reset() {
    let mut oracle = SatOracle::<String>::new();
    oracle.add(&Formula::Const(false));
    assert_eq!(oracle.check(), Check::Unsat);

    oracle.reset();
    assert_eq!(oracle.check(), Check::Sat);
}

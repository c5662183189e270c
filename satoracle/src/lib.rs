//! A narrow, stateful satisfiability oracle for finite-domain ground
//! formulas.
//!
//! Clients speak to the oracle through the `Oracle` trait:
//! `push`/`pop` scoping, `add` assertions, `check`, and `model`
//! inspection, plus `minimize`/`maximize` for optimisation.  The
//! `SatOracle` implementation encodes everything into CryptoMiniSat.
mod backend;
mod formula;
mod gadgets;
mod kb;
mod model;
mod solver_state;
mod value;

pub use backend::SatOracle;
pub use formula::ArithOp;
pub use formula::CmpOp;
pub use formula::Formula;
pub use formula::Term;
pub use kb::ChoiceConstraint;
pub use kb::StateAtom;
pub use model::Model;
pub use value::Value;

/// The answer to a satisfiability `check`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Check {
    Sat,
    Unsat,
    /// The oracle gave up (e.g., on a resource limit).
    Unknown,
}

/// An incremental satisfiability oracle over atoms of type `A`.
///
/// Every assertion belongs to the innermost scope open when it was
/// `add`ed, and disappears when that scope is `pop`ped.
pub trait Oracle<A: StateAtom> {
    /// Opens a new assertion scope.
    fn push(&mut self);

    /// Closes the innermost scope, retracting everything asserted in
    /// it.  Popping without an open scope does nothing.
    fn pop(&mut self);

    /// Asserts `formula` in the current scope.
    fn add(&mut self, formula: &Formula<A>);

    /// Checks whether the current assertions are satisfiable.
    fn check(&mut self) -> Check;

    /// Returns the model found by the last successful check or
    /// optimisation, if any.
    fn model(&self) -> Option<&Model<A>>;

    /// Returns the smallest value `term` may take under the current
    /// assertions, and leaves a witnessing model behind.
    fn minimize(&mut self, term: &Term<A>) -> Option<Value>;

    /// Returns the largest value `term` may take under the current
    /// assertions, and leaves a witnessing model behind.
    fn maximize(&mut self, term: &Term<A>) -> Option<Value>;

    /// Drops every assertion and scope, as if freshly constructed.
    fn reset(&mut self);

    /// Returns a new, empty, session of the same kind of oracle.
    #[must_use]
    fn fresh(&self) -> Self
    where
        Self: Sized;

    /// Evaluates `term` in the current model.
    fn eval(&self, term: &Term<A>, model_completion: bool) -> Option<Value> {
        self.model()
            .and_then(|model| model.eval_term(term, model_completion))
    }
}

#[test]
fn test_eval_through_trait() {
    let mut oracle = SatOracle::<String>::new();
    let f = Term::Choice {
        atom: String::from("f"),
        domain: vec![Value::name("red"), Value::name("green")],
    };

    oracle.add(&Formula::equals(f.clone(), Value::name("green")));
    assert_eq!(oracle.check(), Check::Sat);
    assert_eq!(oracle.eval(&f, false), Some(Value::name("green")));

    let unseen = Term::Choice {
        atom: String::from("g"),
        domain: vec![Value::int(7)],
    };
    assert_eq!(oracle.eval(&unseen, false), None);
    assert_eq!(oracle.eval(&unseen, true), Some(Value::int(7)));
}

//! In order to represent our search space in CryptoMiniSat, we need a
//! mapping between variable id (u32) and what the variable stands
//! for: a boolean atom, one value of a finite-domain choice, or an
//! anonymous Tseitin gate / scope selector.
//!
//! CryptoMiniSat needs us to explicitly register new variables; this
//! module owns the solver so that every variable goes through the
//! same registry.
use super::StateAtom;
use super::Value;
use cryptominisat::Lbool;
use cryptominisat::Lit;
use cryptominisat::Solver;
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum VariableMeaning<A: StateAtom> {
    Atom(A),
    Choice(A, Value),
}

pub struct SolverState<A: StateAtom> {
    from_id: Vec<Option<VariableMeaning<A>>>,
    to_id: HashMap<VariableMeaning<A>, Lit>,
    solver: Solver,
}

/// A `SolverState` owns a CryptoMiniSat solver, and maintains a
/// mapping between variable id and what they mean, while creating
/// new variables on demand.
impl<A: StateAtom> SolverState<A> {
    /// Returns a fresh `SolverState` instance.
    pub fn new() -> Self {
        Self {
            from_id: Vec::new(),
            to_id: HashMap::new(),
            solver: Solver::new(),
        }
    }

    /// Returns a variable for `wanted`.  If `wanted` is `None`,
    /// always returns a fresh variable.  Otherwise, returns a
    /// pre-existing variable when there already exists one for
    /// the `wanted` meaning.
    ///
    /// Returns a pair of `(variable, freshly_created?)`.
    pub fn ensure_var(&mut self, wanted: Option<VariableMeaning<A>>) -> (Lit, bool) {
        match wanted {
            Some(meaning) => {
                if let Some(id) = self.to_id.get(&meaning) {
                    return (*id, false);
                }

                let var = self.new_var(Some(meaning.clone()));
                self.to_id.insert(meaning, var);
                (var, true)
            }

            None => (self.new_var(None), true),
        }
    }

    /// Returns the meaning associated with `var`, if any.
    #[cfg(test)]
    pub fn meaning(&self, var: Lit) -> Option<&VariableMeaning<A>> {
        match self.from_id.get(var.var() as usize) {
            Some(Some(ret)) => Some(ret),
            _ => None,
        }
    }

    /// Returns the solver.
    pub fn solver(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Returns every meaningful variable along with its value in the
    /// solver's last model.  Must only be called after a satisfiable
    /// solve.
    pub fn model_values(&self) -> Vec<(&VariableMeaning<A>, bool)> {
        let model = self.solver.get_model();

        self.to_id
            .iter()
            .map(|(meaning, lit)| {
                // `to_id` only holds positive literals fresh from `new_var`.
                let value = model.get(lit.var() as usize) == Some(&Lbool::True);
                (meaning, value)
            })
            .collect()
    }

    /// Creates a new variable in the solver, and registers it in
    /// `from_id`.
    fn new_var(&mut self, wanted: Option<VariableMeaning<A>>) -> Lit {
        assert!(self.from_id.len() >= self.to_id.len());
        assert_eq!(self.from_id.len(), self.solver.nvars() as usize);

        let var = self.solver.new_var();
        assert_eq!(var.var() as usize, self.from_id.len());

        self.from_id.push(wanted);
        var
    }
}

#[test]
fn test_ensure_var() {
    let mut state = SolverState::<String>::new();

    let (x, fresh) = state.ensure_var(Some(VariableMeaning::Atom("x".into())));
    assert!(fresh);
    let (again, fresh) = state.ensure_var(Some(VariableMeaning::Atom("x".into())));
    assert!(!fresh);
    assert_eq!(x, again);

    let (gate, fresh) = state.ensure_var(None);
    assert!(fresh);
    assert_ne!(gate, x);
    assert_eq!(state.meaning(gate), None);
    assert_eq!(
        state.meaning(x),
        Some(&VariableMeaning::Atom(String::from("x")))
    );
}

//! We must translate our high-level constraints (e.g., "exactly one
//! of these values", "this literal is the conjunction of those") to
//! CNF clauses in order to use SAT.  This module handles that
//! translation.
use cryptominisat::Lit;
use cryptominisat::Solver;

/// Add a nogood for `vars`.
pub fn add_nogood(solver: &mut Solver, nogood: &[Lit]) {
    // We don't want solutions where all the literals are satisfied.
    // In other words, at least one of them must be violated, i.e.
    // at least one of their complements must be true.
    solver.add_clause(&nogood.iter().map(|x| !*x).collect::<Vec<_>>());
}

/// Forces at least one of `vars` to be true.
pub fn add_at_least_one_constraint(solver: &mut Solver, vars: &[Lit]) {
    solver.add_clause(vars);
}

/// Forbids any pair of `vars` from being true together.  The
/// pairwise encoding is quadratic, but our domains are small.
pub fn add_at_most_one_constraint(solver: &mut Solver, vars: &[Lit]) {
    for (i, x) in vars.iter().enumerate() {
        for y in &vars[i + 1..] {
            add_nogood(solver, &[*x, *y]);
        }
    }
}

/// Constrains `output` to equal the conjunction of `inputs`.
pub fn add_tseitin_and(solver: &mut Solver, output: Lit, inputs: &[Lit]) {
    // output -> input, for each input.
    for input in inputs {
        solver.add_clause(&[!output, *input]);
    }

    // all inputs -> output.
    let mut clause: Vec<Lit> = inputs.iter().map(|x| !*x).collect();
    clause.push(output);
    solver.add_clause(&clause);
}

/// Constrains `output` to equal the disjunction of `inputs`.
pub fn add_tseitin_or(solver: &mut Solver, output: Lit, inputs: &[Lit]) {
    // input -> output, for each input.
    for input in inputs {
        solver.add_clause(&[output, !*input]);
    }

    // output -> some input.
    let mut clause: Vec<Lit> = inputs.to_vec();
    clause.push(!output);
    solver.add_clause(&clause);
}

/// Constrains `output` to be true iff `lhs` and `rhs` agree.
pub fn add_tseitin_iff(solver: &mut Solver, output: Lit, lhs: Lit, rhs: Lit) {
    solver.add_clause(&[!output, !lhs, rhs]);
    solver.add_clause(&[!output, lhs, !rhs]);
    solver.add_clause(&[output, lhs, rhs]);
    solver.add_clause(&[output, !lhs, !rhs]);
}

#[cfg(test)]
fn assumptions_for(vars: &[Lit], values: usize) -> Vec<Lit> {
    vars.iter()
        .enumerate()
        .map(|(i, var)| Lit::new(var.var(), (values & (1 << i)) == 0).expect("ok"))
        .collect()
}

#[test]
fn test_nogood() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let (x, y, z) = (solver.new_var(), solver.new_var(), solver.new_var());

    // Add a nogood for (x, y, z)
    add_nogood(&mut solver, &[x, y, z]);

    // The constraint set is feasible.
    assert_eq!(solver.solve(), Lbool::True);
    // Iterate over the truth value for all 3 variables
    for values in 0..8 {
        let assumptions = assumptions_for(&[x, y, z], values);
        // Should be true if `values != 7` (if variables not all true).
        let expected = if values == 7 {
            Lbool::False
        } else {
            Lbool::True
        };

        assert_eq!(solver.solve_with_assumptions(&assumptions), expected);
    }
}

#[test]
fn test_exactly_one() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let vars = [solver.new_var(), solver.new_var(), solver.new_var()];

    add_at_least_one_constraint(&mut solver, &vars);
    add_at_most_one_constraint(&mut solver, &vars);

    for values in 0..8usize {
        let expected = if values.count_ones() == 1 {
            Lbool::True
        } else {
            Lbool::False
        };

        assert_eq!(
            solver.solve_with_assumptions(&assumptions_for(&vars, values)),
            expected
        );
    }
}

#[test]
fn test_tseitin_gates() {
    use cryptominisat::Lbool;

    let mut solver = Solver::new();
    let (x, y) = (solver.new_var(), solver.new_var());
    let (and, or, iff) = (solver.new_var(), solver.new_var(), solver.new_var());

    add_tseitin_and(&mut solver, and, &[x, y]);
    add_tseitin_or(&mut solver, or, &[x, y]);
    add_tseitin_iff(&mut solver, iff, x, y);

    for values in 0..4usize {
        let x_value = (values & 1) != 0;
        let y_value = (values & 2) != 0;
        let mut assumptions = assumptions_for(&[x, y], values);

        assumptions.push(Lit::new(and.var(), !(x_value && y_value)).expect("ok"));
        assumptions.push(Lit::new(or.var(), !(x_value || y_value)).expect("ok"));
        assumptions.push(Lit::new(iff.var(), x_value != y_value).expect("ok"));
        assert_eq!(solver.solve_with_assumptions(&assumptions), Lbool::True);

        // Flipping the gate output must be infeasible.
        assumptions[2] = !assumptions[2];
        assert_eq!(solver.solve_with_assumptions(&assumptions), Lbool::False);
    }
}

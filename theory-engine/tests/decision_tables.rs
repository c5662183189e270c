//! End-to-end tests against the CryptoMiniSat-backed oracle.

use satoracle::{Check, Formula, Model, Oracle, SatOracle, Term, Value};
use std::cell::Cell;
use std::rc::Rc;
use theory_engine::expr::Binding;
use theory_engine::{
    join_set_conditions, Assignment, ConsequenceEngine, DecisionTableSynthesizer, EngineConfig, Error, Exprs,
    NodeId, Propagation, Row, RuleCase, Status, SymbolDecl, Termination, TheoryBlock, TheoryModel,
};

/// Answers `Unknown` to the next `unknowns` checks, then defers to a
/// real oracle.  Fresh sessions share the counter.
struct Flaky {
    inner: SatOracle<String>,
    unknowns: Rc<Cell<usize>>,
}

impl Flaky {
    fn new(unknowns: usize) -> Self {
        Flaky {
            inner: SatOracle::new(),
            unknowns: Rc::new(Cell::new(unknowns)),
        }
    }
}

impl Oracle<String> for Flaky {
    fn push(&mut self) {
        self.inner.push();
    }

    fn pop(&mut self) {
        self.inner.pop();
    }

    fn add(&mut self, formula: &Formula<String>) {
        self.inner.add(formula);
    }

    fn check(&mut self) -> Check {
        let left = self.unknowns.get();
        if left > 0 {
            self.unknowns.set(left - 1);
            return Check::Unknown;
        }

        self.inner.check()
    }

    fn model(&self) -> Option<&Model<String>> {
        self.inner.model()
    }

    fn minimize(&mut self, term: &Term<String>) -> Option<Value> {
        self.inner.minimize(term)
    }

    fn maximize(&mut self, term: &Term<String>) -> Option<Value> {
        self.inner.maximize(term)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn fresh(&self) -> Self {
        Flaky {
            inner: self.inner.fresh(),
            unknowns: self.unknowns.clone(),
        }
    }
}

fn booleans(theory: &mut TheoryModel, names: &[&str]) -> Vec<NodeId> {
    theory
        .add(TheoryBlock {
            declarations: names
                .iter()
                .map(|n| theory_engine::Declaration::Symbol(SymbolDecl::predicate(n, &[])))
                .collect(),
            ..TheoryBlock::default()
        })
        .expect("ok");

    names
        .iter()
        .map(|n| {
            let decl = theory.symbol(n).expect("declared");
            theory.exprs_mut().apply(decl, vec![]).expect("ok")
        })
        .collect()
}

/// `g ← a ∧ b`.
fn conjunction_theory() -> TheoryModel {
    let mut theory = TheoryModel::new();
    let atoms = booleans(&mut theory, &["a", "b", "g"]);
    let body = theory.exprs_mut().and(vec![atoms[0], atoms[1]]).expect("ok");
    theory
        .add(TheoryBlock {
            rules: vec![RuleCase {
                symbol: "g".into(),
                vars: vec![],
                value: None,
                body,
            }],
            ..TheoryBlock::default()
        })
        .expect("ok");
    theory
}

/// Returns whether every condition of `row` holds when `a` and `b`
/// take the given values.
fn row_matches(exprs: &mut Exprs, row: &Row, a: bool, b: bool) -> bool {
    let mut binding = Binding::default();
    binding.insert("a".into(), exprs.truth(a));
    binding.insert("b".into(), exprs.truth(b));

    row.conditions().iter().all(|condition| {
        let literal = condition.literal(exprs).expect("ok").expect("decided");
        let ground = exprs.substitute(literal, &binding).expect("ok");
        exprs.truth_value(ground) == Some(true)
    })
}

fn outcome(exprs: &Exprs, row: &Row) -> Option<bool> {
    row.goal()
        .and_then(|goal| goal.value)
        .and_then(|value| exprs.truth_value(value))
}

#[test]
fn first_hit_table_covers_every_case() {
    let mut theory = conjunction_theory();
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let rows = synthesizer.table(Some("g"), true, true).expect("ok");
    drop(synthesizer);
    assert!(!rows.is_empty());

    let exprs = theory.exprs_mut();
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let hit = rows
            .iter()
            .find(|row| row_matches(exprs, row, a, b))
            .unwrap_or_else(|| panic!("no row for a={} b={}", a, b));
        assert_eq!(outcome(exprs, hit), Some(a && b), "a={} b={}", a, b);
    }
}

#[test]
fn unordered_table_rows_are_disjoint() {
    let mut theory = conjunction_theory();
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let rows = synthesizer.table(Some("g"), false, true).expect("ok");
    drop(synthesizer);

    let exprs = theory.exprs_mut();
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let hits: Vec<&Row> = rows.iter().filter(|row| row_matches(exprs, row, a, b)).collect();
        assert!(!hits.is_empty(), "no row for a={} b={}", a, b);
        for hit in hits {
            assert_eq!(outcome(exprs, hit), Some(a && b));
        }
    }
}

#[test]
fn join_removes_excluded_values() {
    let mut exprs = Exprs::new();
    let x = exprs
        .apply(Rc::new(SymbolDecl::new("x", &[], "Int")), vec![])
        .expect("ok");
    let (one, two, three) = (exprs.int(1), exprs.int(2), exprs.int(3));
    let wide = exprs.membership(x, vec![one, two, three]).expect("ok");
    let narrow = exprs.membership(x, vec![two]).expect("ok");

    let literal = |sentence: NodeId, value: bool, exprs: &Exprs| Assignment {
        sentence,
        value: Some(exprs.truth(value)),
        status: Status::Expanded,
        relevant: None,
        symbol_decl: None,
    };

    let mut literals = vec![
        Some(literal(wide, true, &exprs)),
        Some(literal(narrow, false, &exprs)),
    ];
    join_set_conditions(&mut exprs, &mut literals).expect("ok");

    let merged = literals[0].as_ref().expect("kept");
    assert_eq!(exprs.code(merged.sentence), "x ∈ {1, 3}");
    assert!(literals[1].is_none());
}

#[test]
fn propagate_restarts_on_unknown() {
    let mut theory = TheoryModel::new();
    let atoms = booleans(&mut theory, &["a", "b"]);
    let implication = theory.exprs_mut().implies(atoms[0], atoms[1]).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![atoms[0], implication],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let oracle = Flaky::new(1);
    let counter = oracle.unknowns.clone();
    let mut engine = ConsequenceEngine::new(&mut theory, oracle);
    assert_eq!(
        engine.propagate(Status::Consequence, false).expect("ok"),
        Propagation::Consequences(2)
    );
    drop(engine);
    assert_eq!(counter.get(), 0);

    let verum = theory.exprs().truth(true);
    assert_eq!(theory.assignment("b").and_then(|a| a.value), Some(verum));
}

#[test]
fn persistent_unknown_is_an_error() {
    let mut theory = TheoryModel::new();
    let atoms = booleans(&mut theory, &["a"]);
    theory
        .add(TheoryBlock {
            constraints: atoms,
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut engine = ConsequenceEngine::new(&mut theory, Flaky::new(10));
    assert!(matches!(
        engine.propagate(Status::Consequence, false),
        Err(Error::OracleUnknown(_))
    ));

    let mut expansion = engine.expand(3, true, false).expect("ok");
    assert!(expansion.next().is_none());
    assert_eq!(expansion.termination(), Some(Termination::Unknown));
}

#[test]
fn table_survives_one_unknown() {
    let mut theory = conjunction_theory();
    let config = EngineConfig::from_json(r#"{"unknown_restarts": 1}"#).expect("ok");
    let mut synthesizer = DecisionTableSynthesizer::with_config(&mut theory, Flaky::new(1), config);
    let rows = synthesizer.table(Some("g"), false, true).expect("ok");
    assert_eq!(rows.len(), 3);
}

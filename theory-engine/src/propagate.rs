//! Consequence finding, model expansion and optimisation.
//!
//! `symbolic_propagate` reads consequences straight off the shape of
//! a sentence known to be true (or false), without any solver.  The
//! `ConsequenceEngine` completes it with an `Oracle`: a question is
//! entailed to take value `v` when the theory is satisfiable with `v`
//! and unsatisfiable once `v` is excluded.
//!
//! Every oracle-backed operation opens its own session, so a caller
//! can interleave them freely.
use crate::assignments::{Assignments, Status};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::expr::{Binding, ExprKind, Exprs, NodeId, UnaryOp};
use crate::theory::TheoryModel;
use crate::translate::Probe;
use satoracle::{Check, CmpOp, Formula, Model, Oracle, Term, Value};
use tracing::{debug, trace, warn};

/// Returns the `(sentence, value)` pairs that follow from `node`
/// having truth value `truth`, restricted to the sentences tracked in
/// `assignments`.
///
/// This is a single forward pass; callers re-run it as facts are
/// asserted, until nothing new comes out.
#[must_use]
pub fn symbolic_propagate(
    exprs: &Exprs,
    node: NodeId,
    assignments: &Assignments,
    truth: bool,
) -> Vec<(NodeId, NodeId)> {
    let mut ret = Vec::new();
    propagate_into(exprs, node, assignments, truth, &mut ret);
    ret
}

fn propagate_into(
    exprs: &Exprs,
    id: NodeId,
    assignments: &Assignments,
    truth: bool,
    out: &mut Vec<(NodeId, NodeId)>,
) {
    let node = exprs.node(id);
    if node.value.is_some() || exprs.is_rigid(id) {
        return;
    }

    let tracked = |id: NodeId| assignments.contains(exprs.code(id));
    match &node.kind {
        ExprKind::Conjunction | ExprKind::Disjunction => {
            // Only a true conjunction or a false disjunction says
            // something about every child.
            if truth != matches!(node.kind, ExprKind::Conjunction) {
                return;
            }

            for child in &node.children {
                if tracked(*child) {
                    out.push((*child, exprs.truth(truth)));
                }

                propagate_into(exprs, *child, assignments, truth, out);
            }
        }
        ExprKind::Unary(UnaryOp::Not) => {
            let child = node.children[0];
            if tracked(child) {
                out.push((child, exprs.truth(!truth)));
            }

            propagate_into(exprs, child, assignments, !truth, out);
        }
        ExprKind::Comparison(ops) if truth && ops.as_slice() == [CmpOp::Eq] => {
            let (lhs, rhs) = (node.children[0], node.children[1]);
            for (term, other) in [(lhs, rhs), (rhs, lhs)] {
                if let Some(value) = exprs.rigid(other) {
                    if !exprs.is_rigid(term) && tracked(term) {
                        out.push((term, value));
                    }
                }
            }
        }
        ExprKind::Quantification(_) => {
            // Only expanded quantifications have a simpler form.
            if let Some(body) = node.simpler {
                if tracked(body) {
                    out.push((body, exprs.truth(truth)));
                }

                propagate_into(exprs, body, assignments, truth, out);
            }
        }
        ExprKind::Bracket => {
            propagate_into(exprs, node.children[0], assignments, truth, out);
            if tracked(id) {
                out.push((id, exprs.truth(truth)));
            }
        }
        _ => {}
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Propagation {
    /// The number of new facts asserted.
    Consequences(usize),
    /// The theory has no model.
    Unsatisfiable,
}

/// Why an `Expansion` stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Termination {
    /// Every model was enumerated.
    Exhausted,
    /// The iterator reached `max_models`.
    LimitReached,
    /// The theory has no model at all.
    Unsatisfiable,
    /// The oracle gave up, even after restarting.
    Unknown,
}

#[derive(Clone, Debug)]
pub enum Optimum {
    Found {
        /// The extremal value, as a rigid node.
        value: NodeId,
        /// A witnessing model.
        model: Assignments,
    },
    Unsatisfiable,
}

/// A tracked question, as the oracle sees it.
#[derive(Clone, Debug)]
pub(crate) struct Question {
    pub node: NodeId,
    pub code: String,
    pub probe: Probe,
    /// Ties the question's atom to its meaning.
    pub axiom: Option<Formula<String>>,
}

/// Lowers the open questions of `theory` (and the compound ones when
/// `extended`) for the oracle.
pub(crate) fn open_questions(theory: &mut TheoryModel, extended: bool) -> Result<Vec<Question>> {
    let mut ids: Vec<NodeId> = theory.assignments().open().map(|a| a.sentence).collect();
    if extended {
        let compound: Vec<NodeId> = theory
            .compound_questions()
            .iter()
            .copied()
            .filter(|id| {
                theory
                    .assignment(theory.exprs().code(*id))
                    .map_or(true, |a| a.value.is_none())
            })
            .collect();
        ids.extend(compound);
    }

    let ids: Vec<(NodeId, String)> = ids
        .into_iter()
        .map(|id| (id, theory.exprs().code(id).to_string()))
        .collect();

    let mut translator = theory.translator();
    let mut ret = Vec::with_capacity(ids.len());
    for (node, code) in ids {
        let (probe, axiom) = translator.probe(node)?;
        ret.push(Question {
            node,
            code,
            probe,
            axiom,
        });
    }

    Ok(ret)
}

/// Returns the whole theory, lowered for the oracle.
pub(crate) fn theory_formula(theory: &mut TheoryModel) -> Result<Formula<String>> {
    let formula = theory.formula()?;
    theory.translator().formula(formula)
}

/// Checks `oracle`, restarting the session on unknown answers up to
/// `restarts` times.  A restart replays `session` from scratch.
pub(crate) fn check_with_restarts<O: Oracle<String>>(
    oracle: &mut O,
    session: &[Formula<String>],
    restarts: usize,
) -> Check {
    let mut answer = oracle.check();
    for attempt in 0..restarts {
        if answer != Check::Unknown {
            break;
        }

        debug!(attempt, "oracle answered unknown; restarting session");
        replay(oracle, session);
        answer = oracle.check();
    }

    answer
}

pub(crate) fn replay<O: Oracle<String>>(oracle: &mut O, session: &[Formula<String>]) {
    oracle.reset();
    for formula in session {
        oracle.add(formula);
    }
}

/// Records the value of every question in `model` into a copy of
/// `base`.
fn snapshot(
    theory: &mut TheoryModel,
    base: &Assignments,
    questions: &[Question],
    model: &Model<String>,
    complete: bool,
) -> Assignments {
    let mut ret = base.copy();
    for question in questions {
        if let Some(value) = question.probe.read(model, complete) {
            let node = theory.translator().node_for(question.node, &value);
            ret.assert_(theory.exprs(), question.node, Some(node), Status::Expanded, None);
        }
    }

    ret
}

enum Entailment {
    Entailed(Value),
    NotEntailed,
    Unknown,
}

pub struct ConsequenceEngine<'t, O: Oracle<String>> {
    theory: &'t mut TheoryModel,
    oracle: O,
    config: EngineConfig,
}

impl<'t, O: Oracle<String>> ConsequenceEngine<'t, O> {
    pub fn new(theory: &'t mut TheoryModel, oracle: O) -> Self {
        Self::with_config(theory, oracle, EngineConfig::default())
    }

    pub fn with_config(theory: &'t mut TheoryModel, oracle: O, config: EngineConfig) -> Self {
        Self {
            theory,
            oracle,
            config,
        }
    }

    #[must_use]
    pub fn theory(&self) -> &TheoryModel {
        &*self.theory
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Derives consequences without the oracle: substitutes what is
    /// known into the constraints and definitions, reads off what
    /// they imply, and asserts it with status `tag`, until nothing
    /// new comes out.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the theory cannot be interpreted.
    pub fn propagate_symbolically(&mut self, tag: Status) -> Result<Propagation> {
        self.theory.interpret()?;
        let roots: Vec<NodeId> = self
            .theory
            .ground_constraints()
            .iter()
            .chain(self.theory.def_constraints().values())
            .copied()
            .collect();

        let mut total = 0;
        loop {
            let known: Binding = self
                .theory
                .assignments()
                .known()
                .filter_map(|a| {
                    a.value
                        .map(|v| (self.theory.exprs().code(a.sentence).to_string(), v))
                })
                .collect();

            let mut found = Vec::new();
            for root in &roots {
                let node = self.theory.exprs_mut().substitute(*root, &known)?;
                let exprs = self.theory.exprs();
                // `true ⇒ b` only says something once read as `b`.
                let node = exprs.resolve(node);
                if exprs.truth_value(node) == Some(false) {
                    debug!(constraint = %exprs.code(*root), "constraint is false");
                    return Ok(Propagation::Unsatisfiable);
                }

                if self.theory.assignments().contains(exprs.code(node)) {
                    found.push((node, exprs.truth(true)));
                }

                found.extend(symbolic_propagate(exprs, node, self.theory.assignments(), true));
            }

            let mut new = 0;
            for (sentence, value) in found {
                let exprs = self.theory.exprs();
                match self.theory.assignment(exprs.code(sentence)).and_then(|a| a.value) {
                    None => {
                        trace!(sentence = %exprs.code(sentence), value = %exprs.code(value), "symbolic consequence");
                        self.theory.assert_(sentence, Some(value), tag, None);
                        new += 1;
                    }
                    Some(existing) if !exprs.same_as(existing, value) => {
                        debug!(sentence = %exprs.code(sentence), "conflicting consequences");
                        return Ok(Propagation::Unsatisfiable);
                    }
                    Some(_) => {}
                }
            }

            if new == 0 {
                break;
            }

            total += new;
        }

        Ok(Propagation::Consequences(total))
    }

    /// Enumerates up to `max_models` models, as assignment snapshots
    /// where every open question (and, when `extended`, every
    /// compound question) is decided.  With `complete`, questions the
    /// model leaves free get a default value.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the theory cannot be lowered for the oracle.
    pub fn expand(&mut self, max_models: usize, complete: bool, extended: bool) -> Result<Expansion<'_, O>> {
        let formula = theory_formula(self.theory)?;
        let questions = open_questions(self.theory, extended)?;

        let mut session = vec![formula];
        session.extend(questions.iter().filter_map(|q| q.axiom.clone()));

        let mut oracle = self.oracle.fresh();
        for formula in &session {
            oracle.add(formula);
        }

        debug!(questions = questions.len(), max_models, "expanding models");
        Ok(Expansion {
            base: self.theory.assignments().copy(),
            theory: &mut *self.theory,
            oracle,
            session,
            questions,
            max_models,
            complete,
            restarts: self.config.unknown_restarts,
            produced: 0,
            termination: None,
        })
    }

    /// `expand`, bounded by the configured `max_models`.
    ///
    /// # Errors
    ///
    /// Same as `expand`.
    pub fn models(&mut self, complete: bool, extended: bool) -> Result<Expansion<'_, O>> {
        let max_models = self.config.max_models;
        self.expand(max_models, complete, extended)
    }

    /// Asserts, with status `tag`, the value of every open question
    /// that holds in all models.  With `extended`, compound questions
    /// are tested (and asserted) too.
    ///
    /// # Errors
    ///
    /// Returns `Err(OracleUnknown)` when the theory's own satisfiability
    /// stays unknown after restarting, and `Err` when the theory cannot
    /// be lowered for the oracle.
    pub fn propagate(&mut self, tag: Status, extended: bool) -> Result<Propagation> {
        let formula = theory_formula(self.theory)?;
        let questions = open_questions(self.theory, extended)?;

        let mut session = vec![formula];
        replay(&mut self.oracle, &session);
        match check_with_restarts(&mut self.oracle, &session, self.config.unknown_restarts) {
            Check::Sat => {}
            Check::Unsat => return Ok(Propagation::Unsatisfiable),
            Check::Unknown => return Err(Error::OracleUnknown("theory".into())),
        }

        let mut found = 0;
        for question in &questions {
            let mut outcome = self.entailment(question);
            if let Entailment::Unknown = outcome {
                debug!(question = %question.code, "unknown answer; restarting session");
                replay(&mut self.oracle, &session);
                outcome = self.entailment(question);
            }

            match outcome {
                Entailment::Entailed(value) => {
                    trace!(question = %question.code, %value, "entailed");
                    let node = self.theory.translator().node_for(question.node, &value);
                    self.theory.assert_(question.node, Some(node), tag, None);

                    let mut fact = question.probe.literal(&value);
                    if let Some(axiom) = &question.axiom {
                        fact = Formula::And(vec![axiom.clone(), fact]);
                    }

                    self.oracle.add(&fact);
                    session.push(fact);
                    found += 1;
                }
                Entailment::NotEntailed => {}
                Entailment::Unknown => {
                    warn!(question = %question.code, "oracle answered unknown twice; skipping question");
                }
            }
        }

        debug!(found, questions = questions.len(), "propagated");
        Ok(Propagation::Consequences(found))
    }

    /// Tests whether `question` takes the same value in every model.
    fn entailment(&mut self, question: &Question) -> Entailment {
        self.oracle.push();
        if let Some(axiom) = &question.axiom {
            self.oracle.add(axiom);
        }

        let ret = match self.oracle.check() {
            Check::Sat => match self.oracle.model().and_then(|m| question.probe.read(m, true)) {
                Some(value) => {
                    self.oracle.push();
                    self.oracle.add(&Formula::not(question.probe.literal(&value)));
                    let ret = match self.oracle.check() {
                        Check::Unsat => Entailment::Entailed(value),
                        Check::Sat => Entailment::NotEntailed,
                        Check::Unknown => Entailment::Unknown,
                    };
                    self.oracle.pop();
                    ret
                }
                None => Entailment::NotEntailed,
            },
            Check::Unsat => Entailment::NotEntailed,
            Check::Unknown => Entailment::Unknown,
        };

        self.oracle.pop();
        ret
    }

    /// Finds the smallest (or largest) value of `term`, and a model
    /// where it is reached.
    ///
    /// The oracle's optimum is then pushed further with up to
    /// `optimize_steps` strict bounds, keeping the last one that was
    /// satisfiable.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` when `term` cannot be lowered,
    /// and `Err(OracleUnknown)` when the oracle gives up.
    pub fn optimize(&mut self, term: NodeId, minimize: bool) -> Result<Optimum> {
        let formula = theory_formula(self.theory)?;
        let questions = open_questions(self.theory, false)?;
        let objective = self.theory.translator().term(term)?;

        let mut oracle = self.oracle.fresh();
        oracle.add(&formula);
        for axiom in questions.iter().filter_map(|q| q.axiom.as_ref()) {
            oracle.add(axiom);
        }

        let first = if minimize {
            oracle.minimize(&objective)
        } else {
            oracle.maximize(&objective)
        };

        let mut best = match first {
            Some(value) => value,
            None => {
                return match oracle.check() {
                    Check::Unsat => Ok(Optimum::Unsatisfiable),
                    Check::Unknown => Err(Error::OracleUnknown("optimisation".into())),
                    Check::Sat => Err(Error::unsupported(format!(
                        "{} has no value in the model",
                        self.theory.exprs().code(term)
                    ))),
                };
            }
        };

        let mut model = oracle.model().cloned();
        let op = if minimize { CmpOp::Lt } else { CmpOp::Gt };
        for step in 0..self.config.optimize_steps {
            oracle.push();
            oracle.add(&Formula::compare(op, objective.clone(), Term::Const(best.clone())));
            let improved = match oracle.check() {
                Check::Sat => oracle.model().and_then(|m| m.eval_term(&objective, true)),
                _ => None,
            };

            match improved {
                Some(value) => {
                    trace!(step, %value, "tightened optimum");
                    best = value;
                    model = oracle.model().cloned();
                }
                None => {
                    oracle.pop();
                    break;
                }
            }
        }

        let model = model.ok_or_else(|| Error::OracleUnknown("optimisation model".into()))?;
        let base = self.theory.assignments().copy();
        let witness = snapshot(self.theory, &base, &questions, &model, true);
        let value = self.theory.translator().node_for(term, &best);
        debug!(optimum = %best, minimize, "optimised");
        Ok(Optimum::Found {
            value,
            model: witness,
        })
    }
}

/// A lazy stream of models.  Each model is blocked as soon as it is
/// produced, so no two snapshots agree on every question.
pub struct Expansion<'a, O: Oracle<String>> {
    theory: &'a mut TheoryModel,
    oracle: O,
    session: Vec<Formula<String>>,
    questions: Vec<Question>,
    base: Assignments,
    max_models: usize,
    complete: bool,
    restarts: usize,
    produced: usize,
    termination: Option<Termination>,
}

impl<'a, O: Oracle<String>> Expansion<'a, O> {
    /// Why the stream ended, once it has.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced
    }
}

impl<'a, O: Oracle<String>> Iterator for Expansion<'a, O> {
    type Item = Assignments;

    fn next(&mut self) -> Option<Assignments> {
        if self.termination.is_some() {
            return None;
        }

        if self.produced >= self.max_models {
            self.termination = Some(Termination::LimitReached);
            return None;
        }

        let answer = check_with_restarts(&mut self.oracle, &self.session, self.restarts);
        let model = match (answer, self.oracle.model()) {
            (Check::Sat, Some(model)) => model.clone(),
            (Check::Unsat, _) => {
                self.termination = Some(if self.produced == 0 {
                    Termination::Unsatisfiable
                } else {
                    Termination::Exhausted
                });
                debug!(models = self.produced, "expansion done");
                return None;
            }
            _ => {
                warn!(models = self.produced, "oracle answered unknown; stopping expansion");
                self.termination = Some(Termination::Unknown);
                return None;
            }
        };

        let literals: Vec<Formula<String>> = self
            .questions
            .iter()
            .filter_map(|q| q.probe.read(&model, self.complete).map(|v| q.probe.literal(&v)))
            .collect();
        let blocking = Formula::not(Formula::And(literals));
        self.oracle.add(&blocking);
        self.session.push(blocking);

        self.produced += 1;
        Some(snapshot(self.theory, &self.base, &self.questions, &model, self.complete))
    }
}

#[cfg(test)]
use crate::theory::{Interpretation, TheoryBlock};
#[cfg(test)]
use crate::vocabulary::{Declaration, SymbolDecl, TypeDecl};
#[cfg(test)]
use satoracle::SatOracle;

#[cfg(test)]
fn booleans(names: &[&str]) -> (TheoryModel, Vec<NodeId>) {
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: names
                .iter()
                .map(|n| Declaration::Symbol(SymbolDecl::predicate(n, &[])))
                .collect(),
            ..TheoryBlock::default()
        })
        .expect("ok");

    let atoms = names
        .iter()
        .map(|n| {
            let decl = theory.symbol(n).expect("declared");
            theory.exprs_mut().apply(decl, vec![]).expect("ok")
        })
        .collect();
    (theory, atoms)
}

#[test]
fn test_symbolic_conjunction() {
    let (mut theory, atoms) = booleans(&["a", "b", "c", "d"]);
    let exprs = theory.exprs_mut();
    let inner = exprs.and(vec![atoms[2], atoms[3]]).expect("ok");
    let top = exprs.and(vec![atoms[0], atoms[1], inner]).expect("ok");

    let mut assignments = Assignments::new();
    for id in [atoms[0], atoms[2], atoms[3]] {
        assignments.assert_(theory.exprs(), id, None, Status::Unknown, None);
    }

    let verum = theory.exprs().truth(true);
    let found = symbolic_propagate(theory.exprs(), top, &assignments, true);
    assert_eq!(found, vec![(atoms[0], verum), (atoms[2], verum), (atoms[3], verum)]);

    // A true disjunction says nothing about its children.
    let any = theory.exprs_mut().or(vec![atoms[0], atoms[2]]).expect("ok");
    assert!(symbolic_propagate(theory.exprs(), any, &assignments, true).is_empty());

    let falsum = theory.exprs().truth(false);
    let found = symbolic_propagate(theory.exprs(), any, &assignments, false);
    assert_eq!(found, vec![(atoms[0], falsum), (atoms[2], falsum)]);
}

#[test]
fn test_symbolic_implication_and_not() {
    let (mut theory, atoms) = booleans(&["p", "q"]);
    let mut assignments = Assignments::new();
    for id in &atoms {
        assignments.assert_(theory.exprs(), *id, None, Status::Unknown, None);
    }

    let implication = theory.exprs_mut().implies(atoms[0], atoms[1]).expect("ok");
    assert!(symbolic_propagate(theory.exprs(), implication, &assignments, true).is_empty());

    let not_p = theory.exprs_mut().not(atoms[0]).expect("ok");
    let bracket = theory.exprs_mut().bracket(not_p).expect("ok");
    let found = symbolic_propagate(theory.exprs(), bracket, &assignments, true);
    assert_eq!(found, vec![(atoms[0], theory.exprs().truth(false))]);
}

#[test]
fn test_symbolic_equality() {
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: vec![
                Declaration::Type(TypeDecl::enumeration("Color", &["red", "green"])),
                Declaration::Symbol(SymbolDecl::new("paint", &[], "Color")),
            ],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let decl = theory.symbol("paint").expect("declared");
    let exprs = theory.exprs_mut();
    let paint = exprs.apply(decl, vec![]).expect("ok");
    let red = exprs.constructor("red", "Color");
    let is_red = exprs.compare(CmpOp::Eq, red, paint).expect("ok");

    let mut assignments = Assignments::new();
    assignments.assert_(theory.exprs(), paint, None, Status::Unknown, None);
    let found = symbolic_propagate(theory.exprs(), is_red, &assignments, true);
    assert_eq!(found, vec![(paint, red)]);
    assert!(symbolic_propagate(theory.exprs(), is_red, &assignments, false).is_empty());
}

#[cfg(test)]
fn chain_theory() -> TheoryModel {
    // a, a ⇒ b, and c is free.
    let (mut theory, atoms) = booleans(&["a", "b", "c"]);
    let exprs = theory.exprs_mut();
    let implication = exprs.implies(atoms[0], atoms[1]).expect("ok");
    let free = exprs.or(vec![atoms[2], atoms[1]]).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![atoms[0], implication, free],
            ..TheoryBlock::default()
        })
        .expect("ok");
    theory
}

#[test]
fn test_propagate_symbolically() {
    let mut theory = chain_theory();
    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    // `a` follows directly; `b` on the next pass, once the implication
    // is read with `a` known.
    let result = engine.propagate_symbolically(Status::Consequence).expect("ok");
    drop(engine);
    assert_eq!(result, Propagation::Consequences(2));

    let verum = theory.exprs().truth(true);
    for code in ["a", "b"] {
        let entry = theory.assignment(code).expect("tracked");
        assert_eq!(entry.value, Some(verum));
        assert_eq!(entry.status, Status::Consequence);
    }

    assert_eq!(theory.assignment("c").and_then(|a| a.value), None);
}

#[test]
fn test_unread_implication_stays_silent() {
    // Without `a`, nothing is known about `b`.
    let (mut theory, atoms) = booleans(&["a", "b"]);
    let implication = theory.exprs_mut().implies(atoms[0], atoms[1]).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![implication],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    let result = engine.propagate_symbolically(Status::Consequence).expect("ok");
    drop(engine);
    assert_eq!(result, Propagation::Consequences(0));
    assert_eq!(theory.assignment("b").and_then(|a| a.value), None);
}

#[test]
fn test_propagate_with_oracle() {
    let mut theory = chain_theory();
    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    let result = engine.propagate(Status::Consequence, false).expect("ok");
    drop(engine);
    assert_eq!(result, Propagation::Consequences(2));

    let verum = theory.exprs().truth(true);
    for code in ["a", "b"] {
        let entry = theory.assignment(code).expect("tracked");
        assert_eq!(entry.value, Some(verum));
        assert_eq!(entry.status, Status::Consequence);
    }

    assert_eq!(theory.assignment("c").and_then(|a| a.value), None);
}

#[test]
fn test_propagate_unsatisfiable() {
    let (mut theory, atoms) = booleans(&["p"]);
    let not_p = theory.exprs_mut().not(atoms[0]).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![atoms[0], not_p],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    assert_eq!(
        engine.propagate(Status::Consequence, false).expect("ok"),
        Propagation::Unsatisfiable
    );

    let mut expansion = engine.expand(5, false, false).expect("ok");
    assert!(expansion.next().is_none());
    assert_eq!(expansion.termination(), Some(Termination::Unsatisfiable));
}

#[test]
fn test_expand() {
    let (mut theory, atoms) = booleans(&["p", "q"]);
    let either = theory.exprs_mut().or(atoms.clone()).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![either],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    let mut expansion = engine.expand(10, true, false).expect("ok");
    let models: Vec<Assignments> = expansion.by_ref().collect();
    assert_eq!(models.len(), 3);
    assert_eq!(expansion.termination(), Some(Termination::Exhausted));

    for model in &models {
        assert!(model.get("p").and_then(|a| a.value).is_some());
        assert_eq!(model.get("q").map(|a| a.status), Some(Status::Expanded));
    }

    drop(expansion);
    let mut limited = engine.expand(2, true, false).expect("ok");
    assert_eq!(limited.by_ref().count(), 2);
    assert_eq!(limited.termination(), Some(Termination::LimitReached));
    drop(limited);
    drop(engine);

    let config = EngineConfig::from_json(r#"{"max_models": 1}"#).expect("ok");
    let mut engine = ConsequenceEngine::with_config(&mut theory, SatOracle::new(), config);
    assert_eq!(engine.models(true, false).expect("ok").count(), 1);
}

#[test]
fn test_optimize() {
    let mut theory = TheoryModel::new();
    let mut interpretations = indexmap::IndexMap::new();
    interpretations.insert(
        "Level".to_string(),
        Interpretation::Type(vec![Value::int(1), Value::int(2), Value::int(3), Value::int(4)]),
    );
    theory
        .add(TheoryBlock {
            declarations: vec![
                Declaration::Type(TypeDecl::new("Level", crate::vocabulary::BaseType::Int)),
                Declaration::Symbol(SymbolDecl::new("x", &[], "Level")),
            ],
            interpretations,
            ..TheoryBlock::default()
        })
        .expect("ok");

    let decl = theory.symbol("x").expect("declared");
    let exprs = theory.exprs_mut();
    let x = exprs.apply(decl, vec![]).expect("ok");
    let four = exprs.int(4);
    let below = exprs.compare(CmpOp::Lt, x, four).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![below],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut engine = ConsequenceEngine::new(&mut theory, SatOracle::new());
    let highest = engine.optimize(x, false).expect("ok");
    let lowest = engine.optimize(x, true).expect("ok");
    drop(engine);
    match (highest, lowest) {
        (Optimum::Found { value: hi, model }, Optimum::Found { value: lo, .. }) => {
            assert_eq!(theory.exprs().to_value(hi), Some(Value::int(3)));
            assert_eq!(theory.exprs().to_value(lo), Some(Value::int(1)));
            let witness = model.get("x").and_then(|a| a.value).expect("decided");
            assert_eq!(theory.exprs().to_value(witness), Some(Value::int(3)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

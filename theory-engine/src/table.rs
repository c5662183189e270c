//! Decision tables summarise how a goal depends on the open
//! questions of a theory.
//!
//! Rows are found one model at a time: the values of the questions in
//! a model form a candidate row, which is generalised by dropping
//! every literal that is not needed to imply the goal, and then
//! blocked so that the next model falls outside every row found so
//! far.  Generalisation runs in its own oracle session, which only
//! ever sees the theory, so blocking clauses never leak into its
//! tautology checks.
//!
//! In first-hit mode, rows are read top to bottom and the first one
//! that matches decides; each row is then generalised under the
//! assumption that the previous ones did not match.
use crate::assignments::{Assignment, Status};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::expr::{Exprs, NodeId, SetCondition};
use crate::propagate::{check_with_restarts, open_questions, replay, theory_formula, Question};
use crate::theory::TheoryModel;
use satoracle::{Check, Formula, Oracle, Value};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// One row of a decision table: conditions, then the goal literal (or
/// `true` when the table has no goal).
#[derive(Clone, Debug)]
pub struct Row {
    pub literals: Vec<Assignment>,
}

impl Row {
    #[must_use]
    pub fn conditions(&self) -> &[Assignment] {
        match self.literals.split_last() {
            Some((_, conditions)) => conditions,
            None => &[],
        }
    }

    #[must_use]
    pub fn goal(&self) -> Option<&Assignment> {
        self.literals.last()
    }

    /// Renders the row as `c1 ∧ c2 → goal`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed literals.
    pub fn render(&self, exprs: &mut Exprs) -> Result<String> {
        let mut conditions = Vec::new();
        for literal in self.conditions() {
            if let Some(node) = literal.literal(exprs)? {
                conditions.push(exprs.code(node).to_string());
            }
        }

        let goal = match self.goal() {
            Some(goal) => goal
                .literal(exprs)?
                .map(|node| exprs.code(node).to_string())
                .unwrap_or_default(),
            None => String::new(),
        };

        if conditions.is_empty() {
            Ok(format!("true → {}", goal))
        } else {
            Ok(format!("{} → {}", conditions.join(" ∧ "), goal))
        }
    }
}

enum Generalized {
    Row(Row),
    /// No model satisfies the row's conditions.
    Vacuous,
    /// The oracle gave up.
    Stalled,
}

/// Merges literals that constrain the same term to a set of values:
/// two memberships intersect, a membership and an exclusion subtract,
/// and two exclusions unite.  The earlier literal receives the result,
/// and the later one is cleared.
///
/// # Errors
///
/// Returns `Err` on malformed literals.
pub fn join_set_conditions(exprs: &mut Exprs, literals: &mut [Option<Assignment>]) -> Result<()> {
    for i in 0..literals.len() {
        for j in (i + 1)..literals.len() {
            let (first, second) = match (&literals[i], &literals[j]) {
                (Some(first), Some(second)) => (first.clone(), second.clone()),
                _ => continue,
            };

            let (a, b) = match (set_condition(exprs, &first)?, set_condition(exprs, &second)?) {
                (Some(a), Some(b)) if exprs.same_as(a.term, b.term) => (a, b),
                _ => continue,
            };

            let merged = match (a.member, b.member) {
                (true, true) => SetCondition {
                    set: intersection(exprs, &a.set, &b.set),
                    ..a
                },
                (true, false) => SetCondition {
                    set: difference(exprs, &a.set, &b.set),
                    ..a
                },
                (false, true) => SetCondition {
                    term: a.term,
                    member: true,
                    set: difference(exprs, &b.set, &a.set),
                },
                (false, false) => SetCondition {
                    set: union(exprs, &a.set, &b.set),
                    ..a
                },
            };

            trace!(
                first = %exprs.code(first.sentence),
                second = %exprs.code(second.sentence),
                "joined set conditions"
            );
            literals[i] = Some(condition_literal(exprs, &first, &merged)?);
            literals[j] = None;
        }
    }

    Ok(())
}

fn set_condition(exprs: &mut Exprs, literal: &Assignment) -> Result<Option<SetCondition>> {
    Ok(literal
        .literal(exprs)?
        .and_then(|node| exprs.as_set_condition(node)))
}

/// Returns `template`, restated as `condition`.
fn condition_literal(exprs: &mut Exprs, template: &Assignment, condition: &SetCondition) -> Result<Assignment> {
    let sentence = exprs.membership(condition.term, condition.set.clone())?;
    Ok(Assignment {
        sentence,
        value: Some(exprs.truth(condition.member)),
        ..template.clone()
    })
}

fn contains(exprs: &Exprs, set: &[NodeId], element: NodeId) -> bool {
    set.iter().any(|x| exprs.same_as(*x, element))
}

fn intersection(exprs: &Exprs, a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
    a.iter().copied().filter(|x| contains(exprs, b, *x)).collect()
}

fn difference(exprs: &Exprs, a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
    a.iter().copied().filter(|x| !contains(exprs, b, *x)).collect()
}

fn union(exprs: &Exprs, a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
    let mut ret = a.to_vec();
    ret.extend(b.iter().copied().filter(|x| !contains(exprs, a, *x)));
    ret
}

pub struct DecisionTableSynthesizer<'t, O: Oracle<String>> {
    theory: &'t mut TheoryModel,
    oracle: O,
    config: EngineConfig,
}

impl<'t, O: Oracle<String>> DecisionTableSynthesizer<'t, O> {
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

    pub fn exprs_mut(&mut self) -> &mut Exprs {
        self.theory.exprs_mut()
    }

    /// `decision_table`, with the configured timeout and row limit.
    ///
    /// # Errors
    ///
    /// See `decision_table`.
    pub fn table(&mut self, goal: Option<&str>, first_hit: bool, verify: bool) -> Result<Vec<Row>> {
        let (timeout, max_rows) = (self.config.timeout(), self.config.max_rows);
        self.decision_table(goal, timeout, max_rows, first_hit, verify)
    }

    /// Builds a decision table for the tracked sentence whose code is
    /// `goal` (or a plain partition of the models, without a goal).
    ///
    /// The search stops early, with a partial but valid table, after
    /// `timeout` or `max_rows` rows.  With `verify`, a complete search
    /// is checked to cover every model.  With `first_hit`, rows are
    /// ordered and simplified for top-to-bottom reading.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnknownSymbol)` when `goal` is not tracked,
    /// `Err(TableNotExhaustive)` when verification fails, and `Err`
    /// when the theory cannot be lowered for the oracle.
    pub fn decision_table(
        &mut self,
        goal: Option<&str>,
        timeout: Duration,
        max_rows: usize,
        first_hit: bool,
        verify: bool,
    ) -> Result<Vec<Row>> {
        let deadline = Instant::now() + timeout;
        let formula = theory_formula(self.theory)?;

        let goal = match goal {
            Some(code) => {
                let sentence = self
                    .theory
                    .assignment(code)
                    .map(|a| a.sentence)
                    .ok_or_else(|| Error::UnknownSymbol(code.to_string()))?;
                let (probe, axiom) = self.theory.translator().probe(sentence)?;
                Some((sentence, probe, axiom))
            }
            None => None,
        };

        let questions = self.row_questions(goal.as_ref().map(|(sentence, _, _)| *sentence))?;
        let known = self.known(&questions, goal.as_ref().and_then(|(_, _, axiom)| axiom.clone()))?;

        let mut session = vec![formula.clone(), known.clone()];
        replay(&mut self.oracle, &session);
        let mut checker = self.oracle.fresh();
        checker.add(&formula);

        let mut rows = Vec::new();
        let mut complete = false;
        while rows.len() < max_rows && Instant::now() < deadline {
            let model = match check_with_restarts(&mut self.oracle, &session, self.config.unknown_restarts) {
                Check::Sat => match self.oracle.model() {
                    Some(model) => model.clone(),
                    None => break,
                },
                Check::Unsat => {
                    complete = true;
                    break;
                }
                Check::Unknown => {
                    warn!(rows = rows.len(), "oracle answered unknown; table is partial");
                    break;
                }
            };

            let mut literals = Vec::new();
            for question in &questions {
                if let Some(value) = question.probe.read(&model, true) {
                    literals.push(self.question_literal(question.node, &question.code, &value));
                }
            }

            let exprs = self.theory.exprs();
            literals.sort_by(|a, b| {
                (!a.is_negative(exprs))
                    .cmp(&!b.is_negative(exprs))
                    .then_with(|| exprs.code(a.sentence).cmp(exprs.code(b.sentence)))
            });

            literals.push(match &goal {
                Some((sentence, probe, _)) => match probe.read(&model, true) {
                    Some(value) => {
                        let code = self.theory.exprs().code(*sentence).to_string();
                        self.question_literal(*sentence, &code, &value)
                    }
                    None => self.sentinel(),
                },
                None => self.sentinel(),
            });

            let blocked = match self.generalize(&mut checker, &literals, &known)? {
                Generalized::Row(row) => {
                    let conditions = self.conjunction(row.conditions())?;
                    if let Ok(rendered) = row.render(self.theory.exprs_mut()) {
                        debug!(row = %rendered, "found row");
                    }

                    rows.push(row);
                    conditions
                }
                Generalized::Vacuous | Generalized::Stalled => {
                    let raw = Row { literals };
                    let conditions = self.conjunction(raw.conditions())?;
                    rows.push(raw);
                    conditions
                }
            };

            let blocking = Formula::not(blocked);
            self.oracle.add(&blocking);
            session.push(blocking);
        }

        if !complete {
            warn!(rows = rows.len(), "decision table search was cut short");
        }

        if verify {
            if complete {
                self.verify(&mut checker, &rows, &known)?;
            } else {
                warn!("skipping verification of a partial table");
            }
        }

        rows.sort_by_key(|row| row.literals.len());
        if !first_hit {
            return Ok(rows);
        }

        let rows = self.first_hit(&mut checker, rows, &known, deadline)?;
        let rows = self.fold_fallback(rows)?;
        self.merge_adjacent(rows)
    }

    /// The questions that may appear in conditions: every open one,
    /// except the goal and those about defined symbols.
    fn row_questions(&mut self, goal: Option<NodeId>) -> Result<Vec<Question>> {
        let questions = open_questions(self.theory, false)?;
        Ok(questions
            .into_iter()
            .filter(|q| Some(q.node) != goal)
            .filter(|q| {
                let defined = self
                    .theory
                    .assignment(&q.code)
                    .and_then(|a| a.symbol_decl.as_ref())
                    .map_or(false, |decl| self.theory.is_defined(&decl.name));
                !defined
            })
            .collect())
    }

    /// Decided assignments, and the axioms that tie questions to their
    /// meaning.
    fn known(&mut self, questions: &[Question], goal_axiom: Option<Formula<String>>) -> Result<Formula<String>> {
        let decided: Vec<Assignment> = self.theory.assignments().known().cloned().collect();
        let mut parts = Vec::with_capacity(decided.len() + questions.len() + 1);
        let mut translator = self.theory.translator();
        for assignment in &decided {
            parts.extend(translator.assignment(assignment)?);
        }

        parts.extend(questions.iter().filter_map(|q| q.axiom.clone()));
        parts.extend(goal_axiom);
        Ok(Formula::And(parts))
    }

    fn question_literal(&mut self, sentence: NodeId, code: &str, value: &Value) -> Assignment {
        let node = self.theory.translator().node_for(sentence, value);
        let template = self.theory.assignment(code).cloned();
        Assignment {
            sentence,
            value: Some(node),
            status: Status::Expanded,
            relevant: template.as_ref().and_then(|a| a.relevant),
            symbol_decl: template.and_then(|a| a.symbol_decl),
        }
    }

    fn sentinel(&self) -> Assignment {
        let verum = self.theory.exprs().truth(true);
        Assignment {
            sentence: verum,
            value: Some(verum),
            status: Status::Unknown,
            relevant: None,
            symbol_decl: None,
        }
    }

    fn is_sentinel(&self, literal: &Assignment) -> bool {
        literal.sentence == self.theory.exprs().truth(true)
    }

    fn conjunction(&mut self, literals: &[Assignment]) -> Result<Formula<String>> {
        let mut translator = self.theory.translator();
        let mut parts = Vec::with_capacity(literals.len());
        for literal in literals {
            parts.extend(translator.assignment(literal)?);
        }

        Ok(Formula::And(parts))
    }

    /// Drops, one literal at a time, every condition of `conjuncts`
    /// that is not needed to imply its goal (or, without a goal, the
    /// original conditions), then joins set conditions.
    fn generalize(&mut self, checker: &mut O, conjuncts: &[Assignment], known: &Formula<String>) -> Result<Generalized> {
        let (goal, conditions) = match conjuncts.split_last() {
            Some(split) => split,
            None => return Ok(Generalized::Vacuous),
        };

        let mut formulas = Vec::with_capacity(conditions.len());
        for literal in conditions {
            formulas.push(self.conjunction(std::slice::from_ref(literal))?);
        }

        let target = if self.is_sentinel(goal) {
            Formula::And(formulas.clone())
        } else {
            self.conjunction(std::slice::from_ref(goal))?
        };

        checker.push();
        checker.add(known);
        checker.push();
        checker.add(&Formula::And(formulas.clone()));
        let answer = checker.check();
        checker.pop();
        match answer {
            Check::Sat => {}
            Check::Unsat => {
                checker.pop();
                return Ok(Generalized::Vacuous);
            }
            Check::Unknown => {
                checker.pop();
                return Ok(Generalized::Stalled);
            }
        }

        let mut kept: Vec<Option<Assignment>> = conditions.iter().cloned().map(Some).collect();
        for i in 0..kept.len() {
            let reduced: Vec<Formula<String>> = formulas
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i && kept[*j].is_some())
                .map(|(_, f)| f.clone())
                .collect();

            checker.push();
            checker.add(&Formula::And(reduced));
            checker.add(&Formula::not(target.clone()));
            let redundant = checker.check() == Check::Unsat;
            checker.pop();

            if redundant {
                trace!(literal = %self.theory.exprs().code(conditions[i].sentence), "redundant");
                kept[i] = None;
            }
        }

        checker.pop();
        join_set_conditions(self.theory.exprs_mut(), &mut kept)?;

        let mut literals: Vec<Assignment> = kept.into_iter().flatten().collect();
        literals.push(goal.clone());
        Ok(Generalized::Row(Row { literals }))
    }

    /// Checks that the rows cover every model of the theory.
    fn verify(&mut self, checker: &mut O, rows: &[Row], known: &Formula<String>) -> Result<()> {
        let mut any = Vec::with_capacity(rows.len());
        for row in rows {
            any.push(self.conjunction(row.conditions())?);
        }

        checker.push();
        checker.add(known);
        checker.add(&Formula::not(Formula::Or(any)));
        let answer = checker.check();
        checker.pop();

        match answer {
            Check::Unsat => Ok(()),
            Check::Sat => Err(Error::TableNotExhaustive { rows: rows.len() }),
            Check::Unknown => {
                warn!("could not verify decision table");
                Ok(())
            }
        }
    }

    /// Orders `rows` for first-hit reading: the shortest row comes
    /// first, and every later row is generalised knowing that the
    /// earlier ones did not match.
    fn first_hit(&mut self, checker: &mut O, rows: Vec<Row>, known: &Formula<String>, deadline: Instant) -> Result<Vec<Row>> {
        let mut pending = rows;
        let mut ordered = Vec::with_capacity(pending.len());
        let mut deferred = Vec::new();
        let mut context = vec![known.clone()];

        while !pending.is_empty() {
            if Instant::now() >= deadline {
                // Each row still holds on its own.
                warn!(pending = pending.len(), "timeout while ordering rows");
                ordered.append(&mut pending);
                break;
            }

            let row = pending.remove(0);
            match self.generalize(checker, &row.literals, &Formula::And(context.clone()))? {
                Generalized::Row(row) => {
                    context.push(Formula::not(self.conjunction(row.conditions())?));
                    ordered.push(row);
                }
                Generalized::Vacuous => {
                    trace!("row is covered by earlier rows");
                    continue;
                }
                Generalized::Stalled => {
                    deferred.push(row);
                    continue;
                }
            }

            let running = Formula::And(context.clone());
            let mut next = Vec::with_capacity(pending.len());
            for row in pending {
                match self.generalize(checker, &row.literals, &running)? {
                    Generalized::Row(row) => next.push(row),
                    Generalized::Vacuous => {}
                    Generalized::Stalled => next.push(row),
                }
            }

            next.sort_by_key(|row| row.literals.len());
            pending = next;
        }

        if !deferred.is_empty() {
            debug!(deferred = deferred.len(), "deferred rows that could not be generalised");
        }

        ordered.extend(deferred);
        Ok(ordered)
    }

    /// Returns the truth value of a row's goal, for boolean goals.
    fn outcome(&self, row: &Row) -> Option<bool> {
        let goal = row.goal()?;
        if self.is_sentinel(goal) {
            return None;
        }

        goal.value.and_then(|v| self.theory.exprs().truth_value(v))
    }

    /// Rewrites `c1 → ¬g; c2 → ¬g; ...; true → g` as
    /// `¬(c1 ∨ c2 ∨ ...) → g; true → ¬g`.
    fn fold_fallback(&mut self, rows: Vec<Row>) -> Result<Vec<Row>> {
        let (last, preceding) = match rows.split_last() {
            Some(split) => split,
            None => return Ok(rows),
        };

        let target = match self.outcome(last) {
            Some(target) if last.conditions().is_empty() => target,
            _ => return Ok(rows),
        };

        if preceding.len() < 2 || preceding.iter().any(|row| self.outcome(row) != Some(!target)) {
            return Ok(rows);
        }

        let mut disjuncts = Vec::with_capacity(preceding.len());
        for row in preceding {
            disjuncts.push(self.condition_node(row.conditions())?);
        }

        let exprs = self.theory.exprs_mut();
        let hypothesis = Assignment {
            sentence: exprs.or(disjuncts)?,
            value: Some(exprs.truth(false)),
            status: Status::Expanded,
            relevant: None,
            symbol_decl: None,
        };

        let mut goal = last.literals[0].clone();
        let fallback = Assignment {
            value: Some(exprs.truth(!target)),
            ..goal.clone()
        };
        goal.value = Some(exprs.truth(target));

        debug!(rows = preceding.len(), "folded rows into a fallback");
        Ok(vec![
            Row {
                literals: vec![hypothesis, goal],
            },
            Row {
                literals: vec![fallback],
            },
        ])
    }

    fn condition_node(&mut self, literals: &[Assignment]) -> Result<NodeId> {
        let exprs = self.theory.exprs_mut();
        let mut nodes = Vec::with_capacity(literals.len());
        for literal in literals {
            nodes.extend(literal.literal(exprs)?);
        }

        if nodes.len() == 1 {
            Ok(nodes[0])
        } else {
            exprs.and(nodes)
        }
    }

    fn same_outcome(&self, a: &Row, b: &Row) -> bool {
        let exprs = self.theory.exprs();
        match (a.goal(), b.goal()) {
            (Some(a), Some(b)) => {
                exprs.code(a.sentence) == exprs.code(b.sentence)
                    && match (a.value, b.value) {
                        (Some(x), Some(y)) => exprs.same_as(x, y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    /// Merges adjacent rows with the same outcome, when their
    /// conditions combine into a single row.
    fn merge_adjacent(&mut self, rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut ret: Vec<Row> = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(previous) = ret.last() {
                if self.same_outcome(previous, &row) {
                    let previous = previous.clone();
                    if let Some(merged) = self.merge_pair(&previous, &row)? {
                        if let Some(slot) = ret.last_mut() {
                            *slot = merged;
                        }

                        continue;
                    }
                }
            }

            ret.push(row);
        }

        Ok(ret)
    }

    fn merge_pair(&mut self, a: &Row, b: &Row) -> Result<Option<Row>> {
        let (goal, left, right) = match a.goal() {
            Some(goal) => (goal.clone(), a.conditions(), b.conditions()),
            None => return Ok(None),
        };

        if left.len() != right.len() || left.is_empty() {
            return Ok(None);
        }

        let exprs = self.theory.exprs_mut();
        let differing: Vec<usize> = (0..left.len())
            .filter(|i| !same_literal(exprs, &left[*i], &right[*i]))
            .collect();

        let merged = match differing.as_slice() {
            [i] => {
                let (x, y) = (&left[*i], &right[*i]);
                match either_set_condition(exprs, x, y)? {
                    Some(merged) => Some((*i, merged)),
                    None if left.len() == 1 => Some((*i, either_literal(exprs, x, y)?)),
                    None => None,
                }
            }
            _ => None,
        };

        Ok(merged.map(|(i, literal)| {
            let mut literals = left.to_vec();
            literals[i] = literal;
            literals.push(goal);
            Row { literals }
        }))
    }
}

fn same_literal(exprs: &Exprs, a: &Assignment, b: &Assignment) -> bool {
    exprs.code(a.sentence) == exprs.code(b.sentence)
        && match (a.value, b.value) {
            (Some(x), Some(y)) => exprs.same_as(x, y),
            (None, None) => true,
            _ => false,
        }
}

/// `x ∈ A ∨ x ∈ B` is `x ∈ A ∪ B`, and `x ∉ A ∨ x ∉ B` is
/// `x ∉ A ∩ B`.
fn either_set_condition(exprs: &mut Exprs, a: &Assignment, b: &Assignment) -> Result<Option<Assignment>> {
    let (x, y) = match (set_condition(exprs, a)?, set_condition(exprs, b)?) {
        (Some(x), Some(y)) if x.member == y.member && exprs.same_as(x.term, y.term) => (x, y),
        _ => return Ok(None),
    };

    let set = if x.member {
        union(exprs, &x.set, &y.set)
    } else {
        intersection(exprs, &x.set, &y.set)
    };

    let merged = SetCondition { set, ..x };
    Ok(Some(condition_literal(exprs, a, &merged)?))
}

/// `a ∨ b`, stated as `¬(p ∧ q)` when both are negations.
fn either_literal(exprs: &mut Exprs, a: &Assignment, b: &Assignment) -> Result<Assignment> {
    if a.is_negative(exprs) && b.is_negative(exprs) {
        return Ok(Assignment {
            sentence: exprs.and(vec![a.sentence, b.sentence])?,
            value: Some(exprs.truth(false)),
            symbol_decl: None,
            ..a.clone()
        });
    }

    let mut disjuncts = Vec::with_capacity(2);
    disjuncts.extend(a.literal(exprs)?);
    disjuncts.extend(b.literal(exprs)?);
    Ok(Assignment {
        sentence: exprs.or(disjuncts)?,
        value: Some(exprs.truth(true)),
        symbol_decl: None,
        ..a.clone()
    })
}

#[cfg(test)]
use crate::expr::test_symbol;
#[cfg(test)]
use crate::theory::{RuleCase, TheoryBlock};
#[cfg(test)]
use crate::vocabulary::{Declaration, SymbolDecl, TypeDecl};
#[cfg(test)]
use satoracle::SatOracle;

#[cfg(test)]
fn fact(exprs: &Exprs, sentence: NodeId, value: bool) -> Assignment {
    Assignment {
        sentence,
        value: Some(exprs.truth(value)),
        status: Status::Expanded,
        relevant: None,
        symbol_decl: None,
    }
}

#[test]
fn test_join_set_conditions() {
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let elements: Vec<NodeId> = (1..=3).map(|i| exprs.int(i)).collect();

    let wide = exprs.membership(x, elements.clone()).expect("ok");
    let two = exprs.membership(x, vec![elements[1]]).expect("ok");
    let mut literals = vec![Some(fact(&exprs, wide, true)), Some(fact(&exprs, two, false))];

    join_set_conditions(&mut exprs, &mut literals).expect("ok");
    assert!(literals[1].is_none());
    let merged = literals[0].clone().expect("merged");
    assert_eq!(exprs.code(merged.sentence), "x ∈ {1, 3}");
    assert_eq!(merged.value, Some(exprs.truth(true)));

    // Two exclusions unite.
    let one = exprs.membership(x, vec![elements[0]]).expect("ok");
    let mut literals = vec![Some(fact(&exprs, one, false)), Some(fact(&exprs, two, false))];
    join_set_conditions(&mut exprs, &mut literals).expect("ok");
    let merged = literals[0].clone().expect("merged");
    assert_eq!(exprs.code(merged.sentence), "x ∈ {1, 2}");
    assert_eq!(merged.value, Some(exprs.truth(false)));
}

#[test]
fn test_join_ignores_other_terms() {
    let mut exprs = Exprs::new();
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let y = exprs.apply(test_symbol("y", &[], "Int"), vec![]).expect("ok");
    let one = exprs.int(1);
    let x_one = exprs.compare(satoracle::CmpOp::Eq, x, one).expect("ok");
    let y_one = exprs.compare(satoracle::CmpOp::Eq, y, one).expect("ok");

    let mut literals = vec![Some(fact(&exprs, x_one, true)), Some(fact(&exprs, y_one, true))];
    join_set_conditions(&mut exprs, &mut literals).expect("ok");
    assert!(literals.iter().all(Option::is_some));
}

#[cfg(test)]
fn conjunction_theory() -> TheoryModel {
    // g ← a ∧ b.
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: ["a", "b", "g"]
                .iter()
                .map(|n| Declaration::Symbol(SymbolDecl::predicate(n, &[])))
                .collect(),
            ..TheoryBlock::default()
        })
        .expect("ok");

    let (a, b) = (theory.symbol("a").expect("a"), theory.symbol("b").expect("b"));
    let exprs = theory.exprs_mut();
    let a = exprs.apply(a, vec![]).expect("ok");
    let b = exprs.apply(b, vec![]).expect("ok");
    let body = exprs.and(vec![a, b]).expect("ok");
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

#[test]
fn test_decision_table_rows_imply_goal() {
    let mut theory = conjunction_theory();
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let rows = synthesizer.table(Some("g"), false, true).expect("ok");

    // g is true only when both a and b are, and false as soon as one
    // of them is.
    assert_eq!(rows.len(), 3);
    let mut rendered: Vec<String> = rows
        .iter()
        .map(|row| row.render(synthesizer.exprs_mut()).expect("ok"))
        .collect();
    rendered.sort();
    assert_eq!(rendered, vec!["a ∧ b → g", "¬a → ¬g", "¬b → ¬g"]);
    assert!(rows[2].conditions().len() == 2);
}

#[test]
fn test_decision_table_without_goal() {
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: vec![
                Declaration::Type(TypeDecl::enumeration("Color", &["red", "green", "blue"])),
                Declaration::Symbol(SymbolDecl::new("paint", &[], "Color")),
            ],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let decl = theory.symbol("paint").expect("declared");
    let exprs = theory.exprs_mut();
    let paint = exprs.apply(decl, vec![]).expect("ok");
    let blue = exprs.constructor("blue", "Color");
    let not_blue = exprs.compare(satoracle::CmpOp::Ne, paint, blue).expect("ok");
    theory
        .add(TheoryBlock {
            constraints: vec![not_blue],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let rows = synthesizer.table(None, false, true).expect("ok");
    // One row per admissible color.
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert!(synthesizer.is_sentinel(row.goal().expect("goal")));
    }

    assert!(matches!(
        synthesizer.table(Some("nothing"), false, false),
        Err(Error::UnknownSymbol(_))
    ));
}

#[test]
fn test_row_limit_skips_verification() {
    let mut theory = conjunction_theory();
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let rows = synthesizer
        .decision_table(Some("g"), Duration::from_secs(20), 1, false, true)
        .expect("partial tables are not verified");
    assert_eq!(rows.len(), 1);
}

#[cfg(test)]
fn atoms(theory: &mut TheoryModel, names: &[&str]) -> Vec<NodeId> {
    names
        .iter()
        .map(|n| {
            let decl = theory.symbol(n).expect("declared");
            theory.exprs_mut().apply(decl, vec![]).expect("ok")
        })
        .collect()
}

#[cfg(test)]
fn render_all(synthesizer: &mut DecisionTableSynthesizer<'_, SatOracle<String>>, rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|row| row.render(synthesizer.exprs_mut()).expect("ok"))
        .collect()
}

/// Returns whether every row (conditions and goal) has a model of the
/// theory and of what is known about `goal`.
#[cfg(test)]
fn rows_hold(synthesizer: &mut DecisionTableSynthesizer<'_, SatOracle<String>>, goal: &str, rows: &[Row]) -> bool {
    let sentence = synthesizer.theory().assignment(goal).map(|a| a.sentence).expect("tracked");
    let (_, axiom) = synthesizer.theory.translator().probe(sentence).expect("ok");
    let questions = synthesizer.row_questions(Some(sentence)).expect("ok");
    let known = synthesizer.known(&questions, axiom).expect("ok");
    let formula = theory_formula(synthesizer.theory).expect("ok");

    for row in rows {
        let mut oracle = SatOracle::new();
        oracle.add(&formula);
        oracle.add(&known);
        oracle.add(&synthesizer.conjunction(&row.literals).expect("ok"));
        if oracle.check() != Check::Sat {
            return false;
        }
    }

    true
}

#[test]
fn test_fold_fallback() {
    let mut theory = conjunction_theory();
    let ids = atoms(&mut theory, &["a", "b", "g"]);
    let (a, b, g) = (ids[0], ids[1], ids[2]);
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());

    let exprs = synthesizer.theory().exprs();
    let rows = vec![
        Row {
            literals: vec![fact(exprs, a, false), fact(exprs, g, false)],
        },
        Row {
            literals: vec![fact(exprs, b, false), fact(exprs, g, false)],
        },
        Row {
            literals: vec![fact(exprs, g, true)],
        },
    ];

    let folded = synthesizer.fold_fallback(rows).expect("ok");
    assert_eq!(
        render_all(&mut synthesizer, &folded),
        vec!["¬(¬a ∨ ¬b) → g", "true → ¬g"]
    );
}

#[test]
fn test_fold_fallback_needs_uniform_rows() {
    let mut theory = conjunction_theory();
    let ids = atoms(&mut theory, &["a", "b", "g"]);
    let (a, b, g) = (ids[0], ids[1], ids[2]);
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());

    // An earlier row already reaches `g`.
    let exprs = synthesizer.theory().exprs();
    let rows = vec![
        Row {
            literals: vec![fact(exprs, a, true), fact(exprs, b, true), fact(exprs, g, true)],
        },
        Row {
            literals: vec![fact(exprs, a, false), fact(exprs, g, false)],
        },
        Row {
            literals: vec![fact(exprs, g, true)],
        },
    ];

    let kept = synthesizer.fold_fallback(rows).expect("ok");
    assert_eq!(
        render_all(&mut synthesizer, &kept),
        vec!["a ∧ b → g", "¬a → ¬g", "true → g"]
    );

    // A single preceding row is left alone too.
    let exprs = synthesizer.theory().exprs();
    let rows = vec![
        Row {
            literals: vec![fact(exprs, a, false), fact(exprs, g, false)],
        },
        Row {
            literals: vec![fact(exprs, g, true)],
        },
    ];

    let kept = synthesizer.fold_fallback(rows).expect("ok");
    assert_eq!(kept.len(), 2);
}

#[test]
fn test_merge_adjacent_set_conditions() {
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: vec![
                Declaration::Type(TypeDecl::enumeration("Color", &["red", "green", "blue"])),
                Declaration::Symbol(SymbolDecl::new("paint", &[], "Color")),
                Declaration::Symbol(SymbolDecl::predicate("a", &[])),
                Declaration::Symbol(SymbolDecl::predicate("g", &[])),
            ],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let ids = atoms(&mut theory, &["a", "g", "paint"]);
    let (a, g, paint) = (ids[0], ids[1], ids[2]);
    let exprs = theory.exprs_mut();
    let red = exprs.constructor("red", "Color");
    let green = exprs.constructor("green", "Color");
    let is_red = exprs.membership(paint, vec![red]).expect("ok");
    let is_green = exprs.membership(paint, vec![green]).expect("ok");

    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());
    let exprs = synthesizer.theory().exprs();
    let rows = vec![
        Row {
            literals: vec![fact(exprs, a, true), fact(exprs, is_red, true), fact(exprs, g, true)],
        },
        Row {
            literals: vec![fact(exprs, a, true), fact(exprs, is_green, true), fact(exprs, g, true)],
        },
        Row {
            literals: vec![fact(exprs, a, false), fact(exprs, g, false)],
        },
    ];

    let merged = synthesizer.merge_adjacent(rows).expect("ok");
    assert_eq!(
        render_all(&mut synthesizer, &merged),
        vec!["a ∧ paint ∈ {red, green} → g", "¬a → ¬g"]
    );

    // Rows that differ in two places stay apart.
    let exprs = synthesizer.theory().exprs();
    let rows = vec![
        Row {
            literals: vec![fact(exprs, a, true), fact(exprs, is_red, true), fact(exprs, g, true)],
        },
        Row {
            literals: vec![fact(exprs, a, false), fact(exprs, is_green, true), fact(exprs, g, true)],
        },
    ];

    assert_eq!(synthesizer.merge_adjacent(rows).expect("ok").len(), 2);
}

#[test]
fn test_expired_timeout_returns_partial_table() {
    let mut theory = conjunction_theory();
    let mut synthesizer = DecisionTableSynthesizer::new(&mut theory, SatOracle::new());

    // Nothing can be searched, and the empty table is not verified.
    for first_hit in [false, true] {
        let rows = synthesizer
            .decision_table(Some("g"), Duration::ZERO, 50, first_hit, true)
            .expect("partial tables are not verified");
        assert!(rows.is_empty());
    }

    // Rows found before the search is cut short still hold.
    let rows = synthesizer
        .decision_table(Some("g"), Duration::from_secs(20), 2, true, true)
        .expect("ok");
    assert!(!rows.is_empty());
    assert!(rows_hold(&mut synthesizer, "g", &rows));
}

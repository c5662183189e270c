//! A `TheoryModel` gathers everything we know about a problem:
//! vocabulary, constraints, definitions, interpretations (the partial
//! structure) and goals.
//!
//! Theories are built by merging `TheoryBlock`s.  Before anything can
//! be evaluated, the theory is `interpret`ed: interpretations become
//! `Structure` assignments and are substituted into the constraints,
//! quantifiers are expanded over their (finite) types, definitions
//! are instantiated over their domain, and every ground sub-formula
//! worth tracking becomes a question in the assignment store.
//!
//! `formula()` then conjoins it all into one ground sentence for the
//! oracle.
use crate::assignments::{Assignment, Assignments, Status};
use crate::error::{Error, Result};
use crate::expr::{Binding, Domains, ExprKind, Exprs, NodeId};
use crate::translate::Translator;
use crate::vocabulary::{BaseType, Declaration, SymbolDecl, Vocabulary};
use indexmap::{IndexMap, IndexSet};
use satoracle::{CmpOp, Value};
use std::rc::Rc;
use tracing::debug;

/// One definitional rule: `symbol(vars) = value ← body`, or
/// `symbol(vars) ← body` for a predicate.
#[derive(Clone, Debug)]
pub struct RuleCase {
    pub symbol: String,
    pub vars: Vec<String>,
    pub value: Option<NodeId>,
    pub body: NodeId,
}

/// The completion of every rule for a symbol, as a formula over the
/// quantified variables.
#[derive(Clone, Debug)]
pub struct Rule {
    pub symbol: Rc<SymbolDecl>,
    pub quantees: Vec<(String, String)>,
    pub body: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Interpretation {
    /// The elements of a type.
    Type(Vec<Value>),
    /// The value of a symbol on some argument tuples, and optionally
    /// on every other tuple.
    Symbol {
        table: Vec<(Vec<Value>, Value)>,
        default: Option<Value>,
    },
}

/// A fragment of theory, to be merged into a `TheoryModel`.  Nodes
/// must come from the model's own arena.
#[derive(Clone, Debug, Default)]
pub struct TheoryBlock {
    pub declarations: Vec<Declaration>,
    pub constraints: Vec<NodeId>,
    pub rules: Vec<RuleCase>,
    pub interpretations: IndexMap<String, Interpretation>,
    pub goals: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TheoryModel {
    exprs: Exprs,
    vocabulary: Vocabulary,
    clark: IndexMap<String, Rule>,
    constraints: IndexSet<NodeId>,
    assignments: Assignments,
    def_constraints: IndexMap<String, NodeId>,
    interpretations: IndexMap<String, Interpretation>,
    goals: IndexMap<String, Rc<SymbolDecl>>,
    cached_formula: Option<NodeId>,
    interpreted: bool,
    // Constraints after interpretation and expansion.
    ground: Vec<NodeId>,
    // Non-atomic questions, for extended queries.
    compound: IndexSet<NodeId>,
}

impl TheoryModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exprs(&self) -> &Exprs {
        &self.exprs
    }

    pub fn exprs_mut(&mut self) -> &mut Exprs {
        &mut self.exprs
    }

    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    #[must_use]
    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    #[must_use]
    pub fn clark(&self) -> &IndexMap<String, Rule> {
        &self.clark
    }

    #[must_use]
    pub fn constraints(&self) -> &IndexSet<NodeId> {
        &self.constraints
    }

    #[must_use]
    pub fn def_constraints(&self) -> &IndexMap<String, NodeId> {
        &self.def_constraints
    }

    #[must_use]
    pub fn goals(&self) -> &IndexMap<String, Rc<SymbolDecl>> {
        &self.goals
    }

    /// Constraints after interpretation; empty until `interpret`.
    #[must_use]
    pub fn ground_constraints(&self) -> &[NodeId] {
        &self.ground
    }

    #[must_use]
    pub fn compound_questions(&self) -> &IndexSet<NodeId> {
        &self.compound
    }

    /// # Errors
    ///
    /// Returns `Err(UnknownSymbol)` for undeclared symbols.
    pub fn symbol(&self, name: &str) -> Result<Rc<SymbolDecl>> {
        self.vocabulary.symbol(name)
    }

    /// Returns whether `symbol` is defined by rules.
    #[must_use]
    pub fn is_defined(&self, symbol: &str) -> bool {
        self.clark.contains_key(symbol)
    }

    /// Merges `block` into this theory.
    ///
    /// # Errors
    ///
    /// Returns `Err(Structural)` when a declaration or interpretation
    /// conflicts with an existing one, or a rule is malformed.
    pub fn add(&mut self, block: TheoryBlock) -> Result<()> {
        self.cached_formula = None;
        self.interpreted = false;

        for decl in block.declarations {
            if let Declaration::Type(ty) = &decl {
                self.exprs.register_type(&ty.name, ty.base);
            }

            self.vocabulary.declare(decl)?;
        }

        for (name, interpretation) in block.interpretations {
            match self.interpretations.get(&name) {
                Some(existing) if *existing != interpretation => {
                    return Err(Error::structural(format!(
                        "conflicting interpretations for {}",
                        name
                    )));
                }
                _ => {
                    self.interpretations.insert(name, interpretation);
                }
            }
        }

        self.constraints.extend(block.constraints);

        let mut cases: IndexMap<String, Vec<RuleCase>> = IndexMap::new();
        for case in block.rules {
            cases.entry(case.symbol.clone()).or_default().push(case);
        }

        for (symbol, cases) in cases {
            let rule = self.complete(&symbol, cases)?;
            let merged = match self.clark.get(&symbol).cloned() {
                Some(existing) => {
                    let body = self.rename(rule.body, &rule.quantees, &existing.quantees)?;
                    let body = self.exprs.and(vec![existing.body, body])?;
                    Rule { body, ..existing }
                }
                None => rule,
            };

            self.clark.insert(symbol, merged);
        }

        for goal in block.goals {
            let decl = self.vocabulary.symbol(&goal)?;
            self.goals.insert(goal, decl);
        }

        Ok(())
    }

    /// Records a fact about `sentence`.
    pub fn assert_(&mut self, sentence: NodeId, value: Option<NodeId>, status: Status, relevant: Option<bool>) {
        self.cached_formula = None;
        self.assignments
            .assert_(&self.exprs, sentence, value, status, relevant);
    }

    /// Returns a translator to the oracle's language, over this
    /// theory's arena and vocabulary.
    pub fn translator(&mut self) -> Translator<'_> {
        Translator::new(&mut self.exprs, &self.vocabulary)
    }

    /// Returns the assignment for `code`, if tracked.
    #[must_use]
    pub fn assignment(&self, code: &str) -> Option<&Assignment> {
        self.assignments.get(code)
    }

    /// Replaces the assignment store wholesale, e.g., with one of the
    /// snapshots `expand` produces.
    pub fn set_assignments(&mut self, assignments: Assignments) {
        self.cached_formula = None;
        self.assignments = assignments;
    }

    /// Returns the rigid nodes of every enumerated type.
    #[must_use]
    pub fn domains(&mut self) -> Domains {
        let mut domains = Domains::default();
        let types: Vec<(String, Vec<Value>)> = self
            .vocabulary
            .types()
            .filter_map(|ty| ty.elements.clone().map(|e| (ty.name.clone(), e)))
            .collect();

        for (name, elements) in types {
            let nodes = elements
                .iter()
                .map(|value| self.exprs.from_value(value, &name))
                .collect();
            domains.insert(name, nodes);
        }

        domains
    }

    /// Applies interpretations, expands quantifiers and definitions,
    /// and registers questions.  Does nothing when already done.
    ///
    /// # Errors
    ///
    /// Returns `Err` when an interpretation does not fit its
    /// declaration, or something must be expanded over a type that
    /// is not enumerated.
    pub fn interpret(&mut self) -> Result<()> {
        if self.interpreted {
            return Ok(());
        }

        self.cached_formula = None;
        let interpretations = self.interpretations.clone();
        for (name, interpretation) in &interpretations {
            if let Interpretation::Type(elements) = interpretation {
                self.vocabulary.enumerate(name, elements.clone())?;
            }
        }

        // Constants first, then functions and predicates.
        let mut symbols: Vec<(&String, &Interpretation)> = interpretations
            .iter()
            .filter(|(_, i)| matches!(i, Interpretation::Symbol { .. }))
            .collect();
        symbols.sort_by_key(|(name, _)| {
            self.vocabulary
                .symbol(name)
                .map(|d| d.arity() > 0)
                .unwrap_or(true)
        });
        for (name, interpretation) in symbols {
            if let Interpretation::Symbol { table, default } = interpretation {
                self.interpret_symbol(name, table, default.as_ref())?;
            }
        }

        let domains = self.domains();
        let structure = self.structure_binding();

        self.ground.clear();
        for constraint in self.constraints.clone() {
            let expanded = self.exprs.expand_quantifiers(constraint, &domains)?;
            let ground = self.exprs.substitute(expanded, &structure)?;
            self.ground.push(ground);
        }

        self.instantiate_definitions(&domains, &structure)?;

        for (_, decl) in self.goals.clone() {
            for head in self.instances(&decl)? {
                self.assignments
                    .assert_(&self.exprs, head, None, Status::Unknown, Some(true));
            }
        }

        self.collect_questions();
        self.interpreted = true;
        debug!(
            constraints = self.ground.len(),
            definitions = self.def_constraints.len(),
            questions = self.assignments.len(),
            "interpreted theory"
        );
        Ok(())
    }

    /// Returns one ground sentence for the whole theory.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the theory cannot be interpreted.
    pub fn formula(&mut self) -> Result<NodeId> {
        self.interpret()?;
        if let Some(formula) = self.cached_formula {
            return Ok(formula);
        }

        let mut parts = Vec::new();
        let known: Vec<Assignment> = self.assignments.known().cloned().collect();
        for assignment in &known {
            parts.extend(assignment.literal(&mut self.exprs)?);
        }

        parts.extend(self.ground.iter().copied());
        for assignment in self.assignments.values() {
            parts.extend(self.exprs.node(assignment.sentence).co_constraint);
        }

        parts.extend(self.def_constraints.values().copied());
        parts.push(self.exprs.truth(true));

        let formula = self.exprs.and(parts)?;
        self.cached_formula = Some(formula);
        Ok(formula)
    }

    /// Returns the current assignments rendered back as literals.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed nodes.
    pub fn literals(&mut self) -> Result<Vec<NodeId>> {
        let known: Vec<Assignment> = self.assignments.known().cloned().collect();
        let mut ret = Vec::with_capacity(known.len());
        for assignment in &known {
            ret.extend(assignment.literal(&mut self.exprs)?);
        }

        Ok(ret)
    }

    fn interpret_symbol(&mut self, name: &str, table: &[(Vec<Value>, Value)], default: Option<&Value>) -> Result<()> {
        let decl = self.vocabulary.symbol(name)?;
        let mut covered = IndexSet::new();

        for (args, value) in table {
            if args.len() != decl.arity() {
                return Err(Error::structural(format!(
                    "interpretation of {} has a tuple of arity {}",
                    name,
                    args.len()
                )));
            }

            self.interpret_entry(&decl, args, value)?;
            covered.insert(args.clone());
        }

        if let Some(default) = default {
            for args in self.tuples(&decl.args)? {
                if !covered.contains(&args) {
                    self.interpret_entry(&decl, &args, default)?;
                }
            }
        }

        Ok(())
    }

    fn interpret_entry(&mut self, decl: &Rc<SymbolDecl>, args: &[Value], value: &Value) -> Result<()> {
        let args = args
            .iter()
            .zip(decl.args.iter())
            .map(|(arg, sort)| self.exprs.from_value(arg, sort))
            .collect();
        let sentence = self.exprs.apply(decl.clone(), args)?;
        let value = self.exprs.from_value(value, &decl.out);
        self.assignments
            .assert_(&self.exprs, sentence, Some(value), Status::Structure, None);
        Ok(())
    }

    /// Every argument tuple over `types`.
    fn tuples(&self, types: &[String]) -> Result<Vec<Vec<Value>>> {
        let mut ret = vec![Vec::new()];
        for ty in types {
            let domain = self.vocabulary.domain(ty).ok_or_else(|| {
                Error::unsupported(format!("type {} is not enumerated", ty))
            })?;

            ret = ret
                .into_iter()
                .flat_map(|prefix| {
                    domain.iter().map(move |value| {
                        let mut tuple = prefix.clone();
                        tuple.push(value.clone());
                        tuple
                    })
                })
                .collect();
        }

        Ok(ret)
    }

    /// Every ground application of `decl`.
    fn instances(&mut self, decl: &Rc<SymbolDecl>) -> Result<Vec<NodeId>> {
        let mut ret = Vec::new();
        for tuple in self.tuples(&decl.args)? {
            let args = tuple
                .iter()
                .zip(decl.args.iter())
                .map(|(value, sort)| self.exprs.from_value(value, sort))
                .collect();
            ret.push(self.exprs.apply(decl.clone(), args)?);
        }

        Ok(ret)
    }

    /// Maps the code of every interpreted term to its value.
    fn structure_binding(&self) -> Binding {
        self.assignments
            .values()
            .filter(|a| a.status == Status::Structure)
            .filter_map(|a| {
                a.value
                    .map(|v| (self.exprs.code(a.sentence).to_string(), v))
            })
            .collect()
    }

    fn complete(&mut self, symbol: &str, cases: Vec<RuleCase>) -> Result<Rule> {
        let decl = self.vocabulary.symbol(symbol)?;
        let vars = cases[0].vars.clone();
        if vars.len() != decl.arity() {
            return Err(Error::structural(format!(
                "rule for {} binds {} variables, expected {}",
                symbol,
                vars.len(),
                decl.arity()
            )));
        }

        let quantees: Vec<(String, String)> = vars.into_iter().zip(decl.args.iter().cloned()).collect();
        let args = quantees
            .iter()
            .map(|(var, sort)| self.exprs.variable(var, sort))
            .collect();
        let head = self.exprs.apply(decl.clone(), args)?;

        let predicate = decl.out == "Bool";
        let mut conditions = Vec::new();
        let mut implications = Vec::new();
        for case in cases {
            if case.vars.len() != quantees.len() || case.value.is_some() == predicate {
                return Err(Error::structural(format!("malformed rule for {}", symbol)));
            }

            let case_quantees: Vec<(String, String)> = case
                .vars
                .iter()
                .cloned()
                .zip(decl.args.iter().cloned())
                .collect();
            let body = self.rename(case.body, &case_quantees, &quantees)?;
            conditions.push(body);

            if let Some(value) = case.value {
                let value = self.rename(value, &case_quantees, &quantees)?;
                let equality = self.exprs.compare(CmpOp::Eq, head, value)?;
                implications.push(self.exprs.implies(body, equality)?);
            }
        }

        let any = self.exprs.or(conditions)?;
        let body = if predicate {
            self.exprs.equiv(head, any)?
        } else {
            implications.push(any);
            self.exprs.and(implications)?
        };

        Ok(Rule {
            symbol: decl,
            quantees,
            body,
        })
    }

    /// Renames variables `from` to `to`, position by position.
    fn rename(&mut self, id: NodeId, from: &[(String, String)], to: &[(String, String)]) -> Result<NodeId> {
        let mut binding = Binding::default();
        for ((old, _), (new, sort)) in from.iter().zip(to.iter()) {
            if old != new {
                binding.insert(old.clone(), self.exprs.variable(new, sort));
            }
        }

        self.exprs.substitute(id, &binding)
    }

    fn instantiate_definitions(&mut self, domains: &Domains, structure: &Binding) -> Result<()> {
        self.def_constraints.clear();

        for (symbol, rule) in self.clark.clone() {
            let types: Vec<String> = rule.quantees.iter().map(|(_, sort)| sort.clone()).collect();
            let mut instances = Vec::new();

            for tuple in self.tuples(&types)? {
                let mut binding = Binding::default();
                let mut args = Vec::with_capacity(tuple.len());
                for ((var, sort), value) in rule.quantees.iter().zip(tuple.iter()) {
                    let element = self.exprs.from_value(value, sort);
                    binding.insert(var.clone(), element);
                    args.push(element);
                }

                let head = self.exprs.apply(rule.symbol.clone(), args)?;
                let instance = self.exprs.substitute(rule.body, &binding)?;
                let instance = self.exprs.expand_quantifiers(instance, domains)?;
                let instance = self.exprs.substitute(instance, structure)?;
                self.exprs.set_co_constraint(head, instance);
                instances.push(instance);
            }

            let conjunction = self.exprs.and(instances)?;
            self.def_constraints.insert(symbol, conjunction);
        }

        Ok(())
    }

    fn collect_questions(&mut self) {
        self.compound.clear();
        let roots: Vec<NodeId> = self
            .ground
            .iter()
            .chain(self.def_constraints.values())
            .copied()
            .collect();

        let mut atomic = IndexSet::new();
        for root in roots {
            for id in self.exprs.walk(root) {
                if self.exprs.is_rigid(id) || !self.is_ground(id) {
                    continue;
                }

                match self.exprs.kind(id) {
                    ExprKind::Applied(_) | ExprKind::Comparison(_) | ExprKind::Membership => {
                        atomic.insert(id);
                    }
                    ExprKind::Conjunction
                    | ExprKind::Disjunction
                    | ExprKind::Implication
                    | ExprKind::RevImplication
                    | ExprKind::Equivalence => {
                        self.compound.insert(id);
                    }
                    _ => {}
                }
            }
        }

        for id in atomic {
            // Only finite terms can be asked about.
            let finite = match self.exprs.sort(id) {
                Some(sort) => {
                    self.vocabulary.base(sort) == Some(BaseType::Bool) || self.vocabulary.domain(sort).is_some()
                }
                None => false,
            };

            if finite {
                self.assignments
                    .assert_(&self.exprs, id, None, Status::Unknown, None);
            }
        }
    }

    /// Applications must have rigid arguments, and nothing may still
    /// be bound by a quantifier.
    fn is_ground(&self, id: NodeId) -> bool {
        self.exprs.walk(id).into_iter().all(|n| match self.exprs.kind(n) {
            ExprKind::Variable(_) | ExprKind::Quantee { .. } | ExprKind::Symbol(_) => false,
            ExprKind::Applied(_) if n == id => self
                .exprs
                .children(n)
                .iter()
                .all(|arg| self.exprs.is_rigid(*arg)),
            _ => true,
        })
    }
}

#[cfg(test)]
use crate::vocabulary::TypeDecl;

#[cfg(test)]
fn color_theory() -> TheoryModel {
    let mut theory = TheoryModel::new();
    theory
        .add(TheoryBlock {
            declarations: vec![
                Declaration::Type(TypeDecl::enumeration("Color", &["red", "green", "blue"])),
                Declaration::Symbol(SymbolDecl::predicate("warm", &["Color"])),
                Declaration::Symbol(SymbolDecl::new("paint", &[], "Color")),
                Declaration::Symbol(SymbolDecl::predicate("nice", &[])),
            ],
            ..TheoryBlock::default()
        })
        .expect("ok");
    theory
}

#[test]
fn test_add_conflicts() {
    let mut theory = color_theory();
    let conflict = TheoryBlock {
        declarations: vec![Declaration::Symbol(SymbolDecl::new("paint", &[], "Bool"))],
        ..TheoryBlock::default()
    };
    assert!(matches!(theory.add(conflict), Err(Error::Structural { .. })));

    let mut interpretations = IndexMap::new();
    interpretations.insert(
        "paint".to_string(),
        Interpretation::Symbol {
            table: vec![(vec![], Value::name("red"))],
            default: None,
        },
    );
    theory
        .add(TheoryBlock {
            interpretations: interpretations.clone(),
            ..TheoryBlock::default()
        })
        .expect("ok");

    interpretations.insert(
        "paint".to_string(),
        Interpretation::Symbol {
            table: vec![(vec![], Value::name("blue"))],
            default: None,
        },
    );
    assert!(theory
        .add(TheoryBlock {
            interpretations,
            ..TheoryBlock::default()
        })
        .is_err());
}

#[test]
fn test_interpret_structure() {
    let mut theory = color_theory();
    let mut interpretations = IndexMap::new();
    interpretations.insert(
        "warm".to_string(),
        Interpretation::Symbol {
            table: vec![(vec![Value::name("red")], Value::Bool(true))],
            default: Some(Value::Bool(false)),
        },
    );

    // nice ⇔ warm(paint)
    let warm = theory.symbol("warm").expect("ok");
    let paint = theory.symbol("paint").expect("ok");
    let nice = theory.symbol("nice").expect("ok");
    let exprs = theory.exprs_mut();
    let paint = exprs.apply(paint, vec![]).expect("ok");
    let warm_paint = exprs.apply(warm, vec![paint]).expect("ok");
    let nice = exprs.apply(nice, vec![]).expect("ok");
    let constraint = exprs.equiv(nice, warm_paint).expect("ok");

    theory
        .add(TheoryBlock {
            constraints: vec![constraint],
            interpretations,
            goals: vec!["nice".into()],
            ..TheoryBlock::default()
        })
        .expect("ok");
    theory.interpret().expect("ok");

    let structure = theory
        .assignments()
        .values()
        .filter(|a| a.status == Status::Structure)
        .count();
    assert_eq!(structure, 3);
    assert_eq!(
        theory.assignment("nice").and_then(|a| a.relevant),
        Some(true)
    );
    assert!(theory.assignment("paint").is_some());
    assert_eq!(
        theory.assignment("warm(green)").and_then(|a| a.value),
        Some(theory.exprs().truth(false))
    );

    let formula = theory.formula().expect("ok");
    assert_eq!(theory.formula().expect("ok"), formula);
    theory.add(TheoryBlock::default()).expect("ok");
    assert!(theory.cached_formula.is_none());
}

#[test]
fn test_definition_completion() {
    let mut theory = color_theory();
    // warm(c) ← c = red.   warm(c) ← c = blue.
    let red = theory.exprs_mut().constructor("red", "Color");
    let blue = theory.exprs_mut().constructor("blue", "Color");
    let c = theory.exprs_mut().variable("c", "Color");
    let d = theory.exprs_mut().variable("d", "Color");
    let is_red = theory.exprs_mut().compare(CmpOp::Eq, c, red).expect("ok");
    let is_blue = theory.exprs_mut().compare(CmpOp::Eq, d, blue).expect("ok");

    theory
        .add(TheoryBlock {
            rules: vec![
                RuleCase {
                    symbol: "warm".into(),
                    vars: vec!["c".into()],
                    value: None,
                    body: is_red,
                },
                RuleCase {
                    symbol: "warm".into(),
                    vars: vec!["d".into()],
                    value: None,
                    body: is_blue,
                },
            ],
            ..TheoryBlock::default()
        })
        .expect("ok");

    let rule = &theory.clark()["warm"];
    assert_eq!(
        theory.exprs().code(rule.body),
        "warm(c) ⇔ ((c = red) ∨ (c = blue))"
    );

    theory.interpret().expect("ok");
    // Every instance is decided by the definition.
    let definition = theory.def_constraints()["warm"];
    let exprs = theory.exprs();
    let instances: Vec<&str> = exprs
        .children(exprs.resolve(definition))
        .iter()
        .map(|i| exprs.code(exprs.resolve(*i)))
        .collect();
    assert_eq!(instances, vec!["warm(red)", "¬warm(green)", "warm(blue)"]);

    let warm = theory.symbol("warm").expect("ok");
    let green = theory.exprs_mut().constructor("green", "Color");
    let head = theory.exprs_mut().apply(warm, vec![green]).expect("ok");
    assert!(theory.exprs().node(head).co_constraint.is_some());
}

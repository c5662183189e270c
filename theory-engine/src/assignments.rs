//! The assignment store maps each tracked sentence to what we know
//! about it: its value (if decided), where that value came from, and
//! whether the user cares about it.
//!
//! Entries are keyed by the sentence's canonical code, and kept in
//! insertion order so that every report is deterministic.
use crate::error::Result;
use crate::expr::{ExprKind, Exprs, NodeId};
use crate::vocabulary::SymbolDecl;
use indexmap::IndexMap;
use satoracle::CmpOp;
use std::rc::Rc;
use tracing::trace;

/// Provenance of an assignment's value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    Unknown,
    Given,
    EnvUniversal,
    Universal,
    EnvConsequence,
    Consequence,
    Expanded,
    Structure,
}

#[derive(Clone, Debug)]
pub struct Assignment {
    pub sentence: NodeId,
    /// A rigid node, when the value is known.
    pub value: Option<NodeId>,
    pub status: Status,
    pub relevant: Option<bool>,
    pub symbol_decl: Option<Rc<SymbolDecl>>,
}

impl Assignment {
    /// Returns the formula stating this assignment: the sentence
    /// itself, its negation, or `sentence = value`.  `None` when the
    /// value is unknown.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed nodes.
    pub fn literal(&self, exprs: &mut Exprs) -> Result<Option<NodeId>> {
        let value = match self.value {
            Some(value) => value,
            None => return Ok(None),
        };

        let literal = match exprs.truth_value(value) {
            Some(true) if is_boolean(exprs, self.sentence) => self.sentence,
            Some(false) if is_boolean(exprs, self.sentence) => exprs.not(self.sentence)?,
            _ => exprs.compare(CmpOp::Eq, self.sentence, value)?,
        };

        Ok(Some(literal))
    }

    /// Returns whether this is a negative boolean literal.
    #[must_use]
    pub fn is_negative(&self, exprs: &Exprs) -> bool {
        self.value.and_then(|v| exprs.truth_value(v)) == Some(false)
    }
}

fn is_boolean(exprs: &Exprs, id: NodeId) -> bool {
    exprs.sort(id) == Some("Bool")
}

/// Returns the first user-visible symbol applied in `sentence`.
fn symbol_of(exprs: &Exprs, sentence: NodeId) -> Option<Rc<SymbolDecl>> {
    exprs
        .walk(sentence)
        .into_iter()
        .filter_map(|id| match exprs.kind(id) {
            ExprKind::Applied(_) => exprs.node(id).decl.clone(),
            _ => None,
        })
        .find(|decl| !decl.is_internal())
}

#[derive(Clone, Debug, Default)]
pub struct Assignments {
    entries: IndexMap<String, Assignment>,
    symbols: IndexMap<String, Rc<SymbolDecl>>,
}

impl Assignments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records what we know about `sentence`, merging with any
    /// existing entry: a known value is never overwritten, the status
    /// only moves away from `Unknown`, and `relevant` only changes
    /// when given.
    pub fn assert_(
        &mut self,
        exprs: &Exprs,
        sentence: NodeId,
        value: Option<NodeId>,
        status: Status,
        relevant: Option<bool>,
    ) -> &Assignment {
        let code = exprs.code(sentence).to_string();
        if !self.entries.contains_key(&code) {
            let symbol_decl = symbol_of(exprs, sentence);
            if let Some(decl) = &symbol_decl {
                self.symbols
                    .entry(decl.name.clone())
                    .or_insert_with(|| decl.clone());
            }

            self.entries.insert(
                code.clone(),
                Assignment {
                    sentence,
                    value: None,
                    status: Status::Unknown,
                    relevant: None,
                    symbol_decl,
                },
            );
        }

        let entry = &mut self.entries[&code];
        if entry.value.is_none() {
            entry.value = value;
        }

        if entry.status == Status::Unknown {
            entry.status = status;
        } else if status != Status::Unknown && status != entry.status {
            // Keep the first provenance; the oracle rejects genuine
            // contradictions later.
            trace!(sentence = %code, kept = ?entry.status, ignored = ?status, "status conflict");
        }

        if relevant.is_some() {
            entry.relevant = relevant;
        }

        entry
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Assignment> {
        self.entries.get(code)
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Assignment)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.values()
    }

    /// Returns the assignments whose value is still unknown.
    pub fn open(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.values().filter(|a| a.value.is_none())
    }

    /// Returns the assignments whose value is known.
    pub fn known(&self) -> impl Iterator<Item = &Assignment> {
        self.entries.values().filter(|a| a.value.is_some())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declarations referenced by the tracked sentences.
    #[must_use]
    pub fn symbols(&self) -> &IndexMap<String, Rc<SymbolDecl>> {
        &self.symbols
    }

    /// Returns an independent copy, for branching.  Nodes are
    /// immutable once interned, so sharing them is safe.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
use crate::expr::test_symbol;

#[test]
fn test_assert_merge() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let (verum, falsum) = (exprs.truth(true), exprs.truth(false));
    let mut store = Assignments::new();

    store.assert_(&exprs, p, None, Status::Unknown, Some(true));
    assert_eq!(store.get("p").map(|a| a.value), Some(None));
    assert_eq!(store.symbols().len(), 1);

    // First value wins.
    store.assert_(&exprs, p, Some(verum), Status::Given, None);
    store.assert_(&exprs, p, Some(falsum), Status::Given, None);
    let entry = store.get("p").expect("tracked");
    assert_eq!(entry.value, Some(verum));
    assert_eq!(entry.status, Status::Given);
    assert_eq!(entry.relevant, Some(true));
    assert_eq!(store.open().count(), 0);
    assert_eq!(store.known().count(), 1);
}

#[test]
fn test_status_conflict_is_permissive() {
    // A different non-Unknown status does not replace the first one,
    // and is not reported as an error here.
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let verum = exprs.truth(true);
    let mut store = Assignments::new();

    store.assert_(&exprs, p, Some(verum), Status::Structure, None);
    let entry = store.assert_(&exprs, p, Some(verum), Status::Consequence, Some(false));
    assert_eq!(entry.status, Status::Structure);
    assert_eq!(entry.relevant, Some(false));
}

#[test]
fn test_literal_and_copy() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let (three, falsum) = (exprs.int(3), exprs.truth(false));
    let mut store = Assignments::new();

    store.assert_(&exprs, p, Some(falsum), Status::Given, None);
    store.assert_(&exprs, x, Some(three), Status::Given, None);

    let snapshot = store.copy();
    store.assert_(&exprs, exprs.truth(true), None, Status::Unknown, None);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(store.len(), 3);

    let not_p = snapshot.get("p").expect("p").literal(&mut exprs).expect("ok");
    assert_eq!(not_p.map(|n| exprs.code(n).to_string()), Some("¬p".into()));
    let x_is_3 = snapshot.get("x").expect("x").literal(&mut exprs).expect("ok");
    assert_eq!(x_is_3.map(|n| exprs.code(n).to_string()), Some("x = 3".into()));
    assert!(snapshot.get("p").expect("p").is_negative(&exprs));
}

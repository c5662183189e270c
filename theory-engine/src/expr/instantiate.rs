//! Substitution and quantifier expansion.
//!
//! Both rebuild trees bottom-up through the regular constructors, so
//! every instance is simplified as it is created.
use super::{AggregateKind, ExprKind, Exprs, NodeId};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

/// Maps codes (variable names, or ground terms) to replacements.
pub type Binding = FxHashMap<String, NodeId>;

/// Maps type names to their elements, as rigid nodes.
pub type Domains = FxHashMap<String, Vec<NodeId>>;

impl Exprs {
    /// Replaces every sub-node of `id` whose code is bound in
    /// `binding`.  Variables bound by a quantifier inside `id` shadow
    /// `binding`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a rebuilt node is malformed.
    pub fn substitute(&mut self, id: NodeId, binding: &Binding) -> Result<NodeId> {
        if binding.is_empty() {
            return Ok(id);
        }

        if let Some(to) = binding.get(self.code(id)) {
            return Ok(*to);
        }

        let children = self.children(id).to_vec();
        if children.is_empty() {
            return Ok(id);
        }

        let bound = self.bound_variables(id);
        let shadowed;
        let binding = if bound.iter().any(|(var, _)| binding.contains_key(var)) {
            let mut inner = binding.clone();
            for (var, _) in &bound {
                inner.remove(var);
            }
            shadowed = inner;
            &shadowed
        } else {
            binding
        };

        let mut rebuilt = Vec::with_capacity(children.len());
        for child in children {
            rebuilt.push(self.substitute(child, binding)?);
        }

        self.rebuild(id, rebuilt)
    }

    /// Expands every quantifier and aggregate in `id` over the
    /// elements listed in `domains`.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` when a quantified type is not
    /// enumerated in `domains`.
    pub fn expand_quantifiers(&mut self, id: NodeId, domains: &Domains) -> Result<NodeId> {
        let children = self.children(id).to_vec();
        if children.is_empty() {
            return Ok(id);
        }

        let quantees = self.quantee_count(&children);
        match self.kind(id).clone() {
            ExprKind::Quantification(quantifier) if quantees > 0 => {
                let body = self.expand_quantifiers(children[quantees], domains)?;
                let instances = self.instantiate(id, body, domains)?;
                self.quantification(quantifier, instances)
            }
            ExprKind::Aggregate(kind) if quantees > 0 => {
                let cond = self.expand_quantifiers(children[quantees], domains)?;
                let term = match kind {
                    AggregateKind::Count => self.int(1),
                    AggregateKind::Sum => self.expand_quantifiers(children[quantees + 1], domains)?,
                };
                let zero = self.int(0);
                let template = self.ite(cond, term, zero)?;
                let instances = self.instantiate(id, template, domains)?;
                self.aggregate(kind, instances)
            }
            _ => {
                let mut rebuilt = Vec::with_capacity(children.len());
                for child in children {
                    rebuilt.push(self.expand_quantifiers(child, domains)?);
                }

                self.rebuild(id, rebuilt)
            }
        }
    }

    /// Returns one copy of `template` per assignment of elements to
    /// the variables `binder` quantifies over.
    fn instantiate(&mut self, binder: NodeId, template: NodeId, domains: &Domains) -> Result<Vec<NodeId>> {
        let mut bindings = vec![Binding::default()];

        for (var, sort) in self.bound_variables(binder) {
            let elements = domains.get(&sort).ok_or_else(|| {
                Error::unsupported(format!("cannot quantify over non-enumerated type {}", sort))
            })?;
            let var = &var;

            bindings = bindings
                .into_iter()
                .flat_map(|binding| {
                    elements.iter().map(move |element| {
                        let mut extended = binding.clone();
                        extended.insert(var.clone(), *element);
                        extended
                    })
                })
                .collect();
        }

        bindings
            .iter()
            .map(|binding| self.substitute(template, binding))
            .collect()
    }

    /// Returns whether `id` still contains unexpanded quantees.
    #[must_use]
    pub fn has_quantees(&self, id: NodeId) -> bool {
        self.walk(id)
            .into_iter()
            .any(|n| matches!(self.kind(n), ExprKind::Quantee { .. }))
    }
}

#[cfg(test)]
use super::test_symbol;
#[cfg(test)]
use satoracle::CmpOp;

#[cfg(test)]
fn color_domains(exprs: &mut Exprs) -> Domains {
    let elements = vec![
        exprs.constructor("red", "Color"),
        exprs.constructor("green", "Color"),
    ];
    let mut domains = Domains::default();
    domains.insert("Color".into(), elements);
    domains
}

#[test]
fn test_substitute_shadowing() {
    let mut exprs = Exprs::new();
    let p = test_symbol("p", &["Color"], "Bool");
    let x = exprs.variable("x", "Color");
    let red = exprs.constructor("red", "Color");

    let px = exprs.apply(p.clone(), vec![x]).expect("ok");
    let quantee = exprs.quantee(&["x"], "Color");
    let all = exprs.forall(vec![quantee], px).expect("ok");
    let both = exprs.and(vec![px, all]).expect("ok");

    let mut binding = Binding::default();
    binding.insert("x".into(), red);
    let result = exprs.substitute(both, &binding).expect("ok");
    assert_eq!(exprs.code(result), "p(red) ∧ (∀x ∈ Color: p(x))");
}

#[test]
fn test_expand_quantifiers() {
    let mut exprs = Exprs::new();
    let domains = color_domains(&mut exprs);
    let p = test_symbol("p", &["Color"], "Bool");
    let x = exprs.variable("x", "Color");
    let px = exprs.apply(p, vec![x]).expect("ok");
    let quantee = exprs.quantee(&["x"], "Color");
    let all = exprs.forall(vec![quantee], px).expect("ok");

    let expanded = exprs.expand_quantifiers(all, &domains).expect("ok");
    assert_eq!(exprs.code(expanded), "∀[p(red); p(green)]");
    assert_eq!(exprs.code(exprs.resolve(expanded)), "p(red) ∧ p(green)");
    assert!(!exprs.has_quantees(expanded));

    let quantee = exprs.quantee(&["y"], "Shape");
    let y = exprs.variable("y", "Shape");
    let q = exprs.apply(test_symbol("q", &["Shape"], "Bool"), vec![y]).expect("ok");
    let any = exprs.exists(vec![quantee], q).expect("ok");
    assert!(matches!(
        exprs.expand_quantifiers(any, &domains),
        Err(Error::UnsupportedQuery(_))
    ));
}

#[test]
fn test_expand_count() {
    let mut exprs = Exprs::new();
    let domains = color_domains(&mut exprs);
    let x = exprs.variable("x", "Color");
    let red = exprs.constructor("red", "Color");
    let is_red = exprs.compare(CmpOp::Eq, x, red).expect("ok");
    let quantee = exprs.quantee(&["x"], "Color");

    let count = exprs
        .aggregate(AggregateKind::Count, vec![quantee, is_red])
        .expect("ok");
    assert_eq!(exprs.code(count), "#{x ∈ Color: x = red}");

    // Exactly one color is red.
    let expanded = exprs.expand_quantifiers(count, &domains).expect("ok");
    assert_eq!(exprs.to_value(expanded), Some(satoracle::Value::int(1)));
}

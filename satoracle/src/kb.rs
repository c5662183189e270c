//! Traits and types that represent the oracle's knowledge of the
//! search space.
use super::Value;
use std::fmt::Debug;
use std::hash::Hash;

/// A `StateAtom` names an atomic piece of state, e.g., the truth of
/// `p(1)` or the value of `f(red)`.
pub trait StateAtom
where
    Self: Clone + Debug + Eq + Hash + PartialOrd + Ord + Sized,
{
}

impl StateAtom for String {}

/// A `ChoiceConstraint` is a finite domain from which any valid state
/// must pick exactly one value for `atom`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChoiceConstraint<A: StateAtom> {
    pub atom: A,
    pub options: Vec<Value>,
}

impl<A: StateAtom> ChoiceConstraint<A> {
    /// Returns a choice over `options` for `atom`, with duplicate
    /// options removed and the remaining ones sorted.
    #[must_use]
    pub fn new<I: IntoIterator<Item = Value>>(atom: A, options: I) -> Self {
        let mut options: Vec<Value> = options.into_iter().collect();
        options.sort();
        options.dedup();

        Self { atom, options }
    }
}

#[test]
fn test_choice_dedup() {
    let choice = ChoiceConstraint::new(
        String::from("f"),
        vec![Value::int(2), Value::int(1), Value::int(2)],
    );
    assert_eq!(choice.options, vec![Value::int(1), Value::int(2)]);
}

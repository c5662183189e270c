//! Expressions live in a hash-consed arena.  Every node is identified
//! by a `NodeId`, and two nodes of the same kind with the same
//! canonical `code` are always the same node.
//!
//! Nodes are simplified as they are constructed: building a composite
//! node runs the rewrite rule for its kind, which may fold it to a
//! rigid constant (`value`), point it at an equivalent but simpler
//! node (`simpler`), or prune its children.  The code is computed
//! from the children as they were given, so pretty-printing keeps
//! the shape the caller wrote.
//!
//! Because `simpler` and `value` nodes are always built before the
//! node that points to them, following those links strictly decreases
//! the `NodeId`, and can never cycle.
mod equivalence;
mod instantiate;
mod rewrite;

pub use equivalence::SetCondition;
pub use instantiate::Binding;
pub use instantiate::Domains;

use crate::error::{Error, Result};
use crate::vocabulary::{BaseType, SymbolDecl};
use chrono::{Datelike, NaiveDate};
use num_bigint::BigInt;
use num_rational::BigRational;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use satoracle::{CmpOp, Value};
use std::mem::Discriminant;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Quantifier {
    Forall,
    Exists,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AggregateKind {
    Sum,
    Count,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SumOp {
    Add,
    Sub,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProductOp {
    Mul,
    /// Truncating division when the product is integer-typed.
    Div,
    Mod,
}

/// The shape of a node.  Operator lists (`Comparison`, `Sum`,
/// `Product`) hold one operator between each pair of adjacent
/// children.
///
/// `Quantification` and `Aggregate` nodes start with their `Quantee`
/// children.  Once every quantee has been expanded away, their
/// children are the instances themselves.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Boolean(bool),
    Number(BigRational),
    Date(NaiveDate),
    Constructor(String),
    Symbol(String),
    Variable(String),
    Quantee { vars: Vec<String>, sort: String },
    Quantification(Quantifier),
    IfExpr,
    Implication,
    Equivalence,
    RevImplication,
    Disjunction,
    Conjunction,
    Comparison(Vec<CmpOp>),
    Sum(Vec<SumOp>),
    Product(Vec<ProductOp>),
    Power,
    Unary(UnaryOp),
    Aggregate(AggregateKind),
    Applied(String),
    Membership,
    Bracket,
}

impl ExprKind {
    /// Rigid kinds denote themselves.
    #[must_use]
    pub fn is_rigid(&self) -> bool {
        matches!(
            self,
            ExprKind::Boolean(_) | ExprKind::Number(_) | ExprKind::Date(_) | ExprKind::Constructor(_)
        )
    }

    fn is_leaf(&self) -> bool {
        matches!(
            self,
            ExprKind::Boolean(_)
                | ExprKind::Number(_)
                | ExprKind::Date(_)
                | ExprKind::Constructor(_)
                | ExprKind::Symbol(_)
                | ExprKind::Variable(_)
                | ExprKind::Quantee { .. }
        )
    }

    /// Atomic kinds never need parentheses inside another code.
    fn is_atomic(&self) -> bool {
        self.is_leaf()
            || matches!(
                self,
                ExprKind::Applied(_) | ExprKind::Bracket | ExprKind::Aggregate(_) | ExprKind::Unary(_)
            )
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: ExprKind,
    pub children: Vec<NodeId>,
    pub code: String,
    /// The rigid node this node evaluates to, if constant.
    pub value: Option<NodeId>,
    /// An equivalent node that is closer to a normal form.
    pub simpler: Option<NodeId>,
    /// Name of the node's type.
    pub sort: Option<String>,
    /// Definitional obligation that holds whenever this node occurs.
    pub co_constraint: Option<NodeId>,
    pub decl: Option<Rc<SymbolDecl>>,
}

/// Kind, sort and code: nodes of different types never share an id,
/// even when they print the same.
type InternKey = (Discriminant<ExprKind>, Option<String>, String);

#[derive(Clone, Debug)]
pub struct Exprs {
    nodes: Vec<Node>,
    interned: FxHashMap<InternKey, NodeId>,
    bases: FxHashMap<String, BaseType>,
    truth: [NodeId; 2],
}

impl Default for Exprs {
    fn default() -> Self {
        Self::new()
    }
}

impl Exprs {
    #[must_use]
    pub fn new() -> Self {
        let mut ret = Exprs {
            nodes: Vec::new(),
            interned: FxHashMap::default(),
            bases: FxHashMap::default(),
            truth: [NodeId(0), NodeId(0)],
        };

        for (name, base) in [
            ("Bool", BaseType::Bool),
            ("Int", BaseType::Int),
            ("Real", BaseType::Real),
            ("Date", BaseType::Date),
        ] {
            ret.register_type(name, base);
        }

        let falsum = ret.intern_leaf(ExprKind::Boolean(false), Some("Bool".into()));
        let verum = ret.intern_leaf(ExprKind::Boolean(true), Some("Bool".into()));
        ret.truth = [falsum, verum];
        ret
    }

    /// Tells the arena about a type, so that arithmetic knows when to
    /// truncate.
    pub fn register_type(&mut self, name: &str, base: BaseType) {
        self.bases.insert(name.to_string(), base);
    }

    #[must_use]
    pub fn base(&self, sort: &str) -> Option<BaseType> {
        self.bases.get(sort).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> &ExprKind {
        &self.node(id).kind
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn code(&self, id: NodeId) -> &str {
        &self.node(id).code
    }

    #[must_use]
    pub fn sort(&self, id: NodeId) -> Option<&str> {
        self.node(id).sort.as_deref()
    }

    pub fn set_co_constraint(&mut self, id: NodeId, constraint: NodeId) {
        self.nodes[id.index()].co_constraint = Some(constraint);
    }

    #[must_use]
    pub fn truth(&self, value: bool) -> NodeId {
        self.truth[usize::from(value)]
    }

    /// Returns the rigid node `id` denotes, if any.
    #[must_use]
    pub fn rigid(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        if node.kind.is_rigid() {
            Some(id)
        } else {
            node.value
        }
    }

    #[must_use]
    pub fn is_rigid(&self, id: NodeId) -> bool {
        self.rigid(id).is_some()
    }

    /// Returns the oracle value of a rigid node.  Dates map to their
    /// day ordinal.
    #[must_use]
    pub fn to_value(&self, id: NodeId) -> Option<Value> {
        match &self.node(self.rigid(id)?).kind {
            ExprKind::Boolean(b) => Some(Value::Bool(*b)),
            ExprKind::Number(n) => Some(Value::Number(n.clone())),
            ExprKind::Date(d) => Some(Value::int(i64::from(d.num_days_from_ce()))),
            ExprKind::Constructor(name) => Some(Value::Name(name.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn truth_value(&self, id: NodeId) -> Option<bool> {
        self.to_value(id).and_then(|v| v.as_bool())
    }

    /// Returns the rigid node for `value` in type `sort`.
    pub fn from_value(&mut self, value: &Value, sort: &str) -> NodeId {
        match value {
            Value::Bool(b) => self.truth(*b),
            Value::Number(n) => {
                if self.base(sort) == Some(BaseType::Date) {
                    let day = if n.is_integer() {
                        i32::try_from(n.to_integer()).ok()
                    } else {
                        None
                    };

                    if let Some(date) = day.and_then(NaiveDate::from_num_days_from_ce_opt) {
                        return self.date(date);
                    }
                }

                self.number(n.clone())
            }
            Value::Name(name) => self.constructor(name, sort),
        }
    }

    pub fn number(&mut self, value: BigRational) -> NodeId {
        let sort = if value.is_integer() { "Int" } else { "Real" };
        self.intern_leaf(ExprKind::Number(value), Some(sort.into()))
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.number(BigRational::from_integer(BigInt::from(value)))
    }

    pub fn date(&mut self, value: NaiveDate) -> NodeId {
        self.intern_leaf(ExprKind::Date(value), Some("Date".into()))
    }

    pub fn constructor(&mut self, name: &str, sort: &str) -> NodeId {
        self.intern_leaf(ExprKind::Constructor(name.into()), Some(sort.into()))
    }

    /// A reference to the symbol itself, rather than an application.
    pub fn symbol(&mut self, name: &str) -> NodeId {
        self.intern_leaf(ExprKind::Symbol(name.into()), None)
    }

    pub fn variable(&mut self, name: &str, sort: &str) -> NodeId {
        self.intern_leaf(ExprKind::Variable(name.into()), Some(sort.into()))
    }

    pub fn quantee(&mut self, vars: &[&str], sort: &str) -> NodeId {
        let kind = ExprKind::Quantee {
            vars: vars.iter().map(|v| v.to_string()).collect(),
            sort: sort.into(),
        };
        self.intern_leaf(kind, None)
    }

    /// # Errors
    ///
    /// Returns `Err` when `children` does not fit `kind`.
    pub fn quantification(&mut self, quantifier: Quantifier, children: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Quantification(quantifier), children, None)
    }

    /// # Errors
    ///
    /// Returns `Err` when `quantees` are not all quantees.
    pub fn forall(&mut self, quantees: Vec<NodeId>, body: NodeId) -> Result<NodeId> {
        self.quantify(Quantifier::Forall, quantees, body)
    }

    /// # Errors
    ///
    /// Returns `Err` when `quantees` are not all quantees.
    pub fn exists(&mut self, quantees: Vec<NodeId>, body: NodeId) -> Result<NodeId> {
        self.quantify(Quantifier::Exists, quantees, body)
    }

    fn quantify(&mut self, quantifier: Quantifier, mut quantees: Vec<NodeId>, body: NodeId) -> Result<NodeId> {
        if quantees.iter().any(|q| !self.is_quantee(*q)) {
            return Err(Error::structural("quantification over a non-quantee"));
        }

        quantees.push(body);
        self.quantification(quantifier, quantees)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn ite(&mut self, cond: NodeId, then: NodeId, otherwise: NodeId) -> Result<NodeId> {
        self.make(ExprKind::IfExpr, vec![cond, then, otherwise], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn implies(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Implication, vec![lhs, rhs], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn rev_implies(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.make(ExprKind::RevImplication, vec![lhs, rhs], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn equiv(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Equivalence, vec![lhs, rhs], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn or(&mut self, disjuncts: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Disjunction, disjuncts, None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn and(&mut self, conjuncts: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Conjunction, conjuncts, None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn not(&mut self, inner: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Unary(UnaryOp::Not), vec![inner], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn neg(&mut self, inner: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Unary(UnaryOp::Neg), vec![inner], None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn compare(&mut self, op: CmpOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Comparison(vec![op]), vec![lhs, rhs], None)
    }

    /// Builds the comparison chain `c0 op0 c1 op1 c2 ...`.
    ///
    /// # Errors
    ///
    /// Returns `Err` unless there is one more operand than operators.
    pub fn chain(&mut self, ops: Vec<CmpOp>, operands: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Comparison(ops), operands, None)
    }

    /// # Errors
    ///
    /// Returns `Err` unless there is one more operand than operators.
    pub fn sum(&mut self, ops: Vec<SumOp>, operands: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Sum(ops), operands, None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> Result<NodeId> {
        self.sum(vec![SumOp::Add], vec![lhs, rhs])
    }

    /// # Errors
    ///
    /// Returns `Err` unless there is one more operand than operators.
    pub fn product(&mut self, ops: Vec<ProductOp>, operands: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Product(ops), operands, None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn power(&mut self, base: NodeId, exponent: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Power, vec![base, exponent], None)
    }

    /// Builds `#{quantees: cond}`, or `sum{{term | quantees: cond}}`
    /// from `[quantees.., cond, term]`.
    ///
    /// # Errors
    ///
    /// Returns `Err(UnsupportedQuery)` for a sum without a term.
    pub fn aggregate(&mut self, kind: AggregateKind, children: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Aggregate(kind), children, None)
    }

    /// Applies `decl` to `args`.
    ///
    /// # Errors
    ///
    /// Returns `Err(Structural)` on arity or type mismatch.
    pub fn apply(&mut self, decl: Rc<SymbolDecl>, args: Vec<NodeId>) -> Result<NodeId> {
        self.make(ExprKind::Applied(decl.name.clone()), args, Some(decl))
    }

    /// Builds `term ∈ {elements..}`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn membership(&mut self, term: NodeId, elements: Vec<NodeId>) -> Result<NodeId> {
        let mut children = vec![term];
        children.extend(elements);
        self.make(ExprKind::Membership, children, None)
    }

    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn bracket(&mut self, inner: NodeId) -> Result<NodeId> {
        self.make(ExprKind::Bracket, vec![inner], None)
    }

    /// Constructs `id`'s kind again on `children`.  Returns `id`
    /// itself when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn rebuild(&mut self, id: NodeId, children: Vec<NodeId>) -> Result<NodeId> {
        let node = self.node(id);
        if node.children == children {
            return Ok(id);
        }

        let (kind, decl) = (node.kind.clone(), node.decl.clone());
        self.make(kind, children, decl)
    }

    /// Runs construction-time simplification on `id` again.  The
    /// result always resolves to the same node as `id`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed arguments.
    pub fn rewrite(&mut self, id: NodeId) -> Result<NodeId> {
        let node = self.node(id);
        if node.kind.is_leaf() {
            return Ok(id);
        }

        let (kind, children, decl) = (node.kind.clone(), node.children.clone(), node.decl.clone());
        self.make(kind, children, decl)
    }

    /// Returns every node reachable from `root`, through the resolved
    /// form of each node, in preorder and without duplicates.
    #[must_use]
    pub fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = FxHashSet::default();
        let mut ret = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let id = self.resolve(id);
            if !seen.insert(id) {
                continue;
            }

            ret.push(id);
            stack.extend(self.node(id).children.iter().rev());
        }

        ret
    }

    fn is_quantee(&self, id: NodeId) -> bool {
        matches!(self.kind(id), ExprKind::Quantee { .. })
    }

    /// Returns the number of leading quantee children.
    fn quantee_count(&self, children: &[NodeId]) -> usize {
        children.iter().take_while(|c| self.is_quantee(**c)).count()
    }

    /// Returns the `(var, sort)` pairs bound by `id`'s quantees.
    #[must_use]
    pub fn bound_variables(&self, id: NodeId) -> Vec<(String, String)> {
        let mut ret = Vec::new();
        for child in self.children(id) {
            if let ExprKind::Quantee { vars, sort } = self.kind(*child) {
                ret.extend(vars.iter().map(|v| (v.clone(), sort.clone())));
            }
        }

        ret
    }

    fn intern_leaf(&mut self, kind: ExprKind, sort: Option<String>) -> NodeId {
        let code = self.render(&kind, &[]);
        let key = (std::mem::discriminant(&kind), sort.clone(), code);
        if let Some(id) = self.interned.get(&key) {
            return *id;
        }

        let id = self.next_id();
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
            code: key.2.clone(),
            value: None,
            simpler: None,
            sort,
            co_constraint: None,
            decl: None,
        });
        self.interned.insert(key, id);
        id
    }

    fn next_id(&self) -> NodeId {
        NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX))
    }

    /// Validates, interns and simplifies a composite node.
    fn make(&mut self, kind: ExprKind, children: Vec<NodeId>, decl: Option<Rc<SymbolDecl>>) -> Result<NodeId> {
        self.validate(&kind, &children, decl.as_deref())?;

        let code = self.render(&kind, &children);
        let sort = self.infer_sort(&kind, &children, decl.as_deref());
        let key = (std::mem::discriminant(&kind), sort.clone(), code);
        if let Some(id) = self.interned.get(&key) {
            return Ok(*id);
        }

        let mut node = Node {
            kind,
            children,
            code: key.2.clone(),
            value: None,
            simpler: None,
            sort,
            co_constraint: None,
            decl,
        };
        self.simplify(&mut node)?;

        // Simplification may have built this very node already.
        if let Some(id) = self.interned.get(&key) {
            return Ok(*id);
        }

        let id = self.next_id();
        if node.simpler.map_or(false, |s| s >= id) || node.value.map_or(false, |v| v >= id) {
            return Err(Error::structural(format!("{} would simplify to itself", node.code)));
        }

        self.nodes.push(node);
        self.interned.insert(key, id);
        Ok(id)
    }

    fn validate(&self, kind: &ExprKind, children: &[NodeId], decl: Option<&SymbolDecl>) -> Result<()> {
        let n = children.len();
        let quantees = self.quantee_count(children);
        let ok = match kind {
            ExprKind::Boolean(_)
            | ExprKind::Number(_)
            | ExprKind::Date(_)
            | ExprKind::Constructor(_)
            | ExprKind::Symbol(_)
            | ExprKind::Variable(_)
            | ExprKind::Quantee { .. } => n == 0,
            ExprKind::Quantification(_) => quantees == 0 || n == quantees + 1,
            ExprKind::IfExpr => n == 3,
            ExprKind::Implication | ExprKind::RevImplication | ExprKind::Power => n == 2,
            ExprKind::Equivalence => n >= 2,
            ExprKind::Disjunction | ExprKind::Conjunction => true,
            ExprKind::Comparison(ops) => !ops.is_empty() && ops.len() + 1 == n,
            ExprKind::Sum(ops) => ops.len() + 1 == n,
            ExprKind::Product(ops) => ops.len() + 1 == n,
            ExprKind::Unary(_) | ExprKind::Bracket => n == 1,
            ExprKind::Aggregate(AggregateKind::Count) => quantees == 0 || n == quantees + 1,
            ExprKind::Aggregate(AggregateKind::Sum) => {
                if quantees > 0 && n == quantees + 1 {
                    return Err(Error::unsupported("sum aggregate without an output term"));
                }

                quantees == 0 || n == quantees + 2
            }
            ExprKind::Applied(name) => {
                let decl = decl.ok_or_else(|| Error::UnknownSymbol(name.clone()))?;
                if decl.arity() != n {
                    return Err(Error::structural(format!(
                        "arity mismatch for {}: expected {}, got {}",
                        name,
                        decl.arity(),
                        n
                    )));
                }

                for (arg, expected) in children.iter().zip(decl.args.iter()) {
                    if let Some(actual) = self.sort(*arg) {
                        if !self.compatible(actual, expected) {
                            return Err(Error::structural(format!(
                                "type mismatch for {}: {} is a {}, not a {}",
                                name,
                                self.code(*arg),
                                actual,
                                expected
                            )));
                        }
                    }
                }

                true
            }
            ExprKind::Membership => n >= 1,
        };

        if ok {
            Ok(())
        } else {
            Err(Error::structural(format!(
                "malformed {:?} with {} children",
                kind, n
            )))
        }
    }

    /// Types are compatible when equal, or both numeric.  Unknown
    /// types are given the benefit of the doubt.
    fn compatible(&self, actual: &str, expected: &str) -> bool {
        if actual == expected {
            return true;
        }

        match (self.base(actual), self.base(expected)) {
            (Some(a), Some(e)) => (a == e && a != BaseType::Enum) || (a.is_numeric() && e.is_numeric()),
            _ => true,
        }
    }

    fn infer_sort(&self, kind: &ExprKind, children: &[NodeId], decl: Option<&SymbolDecl>) -> Option<String> {
        let numeric = |ids: &[NodeId]| {
            let all_int = ids
                .iter()
                .all(|c| self.sort(*c).and_then(|s| self.base(s)) == Some(BaseType::Int));
            Some(String::from(if all_int { "Int" } else { "Real" }))
        };

        match kind {
            ExprKind::Quantification(_)
            | ExprKind::Implication
            | ExprKind::Equivalence
            | ExprKind::RevImplication
            | ExprKind::Disjunction
            | ExprKind::Conjunction
            | ExprKind::Comparison(_)
            | ExprKind::Membership
            | ExprKind::Unary(UnaryOp::Not) => Some("Bool".into()),
            ExprKind::IfExpr => self.sort(children[1]).map(String::from),
            ExprKind::Bracket => self.sort(children[0]).map(String::from),
            ExprKind::Sum(_) | ExprKind::Product(_) | ExprKind::Power | ExprKind::Unary(UnaryOp::Neg) => {
                numeric(children)
            }
            ExprKind::Aggregate(AggregateKind::Count) => Some("Int".into()),
            ExprKind::Aggregate(AggregateKind::Sum) => {
                let quantees = self.quantee_count(children);
                if quantees > 0 {
                    numeric(&children[quantees + 1..])
                } else {
                    numeric(children)
                }
            }
            ExprKind::Applied(_) => decl.map(|d| d.out.clone()),
            _ => None,
        }
    }

    fn wrapped(&self, id: NodeId) -> String {
        let node = self.node(id);
        if node.kind.is_atomic() {
            node.code.clone()
        } else {
            format!("({})", node.code)
        }
    }

    fn joined(&self, children: &[NodeId], sep: &str) -> String {
        children
            .iter()
            .map(|c| self.wrapped(*c))
            .collect::<Vec<_>>()
            .join(sep)
    }

    fn render(&self, kind: &ExprKind, children: &[NodeId]) -> String {
        let quantees = self.quantee_count(children);
        let binder = |children: &[NodeId]| {
            children
                .iter()
                .map(|c| self.code(*c).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let interleave = |symbols: Vec<&str>| {
            let mut ret = self.wrapped(children[0]);
            for (symbol, child) in symbols.iter().zip(&children[1..]) {
                ret.push_str(&format!(" {} {}", symbol, self.wrapped(*child)));
            }
            ret
        };

        match kind {
            ExprKind::Boolean(b) => b.to_string(),
            ExprKind::Number(n) => Value::Number(n.clone()).to_string(),
            ExprKind::Date(d) => format!("#{}", d.format("%Y-%m-%d")),
            ExprKind::Constructor(name) | ExprKind::Variable(name) => name.clone(),
            ExprKind::Symbol(name) => format!("`{}", name),
            ExprKind::Quantee { vars, sort } => format!("{} ∈ {}", vars.join(", "), sort),
            ExprKind::Quantification(q) => {
                let symbol = match q {
                    Quantifier::Forall => "∀",
                    Quantifier::Exists => "∃",
                };

                if quantees > 0 {
                    format!(
                        "{}{}: {}",
                        symbol,
                        binder(&children[..quantees]),
                        self.wrapped(children[quantees])
                    )
                } else {
                    format!("{}[{}]", symbol, self.joined(children, "; "))
                }
            }
            ExprKind::IfExpr => format!(
                "if {} then {} else {}",
                self.wrapped(children[0]),
                self.wrapped(children[1]),
                self.wrapped(children[2])
            ),
            ExprKind::Implication => self.joined(children, " ⇒ "),
            ExprKind::Equivalence => self.joined(children, " ⇔ "),
            ExprKind::RevImplication => self.joined(children, " ⇐ "),
            ExprKind::Disjunction if children.is_empty() => "false".into(),
            ExprKind::Conjunction if children.is_empty() => "true".into(),
            ExprKind::Disjunction => self.joined(children, " ∨ "),
            ExprKind::Conjunction => self.joined(children, " ∧ "),
            ExprKind::Comparison(ops) => interleave(ops.iter().map(|op| op.symbol()).collect()),
            ExprKind::Sum(ops) => interleave(
                ops.iter()
                    .map(|op| match op {
                        SumOp::Add => "+",
                        SumOp::Sub => "-",
                    })
                    .collect(),
            ),
            ExprKind::Product(ops) => interleave(
                ops.iter()
                    .map(|op| match op {
                        ProductOp::Mul => "*",
                        ProductOp::Div => "/",
                        ProductOp::Mod => "%",
                    })
                    .collect(),
            ),
            ExprKind::Power => interleave(vec!["^"]),
            ExprKind::Unary(UnaryOp::Not) => format!("¬{}", self.wrapped(children[0])),
            ExprKind::Unary(UnaryOp::Neg) => format!("-{}", self.wrapped(children[0])),
            ExprKind::Aggregate(kind) => match (kind, quantees) {
                (AggregateKind::Count, 0) => format!("#[{}]", self.joined(children, "; ")),
                (AggregateKind::Sum, 0) => format!("sum[{}]", self.joined(children, "; ")),
                (AggregateKind::Count, _) => format!(
                    "#{{{}: {}}}",
                    binder(&children[..quantees]),
                    self.code(children[quantees])
                ),
                (AggregateKind::Sum, _) => format!(
                    "sum{{{{{} | {}: {}}}}}",
                    self.code(children[quantees + 1]),
                    binder(&children[..quantees]),
                    self.code(children[quantees])
                ),
            },
            ExprKind::Applied(name) if children.is_empty() => name.clone(),
            ExprKind::Applied(name) => format!("{}({})", name, binder(children)),
            ExprKind::Membership => format!(
                "{} ∈ {{{}}}",
                self.wrapped(children[0]),
                binder(&children[1..])
            ),
            ExprKind::Bracket => format!("({})", self.code(children[0])),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_symbol(name: &str, args: &[&str], out: &str) -> Rc<SymbolDecl> {
    Rc::new(SymbolDecl::new(name, args, out))
}

#[test]
fn test_hash_consing() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let q = exprs.apply(test_symbol("q", &[], "Bool"), vec![]).expect("ok");

    let a = exprs.and(vec![p, q]).expect("ok");
    let b = exprs.and(vec![p, q]).expect("ok");
    assert_eq!(a, b);
    assert_eq!(exprs.code(a), "p ∧ q");

    let c = exprs.or(vec![a, q]).expect("ok");
    assert_eq!(exprs.code(c), "(p ∧ q) ∨ q");
    let n = exprs.not(a).expect("ok");
    assert_eq!(exprs.code(n), "¬(p ∧ q)");

    assert_eq!(exprs.int(3), exprs.int(3));
    assert_eq!(exprs.truth(true), exprs.truth(true));
    assert_ne!(exprs.truth(true), exprs.truth(false));
}

#[test]
fn test_interning_respects_sorts() {
    let mut exprs = Exprs::new();
    let int_x = exprs.apply(test_symbol("x", &[], "Int"), vec![]).expect("ok");
    let bool_x = exprs.apply(test_symbol("x", &[], "Bool"), vec![]).expect("ok");
    assert_ne!(int_x, bool_x);
    assert_eq!(exprs.code(int_x), exprs.code(bool_x));
    assert_eq!(exprs.sort(int_x), Some("Int"));
    assert_eq!(exprs.sort(bool_x), Some("Bool"));

    let color = exprs.constructor("red", "Color");
    let wine = exprs.constructor("red", "Wine");
    assert_ne!(color, wine);
    assert_eq!(exprs.constructor("red", "Color"), color);
    assert_eq!(exprs.sort(wine), Some("Wine"));
}

#[test]
fn test_links_point_down() {
    let mut exprs = Exprs::new();
    let p = exprs.apply(test_symbol("p", &[], "Bool"), vec![]).expect("ok");
    let q = exprs.apply(test_symbol("q", &[], "Bool"), vec![]).expect("ok");
    let verum = exprs.truth(true);

    let conj = exprs.and(vec![p, verum]).expect("ok");
    let bracket = exprs.bracket(conj).expect("ok");
    let imp = exprs.implies(verum, q).expect("ok");
    let not = exprs.not(imp).expect("ok");
    let not_not = exprs.not(not).expect("ok");
    let (two, four) = (exprs.int(2), exprs.int(4));
    let sum = exprs.add(two, two).expect("ok");
    exprs.compare(CmpOp::Eq, sum, four).expect("ok");
    exprs.or(vec![bracket, not_not]).expect("ok");

    for index in 0..exprs.len() {
        let id = NodeId(u32::try_from(index).expect("small"));
        let node = exprs.node(id);
        assert!(node.simpler.map_or(true, |s| s < id), "{}", node.code);
        assert!(node.value.map_or(true, |v| v < id), "{}", node.code);
    }
}

#[test]
fn test_codes() {
    let mut exprs = Exprs::new();
    let f = test_symbol("f", &["Int", "Int"], "Int");
    let (one, two) = (exprs.int(1), exprs.int(2));
    let x = exprs.variable("x", "Int");

    let app = exprs.apply(f, vec![x, one]).expect("ok");
    assert_eq!(exprs.code(app), "f(x, 1)");
    let sum = exprs.add(app, two).expect("ok");
    assert_eq!(exprs.code(sum), "f(x, 1) + 2");
    let cmp = exprs.compare(CmpOp::Le, sum, one).expect("ok");
    assert_eq!(exprs.code(cmp), "(f(x, 1) + 2) ≤ 1");

    let half = exprs.number(BigRational::new(BigInt::from(1), BigInt::from(2)));
    assert_eq!(exprs.code(half), "1/2");

    let day = NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid");
    let day = exprs.date(day);
    assert_eq!(exprs.code(day), "#2024-01-05");

    let quantee = exprs.quantee(&["x"], "Int");
    let all = exprs.forall(vec![quantee], cmp).expect("ok");
    assert_eq!(exprs.code(all), "∀x ∈ Int: ((f(x, 1) + 2) ≤ 1)");
}

#[test]
fn test_validation() {
    let mut exprs = Exprs::new();
    let p = test_symbol("p", &["Int"], "Bool");
    let one = exprs.int(1);
    let yes = exprs.truth(true);

    assert!(matches!(
        exprs.apply(p.clone(), vec![]),
        Err(Error::Structural { .. })
    ));
    assert!(matches!(
        exprs.apply(p.clone(), vec![yes]),
        Err(Error::Structural { .. })
    ));
    assert!(exprs.apply(p, vec![one]).is_ok());
    assert!(exprs.chain(vec![CmpOp::Eq, CmpOp::Eq], vec![one, one]).is_err());

    let quantee = exprs.quantee(&["x"], "Int");
    let x = exprs.variable("x", "Int");
    let cond = exprs.compare(CmpOp::Gt, x, one).expect("ok");
    assert!(matches!(
        exprs.aggregate(AggregateKind::Sum, vec![quantee, cond]),
        Err(Error::UnsupportedQuery(_))
    ));
    assert!(exprs.aggregate(AggregateKind::Count, vec![quantee, cond]).is_ok());
}

#[test]
fn test_values() {
    let mut exprs = Exprs::new();
    exprs.register_type("Color", BaseType::Enum);

    let red = exprs.from_value(&Value::name("red"), "Color");
    assert_eq!(exprs.kind(red), &ExprKind::Constructor("red".into()));
    assert_eq!(exprs.to_value(red), Some(Value::name("red")));

    let day = NaiveDate::from_ymd_opt(2020, 2, 29).expect("valid");
    let node = exprs.date(day);
    let value = exprs.to_value(node).expect("rigid");
    assert_eq!(exprs.from_value(&value, "Date"), node);
    assert_eq!(exprs.from_value(&Value::int(4), "Int"), exprs.int(4));
}

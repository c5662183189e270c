//! The vocabulary lists the types and symbols a theory may mention.
//!
//! Types are named, and rest on one of a handful of base types.  A
//! type may carry a finite list of elements; only such types can be
//! quantified over or handed to the oracle.  Symbols are typed
//! functions; predicates are simply functions to `Bool`.
use crate::error::{Error, Result};
use indexmap::IndexMap;
use satoracle::Value;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BaseType {
    Bool,
    Int,
    Real,
    Date,
    Enum,
}

impl BaseType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, BaseType::Int | BaseType::Real)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub base: BaseType,
    /// Finite list of elements.  Dates are listed by day ordinal.
    pub elements: Option<Vec<Value>>,
}

impl TypeDecl {
    #[must_use]
    pub fn new(name: &str, base: BaseType) -> Self {
        TypeDecl {
            name: name.to_string(),
            base,
            elements: None,
        }
    }

    /// Returns an enumerated type with constructors `names`.
    #[must_use]
    pub fn enumeration(name: &str, names: &[&str]) -> Self {
        TypeDecl {
            name: name.to_string(),
            base: BaseType::Enum,
            elements: Some(names.iter().map(|n| Value::name(n)).collect()),
        }
    }

    /// Returns the integer range `lo..=hi`.
    #[must_use]
    pub fn range(name: &str, lo: i64, hi: i64) -> Self {
        TypeDecl {
            name: name.to_string(),
            base: BaseType::Int,
            elements: Some((lo..=hi).map(Value::int).collect()),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SymbolDecl {
    pub name: String,
    pub args: Vec<String>,
    pub out: String,
}

impl SymbolDecl {
    #[must_use]
    pub fn new(name: &str, args: &[&str], out: &str) -> Self {
        SymbolDecl {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            out: out.to_string(),
        }
    }

    #[must_use]
    pub fn predicate(name: &str, args: &[&str]) -> Self {
        Self::new(name, args, "Bool")
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Internal symbols start with an underscore.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('_')
    }
}

#[derive(Clone, Debug)]
pub enum Declaration {
    Type(TypeDecl),
    Symbol(SymbolDecl),
}

#[derive(Clone, Debug)]
pub struct Vocabulary {
    types: IndexMap<String, TypeDecl>,
    symbols: IndexMap<String, Rc<SymbolDecl>>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    #[must_use]
    pub fn new() -> Self {
        let mut types = IndexMap::new();
        for (name, base) in [
            ("Bool", BaseType::Bool),
            ("Int", BaseType::Int),
            ("Real", BaseType::Real),
            ("Date", BaseType::Date),
        ] {
            let mut decl = TypeDecl::new(name, base);
            if base == BaseType::Bool {
                decl.elements = Some(vec![Value::Bool(false), Value::Bool(true)]);
            }

            types.insert(name.to_string(), decl);
        }

        Vocabulary {
            types,
            symbols: IndexMap::new(),
        }
    }

    /// Adds `decl` to the vocabulary.  Re-declaring an identical
    /// type or symbol is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Err` when `decl` collides with a different declaration
    /// of the same name, or mentions an undeclared type.
    pub fn declare(&mut self, decl: Declaration) -> Result<()> {
        match decl {
            Declaration::Type(decl) => {
                if let Some(existing) = self.types.get(&decl.name) {
                    if *existing != decl {
                        return Err(collision(&decl.name));
                    }
                    return Ok(());
                }

                if self.symbols.contains_key(&decl.name) {
                    return Err(collision(&decl.name));
                }

                self.types.insert(decl.name.clone(), decl);
            }
            Declaration::Symbol(decl) => {
                for ty in decl.args.iter().chain(std::iter::once(&decl.out)) {
                    if !self.types.contains_key(ty) {
                        return Err(Error::UnknownSymbol(ty.clone()));
                    }
                }

                if let Some(existing) = self.symbols.get(&decl.name) {
                    if **existing != decl {
                        return Err(collision(&decl.name));
                    }
                    return Ok(());
                }

                if self.types.contains_key(&decl.name) {
                    return Err(collision(&decl.name));
                }

                self.symbols.insert(decl.name.clone(), Rc::new(decl));
            }
        }

        Ok(())
    }

    /// Sets the element list of type `name`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the type is unknown, or already enumerated
    /// differently.
    pub fn enumerate(&mut self, name: &str, elements: Vec<Value>) -> Result<()> {
        let decl = self
            .types
            .get_mut(name)
            .ok_or_else(|| Error::UnknownSymbol(name.to_string()))?;

        match &decl.elements {
            Some(existing) if *existing != elements => Err(Error::structural(format!(
                "conflicting enumerations for type {}",
                name
            ))),
            _ => {
                decl.elements = Some(elements);
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// Returns `Err(UnknownSymbol)` when `name` is not declared.
    pub fn symbol(&self, name: &str) -> Result<Rc<SymbolDecl>> {
        self.symbols
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSymbol(name.to_string()))
    }

    #[must_use]
    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    #[must_use]
    pub fn base(&self, name: &str) -> Option<BaseType> {
        self.types.get(name).map(|decl| decl.base)
    }

    /// Returns the elements of type `name`, if it is enumerated.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&[Value]> {
        self.types
            .get(name)
            .and_then(|decl| decl.elements.as_deref())
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.values()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Rc<SymbolDecl>> {
        self.symbols.values()
    }
}

fn collision(name: &str) -> Error {
    Error::structural(format!("incompatible declarations for {}", name))
}

#[test]
fn test_declare() {
    let mut voc = Vocabulary::new();
    voc.declare(Declaration::Type(TypeDecl::enumeration("Color", &["red", "green"])))
        .expect("ok");
    voc.declare(Declaration::Symbol(SymbolDecl::new("color", &[], "Color")))
        .expect("ok");
    // Identical re-declaration is fine.
    voc.declare(Declaration::Symbol(SymbolDecl::new("color", &[], "Color")))
        .expect("ok");

    assert!(matches!(
        voc.declare(Declaration::Symbol(SymbolDecl::new("color", &[], "Bool"))),
        Err(Error::Structural { .. })
    ));
    assert!(matches!(
        voc.declare(Declaration::Symbol(SymbolDecl::new("p", &["Shape"], "Bool"))),
        Err(Error::UnknownSymbol(_))
    ));

    assert_eq!(voc.domain("Color").map(|d| d.len()), Some(2));
    assert_eq!(voc.domain("Bool").map(|d| d.len()), Some(2));
    assert_eq!(voc.domain("Int"), None);
    assert_eq!(voc.symbol("color").expect("ok").arity(), 0);
}

#[test]
fn test_enumerate() {
    let mut voc = Vocabulary::new();
    voc.declare(Declaration::Type(TypeDecl::new("Age", BaseType::Int)))
        .expect("ok");
    voc.enumerate("Age", vec![Value::int(1), Value::int(2)])
        .expect("ok");
    voc.enumerate("Age", vec![Value::int(1), Value::int(2)])
        .expect("ok");
    assert!(voc.enumerate("Age", vec![Value::int(3)]).is_err());
    assert!(voc.enumerate("Shape", vec![]).is_err());
}

//! Reasoning over first-order theories with finite domains.
//!
//! A `TheoryModel` holds a vocabulary, constraints, definitions and a
//! partial structure.  Its sentences live in a hash-consed arena of
//! `Exprs`, simplified as they are built.  The `ConsequenceEngine`
//! derives what the theory entails, enumerates and optimises its
//! models, and the `DecisionTableSynthesizer` summarises how a goal
//! depends on the other questions.  Both speak to a satisfiability
//! `Oracle` from the `satoracle` crate.
mod assignments;
mod config;
mod error;
pub mod expr;
mod propagate;
mod table;
mod theory;
mod translate;
mod vocabulary;

pub use assignments::Assignment;
pub use assignments::Assignments;
pub use assignments::Status;
pub use config::EngineConfig;
pub use error::Error;
pub use error::Result;
pub use expr::Exprs;
pub use expr::NodeId;
pub use propagate::symbolic_propagate;
pub use propagate::ConsequenceEngine;
pub use propagate::Expansion;
pub use propagate::Optimum;
pub use propagate::Propagation;
pub use propagate::Termination;
pub use table::join_set_conditions;
pub use table::DecisionTableSynthesizer;
pub use table::Row;
pub use theory::Interpretation;
pub use theory::Rule;
pub use theory::RuleCase;
pub use theory::TheoryBlock;
pub use theory::TheoryModel;
pub use translate::Probe;
pub use translate::Translator;
pub use vocabulary::BaseType;
pub use vocabulary::Declaration;
pub use vocabulary::SymbolDecl;
pub use vocabulary::TypeDecl;
pub use vocabulary::Vocabulary;

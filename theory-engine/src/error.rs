//! Error types for theory manipulation.
//!
//! An unsatisfiable theory is not an error: it is reported through
//! the result enums of the engines that can detect it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Arity or type mismatch, or incompatible duplicate declaration.
    #[error("structural error: {message}{}", location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
    Structural {
        message: String,
        location: Option<String>,
    },

    /// The query cannot be answered by this engine.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// A top-level check remained unknown after restarting the oracle.
    #[error("oracle returned unknown: {0}")]
    OracleUnknown(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The rows of a decision table do not cover every model.
    #[error("decision table with {rows} rows is not exhaustive")]
    TableNotExhaustive { rows: usize },
}

impl Error {
    pub(crate) fn structural<S: Into<String>>(message: S) -> Self {
        Error::Structural {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn unsupported<S: Into<String>>(message: S) -> Self {
        Error::UnsupportedQuery(message.into())
    }
}

#[test]
fn test_display() {
    let err = Error::Structural {
        message: "arity mismatch for p".into(),
        location: Some("line 3".into()),
    };
    assert_eq!(err.to_string(), "structural error: arity mismatch for p at line 3");
    assert_eq!(
        Error::structural("oops").to_string(),
        "structural error: oops"
    );
}

//! Engine configuration.
//!
//! Every knob has a default, so an empty JSON object is a valid
//! configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget for decision table synthesis, in seconds.
    pub timeout: u64,
    /// Maximum number of rows in a decision table.
    pub max_rows: usize,
    /// Maximum number of models enumerated by `ConsequenceEngine::models`.
    pub max_models: usize,
    /// How many times a session is restarted when the oracle answers
    /// unknown.
    pub unknown_restarts: usize,
    /// How many strict tightenings `optimize` attempts.
    pub optimize_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timeout: 20,
            max_rows: 50,
            max_models: 10,
            unknown_restarts: 1,
            optimize_steps: 10,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON; missing fields keep their
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `Err` when `json` is not a valid configuration object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::structural(format!("bad configuration: {}", e)))
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[test]
fn test_defaults() {
    let config = EngineConfig::from_json("{}").expect("ok");
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.timeout(), Duration::from_secs(20));
}

#[test]
fn test_partial_override() {
    let config = EngineConfig::from_json(r#"{"max_rows": 3, "timeout": 1}"#).expect("ok");
    assert_eq!(config.max_rows, 3);
    assert_eq!(config.timeout, 1);
    assert_eq!(config.optimize_steps, 10);

    assert!(EngineConfig::from_json(r#"{"max_rows": "many"}"#).is_err());
}

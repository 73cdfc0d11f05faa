//! Interpreter configuration
//!
//! Hosts usually embed a `[turtlescript]`-style table in their own settings
//! file; [`Config::from_toml`] accepts the table contents directly.
//!
//! ```toml
//! loop_variable = "i"
//! each_variable = "item"
//! max_call_depth = 256
//! queue_capacity = 64
//! ```

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Result, TurtleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Implicit loop variable bound by `repeat` when none is named
    pub loop_variable: String,
    /// Implicit element variable bound by `each` when none is named
    pub each_variable: String,
    /// Maximum nesting of block invocations (procedure calls, loop bodies, branches)
    pub max_call_depth: usize,
    /// Pending side-effect messages that trigger an automatic flush; 0 disables it
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_variable: "i".to_string(),
            each_variable: "item".to_string(),
            max_call_depth: 256,
            queue_capacity: 64,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TurtleError::InvalidConfig {
            message: e.to_string(),
        })
    }
}

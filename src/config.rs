use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Database identifier
    pub namespace: String,
    /// Target schema version; a mismatch rebuilds every table
    pub version: i64,
    /// Wait for the device readiness signal before touching the database
    pub device_readiness_gate: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            namespace: "orbit".to_string(),
            version: 1,
            device_readiness_gate: false,
        }
    }
}

impl SourceConfig {
    pub fn new(namespace: &str, version: i64) -> Self {
        Self {
            namespace: namespace.to_string(),
            version,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::Configuration("namespace must not be empty".into()));
        }
        if self.version < 1 {
            return Err(Error::Configuration(format!(
                "invalid schema version {}",
                self.version
            )));
        }
        Ok(())
    }
}

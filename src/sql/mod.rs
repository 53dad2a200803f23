//! SQL side of the source
//!
//! - `builder`: pure statement construction
//! - `migrate`: table (re)creation
//! - `version`: persisted schema version checks

use std::fmt::Display;

use crate::types::Value;

pub mod builder;
pub mod migrate;
pub mod version;

/// SQL text plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement without bound values
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|v| v.to_string()).collect();
            write!(f, " [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

use async_trait::async_trait;

use crate::{error::Result, sql::Statement, types::Row};

pub mod sqlite;

/// Embedded SQL engine capability
///
/// Implementations run every statement in its own transaction and report
/// completion asynchronously. The source never talks to a database through
/// anything else, so tests can substitute an in-memory engine.
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Verifies the engine can serve the source; called once at startup
    fn check_capabilities(&self) -> Result<()> {
        Ok(())
    }

    /// Executes one parameterized statement inside one transaction
    async fn execute(&self, stmt: &Statement) -> Result<ResultSet>;

    /// Schema version persisted in the engine's own metadata
    async fn user_version(&self) -> Result<i64>;

    async fn set_user_version(&self, version: i64) -> Result<()>;
}

/// Rows and counters returned by one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub rows_affected: usize,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }
}

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::{
    Connection, ToSql, params_from_iter,
    types::{ToSqlOutput, ValueRef},
};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    sql::Statement,
    types::{Row, Value},
};

use super::{ResultSet, SqlEngine};

/// SQLite backed engine
///
/// One shared connection; the mutex serializes transactions.
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl Clone for SqliteEngine {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl SqliteEngine {
    /// Opens (or creates) `<dir>/<namespace>.db`
    pub fn open(dir: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let path = dir.as_ref().join(format!("{}.db", namespace));
        debug!(path = %path.display(), "opening sqlite database");
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn execute_sync(&self, stmt: &Statement) -> Result<ResultSet> {
        let mut conn = self.conn.lock()?;
        let txn = conn.transaction()?;
        match run(&txn, stmt) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback() {
                    warn!(%rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn run(txn: &rusqlite::Transaction<'_>, stmt: &Statement) -> Result<ResultSet> {
    let mut prepared = txn.prepare(&stmt.sql)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    if columns.is_empty() {
        let rows_affected = prepared.execute(params_from_iter(stmt.params.iter()))?;
        return Ok(ResultSet {
            columns,
            rows: Vec::new(),
            rows_affected,
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = prepared.query(params_from_iter(stmt.params.iter()))?;
    while let Some(row) = cursor.next()? {
        let mut values: Row = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get_ref(i)?)?);
        }
        rows.push(values);
    }
    Ok(ResultSet {
        columns,
        rows,
        rows_affected: 0,
    })
}

fn from_sql(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8(t.to_vec()).map_err(|e| {
            Error::Internal(e.to_string())
        })?),
        ValueRef::Blob(_) => return Err(Error::Internal("blob columns are not supported".into())),
    })
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Boolean(b) => ToSqlOutput::from(*b as i64),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Float(f) => ToSqlOutput::from(*f),
            Value::String(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn execute(&self, stmt: &Statement) -> Result<ResultSet> {
        debug!(%stmt, "executing statement");
        let result = self.execute_sync(stmt);
        // completion is reported from a later poll, never inline
        tokio::task::yield_now().await;
        result
    }

    async fn user_version(&self) -> Result<i64> {
        let version = {
            let conn = self.conn.lock()?;
            conn.query_row("PRAGMA user_version", [], |row| row.get(0))?
        };
        tokio::task::yield_now().await;
        Ok(version)
    }

    async fn set_user_version(&self, version: i64) -> Result<()> {
        {
            let conn = self.conn.lock()?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
        tokio::task::yield_now().await;
        Ok(())
    }
}

use tracing::debug;

use crate::{
    engine::{ResultSet, SqlEngine},
    error::{Error, Result},
    session::Session,
    sql::Statement,
    types::Value,
};

/// What the caller requires from the statement's outcome
#[derive(Debug, Clone, Copy)]
pub enum Expect<'a> {
    /// Any outcome is accepted
    Any,
    /// At least one row must be affected, else NotFound for this row
    Affected { table: &'a str, id: &'a Value },
}

/// Runs one statement in one transaction
///
/// Engine failures propagate as-is; nothing is retried.
pub async fn execute<E: SqlEngine>(
    session: &Session<E>,
    stmt: &Statement,
    expect: Expect<'_>,
) -> Result<ResultSet> {
    let result = session.engine().execute(stmt).await?;
    if let Expect::Affected { table, id } = expect {
        if result.rows_affected == 0 {
            debug!(table, %id, "statement affected no rows");
            return Err(Error::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::{Expect, execute};
    use crate::{
        config::SourceConfig,
        engine::sqlite::SqliteEngine,
        error::{Error, Result},
        session::Session,
        sql::Statement,
        types::Value,
    };

    #[tokio::test]
    async fn test_require_affected_rows() -> Result<()> {
        let session = Session::open(SourceConfig::default(), SqliteEngine::in_memory()?).await?;
        execute(
            &session,
            &Statement::raw("CREATE TABLE t (id TEXT PRIMARY KEY)"),
            Expect::Any,
        )
        .await?;

        let id = Value::from("missing");
        let delete = Statement::new("DELETE FROM t WHERE id = ?", vec![id.clone()]);

        // without the requirement an empty delete is fine
        let rs = execute(&session, &delete, Expect::Any).await?;
        assert_eq!(rs.rows_affected, 0);

        let err = execute(&session, &delete, Expect::Affected { table: "t", id: &id })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::NotFound {
                table: "t".into(),
                id: "missing".into()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_engine_error_propagates() -> Result<()> {
        let session = Session::open(SourceConfig::default(), SqliteEngine::in_memory()?).await?;
        let err = execute(&session, &Statement::raw("SELECT * FROM nope"), Expect::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Engine(msg) if msg.contains("nope")));
        Ok(())
    }
}

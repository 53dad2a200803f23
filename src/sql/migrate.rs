use tracing::info;

use crate::{
    engine::SqlEngine,
    error::Result,
    executor::{self, Expect},
    schema::EntityType,
    session::Session,
    sql::builder::StatementBuilder,
};

/// What the migrator did for one model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Table dropped and recreated, previous rows are gone
    Rebuilt,
    /// Nothing to do
    Skipped,
}

/// Drops and recreates the model's table
pub async fn migrate<E: SqlEngine>(
    session: &Session<E>,
    builder: &StatementBuilder,
    entity: &EntityType,
) -> Result<()> {
    entity.validate()?;
    info!(model = %entity.name, "rebuilding table");
    executor::execute(session, &builder.drop_table(entity), Expect::Any).await?;
    executor::execute(session, &builder.create_table(entity), Expect::Any).await?;
    Ok(())
}

/// Rebuilds when the session needs migration or when forced (purge)
pub async fn migrate_if_needed<E: SqlEngine>(
    session: &Session<E>,
    builder: &StatementBuilder,
    entity: &EntityType,
    force: bool,
) -> Result<Migration> {
    if !session.needs_migration() && !force {
        return Ok(Migration::Skipped);
    }
    migrate(session, builder, entity).await?;
    Ok(Migration::Rebuilt)
}

#[cfg(test)]
mod tests {
    use super::{Migration, migrate, migrate_if_needed};
    use crate::{
        config::SourceConfig,
        engine::sqlite::SqliteEngine,
        error::Result,
        executor::{Expect, execute},
        schema::EntityType,
        session::Session,
        sql::{Statement, builder::StatementBuilder},
        types::{Record, Value},
    };

    fn task() -> EntityType {
        EntityType::new("task")
            .with_attribute("title", "string")
            .with_attribute("done", "boolean")
    }

    #[tokio::test]
    async fn test_migrate_is_destructive() -> Result<()> {
        let session = Session::open(SourceConfig::default(), SqliteEngine::in_memory()?).await?;
        let builder = StatementBuilder::default();
        migrate(&session, &builder, &task()).await?;

        let (insert, _) = builder.insert(&task(), &Record::new("t1").with("title", "a"), None);
        execute(&session, &insert, Expect::Any).await?;
        let rs = execute(&session, &builder.select(&task(), None, None), Expect::Any).await?;
        assert_eq!(rs.len(), 1);

        migrate(&session, &builder, &task()).await?;
        let rs = execute(&session, &builder.select(&task(), None, None), Expect::Any).await?;
        assert!(rs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_created_columns() -> Result<()> {
        let session = Session::open(SourceConfig::default(), SqliteEngine::in_memory()?).await?;
        let builder = StatementBuilder::default();
        migrate(&session, &builder, &task()).await?;

        let rs = execute(
            &session,
            &Statement::raw("SELECT name, type, pk FROM pragma_table_info('task')"),
            Expect::Any,
        )
        .await?;
        assert_eq!(
            rs.rows,
            vec![
                vec![Value::from("id"), Value::from("TEXT"), Value::Integer(1)],
                vec![Value::from("title"), Value::from("TEXT"), Value::Integer(0)],
                vec![Value::from("done"), Value::from("INTEGER"), Value::Integer(0)],
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_skipped_when_version_matches() -> Result<()> {
        let eng = SqliteEngine::in_memory()?;
        let builder = StatementBuilder::default();
        let first = Session::open(SourceConfig::default(), eng.clone()).await?;
        assert_eq!(
            migrate_if_needed(&first, &builder, &task(), false).await?,
            Migration::Rebuilt
        );

        let (insert, _) = builder.insert(&task(), &Record::new("t1"), None);
        execute(&first, &insert, Expect::Any).await?;

        let second = Session::open(SourceConfig::default(), eng).await?;
        assert_eq!(
            migrate_if_needed(&second, &builder, &task(), false).await?,
            Migration::Skipped
        );
        let rs = execute(&second, &builder.select(&task(), None, None), Expect::Any).await?;
        assert_eq!(rs.len(), 1);

        assert_eq!(
            migrate_if_needed(&second, &builder, &task(), true).await?,
            Migration::Rebuilt
        );
        Ok(())
    }
}

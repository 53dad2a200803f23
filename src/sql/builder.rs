use std::{borrow::Cow, collections::BTreeMap};

use crate::{
    error::{Error, Result},
    schema::EntityType,
    sql::Statement,
    types::{Record, Value},
};

/// Equality filters: column name -> value
pub type Query = BTreeMap<String, Value>;

/// Primary key selection for a lookup
#[derive(Debug, Clone, PartialEq)]
pub enum IdSelector {
    One(Value),
    Many(Vec<Value>),
}

/// Identifier escape hook
pub type Escape = fn(&str) -> Cow<'_, str>;

/// Default escape hook: identifiers are trusted and used as-is
pub fn identity(ident: &str) -> Cow<'_, str> {
    Cow::Borrowed(ident)
}

/// Double-quote escaping for dialects that need quoted identifiers
pub fn quote_identifier(ident: &str) -> Cow<'_, str> {
    Cow::Owned(format!("\"{}\"", ident.replace('"', "\"\"")))
}

/// Maps mutation and query intents to parameterized statements
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    escape: Escape,
}

impl Default for StatementBuilder {
    fn default() -> Self {
        Self { escape: identity }
    }
}

impl StatementBuilder {
    pub fn with_escape(escape: Escape) -> Self {
        Self { escape }
    }

    fn esc<'a>(&self, ident: &'a str) -> Cow<'a, str> {
        (self.escape)(ident)
    }

    /// `SELECT *` with optional primary key selection and equality filters, ANDed
    pub fn select(
        &self,
        entity: &EntityType,
        query: Option<&Query>,
        ids: Option<&IdSelector>,
    ) -> Statement {
        let mut sql = format!("SELECT * FROM {}", self.esc(&entity.name));
        let mut filters = Vec::new();
        let mut params = Vec::new();

        let pk = self.esc(&entity.primary_key.name);
        match ids {
            Some(IdSelector::Many(ids)) => {
                let marks = vec!["?"; ids.len()];
                filters.push(format!("{} IN ({})", pk, marks.join(",")));
                params.extend(ids.iter().cloned());
            }
            Some(IdSelector::One(id)) => {
                filters.push(format!("{} = ?", pk));
                params.push(id.clone());
            }
            None => {}
        }

        for (col, value) in query.into_iter().flatten() {
            filters.push(format!("{} = ?", self.esc(col)));
            params.push(value.clone());
        }

        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }
        Statement::new(sql, params)
    }

    /// Upsert of a whole row; returns the statement and the id it binds.
    ///
    /// Attributes missing from `record` are written as NULL.
    pub fn insert(
        &self,
        entity: &EntityType,
        record: &Record,
        id: Option<Value>,
    ) -> (Statement, Value) {
        let id = id
            .or_else(|| record.id.clone())
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::String(uuid::Uuid::new_v4().to_string()));

        let mut cols = vec![self.esc(&entity.primary_key.name)];
        let mut params = vec![id.clone()];
        for attr in &entity.attributes {
            cols.push(self.esc(&attr.name));
            params.push(record.get(&attr.name).cloned().unwrap_or(Value::Null));
        }
        let marks = vec!["?"; cols.len()];

        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            self.esc(&entity.name),
            cols.join(","),
            marks.join(",")
        );
        (Statement::new(sql, params), id)
    }

    /// Partial update limited to the keys present in `partial`
    pub fn update(
        &self,
        entity: &EntityType,
        partial: &BTreeMap<String, Value>,
        id: &Value,
    ) -> Result<Statement> {
        if partial.is_empty() {
            return Err(Error::Internal(format!(
                "update of {} sets no attributes",
                entity.name
            )));
        }

        let mut set = Vec::new();
        let mut params = Vec::new();
        for (col, value) in partial {
            set.push(format!("{} = ?", self.esc(col)));
            params.push(value.clone());
        }
        params.push(id.clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.esc(&entity.name),
            set.join(","),
            self.esc(&entity.primary_key.name)
        );
        Ok(Statement::new(sql, params))
    }

    pub fn delete(&self, entity: &EntityType, id: &Value) -> Statement {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.esc(&entity.name),
            self.esc(&entity.primary_key.name)
        );
        Statement::new(sql, vec![id.clone()])
    }

    pub fn drop_table(&self, entity: &EntityType) -> Statement {
        Statement::raw(format!("DROP TABLE IF EXISTS {}", self.esc(&entity.name)))
    }

    /// Primary key column first, then attributes in declared order
    pub fn create_table(&self, entity: &EntityType) -> Statement {
        let mut cols = vec![format!(
            "{} {} PRIMARY KEY",
            self.esc(&entity.primary_key.name),
            entity.primary_key.datatype.column_type()
        )];
        for attr in &entity.attributes {
            cols.push(format!(
                "{} {}",
                self.esc(&attr.name),
                attr.datatype.column_type()
            ));
        }
        Statement::raw(format!(
            "CREATE TABLE {} ({})",
            self.esc(&entity.name),
            cols.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{IdSelector, Query, StatementBuilder, quote_identifier};
    use crate::{
        error::Result,
        schema::EntityType,
        types::{Record, Value},
    };

    fn task() -> EntityType {
        EntityType::new("task")
            .with_attribute("title", "string")
            .with_attribute("done", "boolean")
    }

    #[test]
    fn test_select_all() {
        let stmt = StatementBuilder::default().select(&task(), None, None);
        assert_eq!(stmt.sql, "SELECT * FROM task");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_by_ids() {
        let ids = IdSelector::Many(vec![Value::from("a"), Value::from("b")]);
        let stmt = StatementBuilder::default().select(&task(), None, Some(&ids));
        assert_eq!(stmt.sql, "SELECT * FROM task WHERE id IN (?,?)");
        assert_eq!(stmt.params, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_select_by_id_and_query() {
        let mut query = Query::new();
        query.insert("done".into(), Value::Boolean(false));
        query.insert("title".into(), Value::from("x"));
        let stmt = StatementBuilder::default().select(
            &task(),
            Some(&query),
            Some(&IdSelector::One(Value::from("t1"))),
        );
        assert_eq!(
            stmt.sql,
            "SELECT * FROM task WHERE id = ? AND done = ? AND title = ?"
        );
        assert_eq!(
            stmt.params,
            vec![Value::from("t1"), Value::Boolean(false), Value::from("x")]
        );
    }

    #[test]
    fn test_insert_columns() {
        let model = task();
        let record = Record::new("ignored").with("title", "buy milk");
        let (stmt, id) =
            StatementBuilder::default().insert(&model, &record, Some(Value::from("t1")));

        assert_eq!(id, Value::from("t1"));
        assert_eq!(
            stmt.sql,
            "INSERT OR REPLACE INTO task (id,title,done) VALUES (?,?,?)"
        );
        // one column per attribute plus the primary key, first
        assert_eq!(stmt.params.len(), 1 + model.attributes.len());
        assert_eq!(
            stmt.params,
            vec![Value::from("t1"), Value::from("buy milk"), Value::Null]
        );
    }

    #[test]
    fn test_insert_generates_id() {
        let builder = StatementBuilder::default();
        let (stmt, id) = builder.insert(&task(), &Record::default(), None);
        assert!(matches!(&id, Value::String(s) if s.len() == 36));
        assert_eq!(stmt.params[0], id);

        let (_, other) = builder.insert(&task(), &Record::default(), None);
        assert_ne!(id, other);

        let (_, from_record) = builder.insert(&task(), &Record::new("r9"), None);
        assert_eq!(from_record, Value::from("r9"));
    }

    #[test]
    fn test_update_and_delete() -> Result<()> {
        let builder = StatementBuilder::default();
        let mut partial = Query::new();
        partial.insert("done".into(), Value::Boolean(true));
        let stmt = builder.update(&task(), &partial, &Value::from("t1"))?;
        assert_eq!(stmt.sql, "UPDATE task SET done = ? WHERE id = ?");
        assert_eq!(stmt.params, vec![Value::Boolean(true), Value::from("t1")]);

        assert!(builder.update(&task(), &Query::new(), &Value::from("t1")).is_err());

        let stmt = builder.delete(&task(), &Value::from("t1"));
        assert_eq!(stmt.sql, "DELETE FROM task WHERE id = ?");
        assert_eq!(stmt.params, vec![Value::from("t1")]);
        Ok(())
    }

    #[test]
    fn test_ddl() {
        let builder = StatementBuilder::default();
        let model = task().with_attribute("due", "date").with_attribute("score", "float");
        assert_eq!(builder.drop_table(&model).sql, "DROP TABLE IF EXISTS task");
        assert_eq!(
            builder.create_table(&model).sql,
            "CREATE TABLE task (id TEXT PRIMARY KEY, title TEXT, done INTEGER, due NUMERIC, score REAL)"
        );
    }

    #[test]
    fn test_escape_hook() {
        let builder = StatementBuilder::with_escape(quote_identifier);
        let stmt = builder.delete(&task(), &Value::from("t1"));
        assert_eq!(stmt.sql, "DELETE FROM \"task\" WHERE \"id\" = ?");
    }
}

use tokio::sync::broadcast;

use crate::{
    cache::Cache,
    engine::ResultSet,
    error::{Error, Result},
    operation::Operation,
    reconcile::{self, TransformEvent},
    schema::{AttrType, EntityType},
    types::{Record, Row, Value},
};

/// Records returned by a lookup, shaped like the request
#[derive(Debug, Clone, PartialEq)]
pub enum Found {
    /// Point lookup that matched
    One(Record),
    /// Multi-id or query lookup, or a point lookup that matched nothing
    Many(Vec<Record>),
}

impl Found {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Found::One(record) => vec![record],
            Found::Many(records) => records,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Found::Many(records) if records.is_empty())
    }
}

/// Converts one raw row into a record typed after the model
pub fn normalize(entity: &EntityType, columns: &[String], row: Row) -> Result<Record> {
    if columns.len() != row.len() {
        return Err(Error::Internal(format!(
            "row of {} has {} values for {} columns",
            entity.name,
            row.len(),
            columns.len()
        )));
    }

    let mut record = Record::default();
    for (col, value) in columns.iter().zip(row) {
        if *col == entity.primary_key.name {
            record.id = Some(value);
            continue;
        }
        let value = match entity.attribute(col) {
            Some(attr) => coerce(&attr.datatype, value),
            None => value,
        };
        record.attributes.insert(col.clone(), value);
    }

    if record.id.as_ref().is_none_or(Value::is_null) {
        return Err(Error::Internal(format!(
            "row of {} has no primary key",
            entity.name
        )));
    }
    Ok(record)
}

fn coerce(datatype: &AttrType, value: Value) -> Value {
    match (datatype, value) {
        (AttrType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
        (AttrType::Float, Value::Integer(i)) => Value::Float(i as f64),
        (_, value) => value,
    }
}

/// Normalizes every row, adds each record to the cache and shapes the result
pub fn deserialize<C: Cache + ?Sized>(
    entity: &EntityType,
    result: ResultSet,
    point: bool,
    cache: &C,
    events: &broadcast::Sender<TransformEvent>,
) -> Result<Found> {
    let ResultSet { columns, rows, .. } = result;
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let record = normalize(entity, &columns, row)?;
        let id = record.id.as_ref().map(Value::to_string).unwrap_or_default();
        reconcile::reconcile(
            cache,
            events,
            Operation::add(&[entity.name.as_str(), id.as_str()], record.clone()),
        )?;
        records.push(record);
    }

    if point && !records.is_empty() {
        return Ok(Found::One(records.swap_remove(0)));
    }
    Ok(Found::Many(records))
}

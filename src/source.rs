//! SQL-backed record source
//!
//! [`SqlSource`] routes patch operations to statements, runs them through
//! the executor and replays each committed change against the cache. Every
//! call takes the [`Session`] it runs in.

use std::collections::BTreeMap;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    cache::Cache,
    deserialize::{self, Found},
    engine::SqlEngine,
    error::{Error, Result},
    executor::{self, Expect},
    operation::{OpCode, Operation, OperationKind, Path, Payload},
    reconcile::{self, Reconciled, TransformEvent},
    schema::{AttrType, EntityType, Schema},
    session::Session,
    sql::{
        builder::{IdSelector, Query, StatementBuilder},
        migrate::{self, Migration},
    },
    types::{Record, Value},
};

/// Capacity of the "did transform" channel
const EVENT_CAPACITY: usize = 256;

/// What a lookup asks for
#[derive(Debug, Clone, PartialEq)]
pub enum FindTarget {
    Id(Value),
    Ids(Vec<Value>),
    Query(Query),
    All,
}

pub struct SqlSource<C: Cache> {
    schema: Schema,
    cache: C,
    builder: StatementBuilder,
    events: broadcast::Sender<TransformEvent>,
}

impl<C: Cache> SqlSource<C> {
    pub fn new(cache: C) -> Self {
        Self::with_builder(cache, StatementBuilder::default())
    }

    pub fn with_builder(cache: C, builder: StatementBuilder) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            schema: Schema::new(),
            cache,
            builder,
            events,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// All registered models
    pub fn models(&self) -> &[EntityType] {
        self.schema.models()
    }

    /// "did transform" notifications, one per reconciled operation
    pub fn subscribe(&self) -> broadcast::Receiver<TransformEvent> {
        self.events.subscribe()
    }

    /// Handles a model registration; rebuilds its table if the session needs migration
    pub async fn register_model<E: SqlEngine>(
        &mut self,
        session: &Session<E>,
        model: EntityType,
    ) -> Result<Migration> {
        let model = self.schema.register(model)?.clone();
        self.cache.register_model(&model.name)?;
        migrate::migrate_if_needed(session, &self.builder, &model, false).await
    }

    /// Drops and recreates one table, or all of them; returns the purged models
    pub async fn purge<E: SqlEngine>(
        &self,
        session: &Session<E>,
        model: Option<&str>,
    ) -> Result<Vec<String>> {
        let names: Vec<String> = match model {
            Some(name) => vec![self.schema.must_get(name)?.name.clone()],
            None => self.schema.models().iter().map(|m| m.name.clone()).collect(),
        };
        for name in &names {
            let entity = self.schema.must_get(name)?;
            migrate::migrate_if_needed(session, &self.builder, entity, true).await?;
        }
        Ok(names)
    }

    /// Point, multi-id, or filtered lookup
    pub async fn find<E: SqlEngine>(
        &self,
        session: &Session<E>,
        model: &str,
        target: FindTarget,
    ) -> Result<Found> {
        let entity = self.schema.must_get(model)?;
        let (stmt, point) = match &target {
            FindTarget::Id(id) => (
                self.builder.select(entity, None, Some(&IdSelector::One(id.clone()))),
                true,
            ),
            FindTarget::Ids(ids) => (
                self.builder.select(entity, None, Some(&IdSelector::Many(ids.clone()))),
                false,
            ),
            FindTarget::Query(query) => (self.builder.select(entity, Some(query), None), false),
            FindTarget::All => (self.builder.select(entity, None, None), false),
        };
        debug!(model, ?target, "find");

        let result = executor::execute(session, &stmt, Expect::Any).await?;
        deserialize::deserialize(entity, result, point, &self.cache, &self.events)
    }

    /// Applies one patch operation to the database, then to the cache
    pub async fn transform<E: SqlEngine>(
        &self,
        session: &Session<E>,
        op: Operation,
    ) -> Result<Reconciled> {
        let kind = op.classify()?;
        debug!(op = %op.op, path = %op.path, ?kind, "transform");
        match kind {
            OperationKind::RecordAdd | OperationKind::RecordReplace => {
                self.upsert(session, op).await
            }
            OperationKind::RecordRemove => self.remove(session, op).await,
            OperationKind::AttributeUpdate => self.update_attribute(session, op).await,
            OperationKind::RelationshipAdd
            | OperationKind::RelationshipRemove
            | OperationKind::RelationshipReplace => self.relationship(op),
        }
    }

    async fn upsert<E: SqlEngine>(&self, session: &Session<E>, mut op: Operation) -> Result<Reconciled> {
        let entity = self.schema.must_get(op.model()?)?;
        let id = id_value(entity, op.id()?);
        let mut record = match op.value.take() {
            Some(Payload::Record(record)) => record,
            None => Record::default(),
            Some(Payload::Value(_)) => {
                return Err(Error::Internal(format!(
                    "{} at {} needs a record payload",
                    op.op, op.path
                )));
            }
        };

        let (stmt, id) = self.builder.insert(entity, &record, Some(id));
        executor::execute(session, &stmt, Expect::Any).await?;

        record.id = Some(id);
        op.value = Some(Payload::Record(record));
        reconcile::reconcile(&self.cache, &self.events, op)
    }

    async fn remove<E: SqlEngine>(&self, session: &Session<E>, op: Operation) -> Result<Reconciled> {
        let entity = self.schema.must_get(op.model()?)?;
        let id = id_value(entity, op.id()?);

        let stmt = self.builder.delete(entity, &id);
        let expect = Expect::Affected {
            table: &entity.name,
            id: &id,
        };
        executor::execute(session, &stmt, expect).await?;

        let path = Path::new(&op.path.segments()[..2]);
        reconcile::reconcile(
            &self.cache,
            &self.events,
            Operation {
                op: OpCode::Remove,
                path,
                value: None,
            },
        )
    }

    async fn update_attribute<E: SqlEngine>(
        &self,
        session: &Session<E>,
        op: Operation,
    ) -> Result<Reconciled> {
        let entity = self.schema.must_get(op.model()?)?;
        let id = id_value(entity, op.id()?);
        let attr = op.path.get(2).ok_or_else(|| op.not_allowed())?;
        // primary keys are immutable once assigned
        if attr == entity.primary_key.name {
            return Err(op.not_allowed());
        }
        let value = match (op.op, &op.value) {
            (OpCode::Remove, _) | (_, None) => Value::Null,
            (_, Some(Payload::Value(value))) => value.clone(),
            (_, Some(Payload::Record(_))) => {
                return Err(Error::Internal(format!(
                    "{} at {} needs a value payload",
                    op.op, op.path
                )));
            }
        };

        let mut partial = BTreeMap::new();
        partial.insert(attr.to_string(), value);
        let stmt = self.builder.update(entity, &partial, &id)?;
        let expect = Expect::Affected {
            table: &entity.name,
            id: &id,
        };
        executor::execute(session, &stmt, expect).await?;

        reconcile::reconcile(&self.cache, &self.events, op)
    }

    /// Relationships have no tables; only the cache sees these operations
    fn relationship(&self, op: Operation) -> Result<Reconciled> {
        self.schema.must_get(op.model()?)?;
        warn!(op = %op.op, path = %op.path, "relationship operation is not persisted");
        reconcile::reconcile(&self.cache, &self.events, op)
    }
}

/// Typed primary key value for a path segment
fn id_value(entity: &EntityType, segment: &str) -> Value {
    match entity.primary_key.datatype {
        AttrType::Integer => segment
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::from(segment)),
        _ => Value::from(segment),
    }
}

use std::{collections::BTreeMap, sync::Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    error::{Error, Result},
    operation::{OpCode, Operation, Path, Payload, RELATIONSHIP_MARKER},
    types::{Record, Value},
};

use super::{Cache, Entry};

/// Capacity of the "did transform" channel
const EVENT_CAPACITY: usize = 256;

/// Key types of the cache key space
#[derive(Debug, Serialize, Deserialize)]
enum Key {
    Model(String),
    Record(String, String),
    /// Relationship value: model, id, segments after the marker
    Link(String, String, String),
}

/// Key prefixes for prefix scanning
///
/// In bincode, enums are serialized as [variant_index][variant_data...],
/// so these variants line up with [`Key`] by definition order.
#[derive(Debug, Serialize, Deserialize)]
enum KeyPrefix {
    Model,
    Record(String),
}

impl Key {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

impl KeyPrefix {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// In-memory cache over a byte-ordered key space
pub struct MemoryCache {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    events: broadcast::Sender<Operation>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            data: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Receives every operation applied to the cache
    pub fn subscribe(&self) -> broadcast::Receiver<Operation> {
        self.events.subscribe()
    }

    /// Number of cached records of `model`
    pub fn count(&self, model: &str) -> Result<usize> {
        Ok(self.scan_records(model)?.len())
    }

    /// Models registered with the cache, in key order
    pub fn models(&self) -> Result<Vec<String>> {
        let prefix = KeyPrefix::Model.encode()?;
        let data = self.data.lock()?;
        let mut models = Vec::new();
        for (key, _) in data.range(prefix.clone()..).take_while(|(k, _)| k.starts_with(&prefix)) {
            match bincode::deserialize::<Key>(key)? {
                Key::Model(name) => models.push(name),
                other => {
                    return Err(Error::Internal(format!("unexpected key: {:?}", other)));
                }
            }
        }
        Ok(models)
    }

    fn scan_records(&self, model: &str) -> Result<Vec<Record>> {
        let prefix = KeyPrefix::Record(model.to_string()).encode()?;
        let data = self.data.lock()?;
        data.range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| bincode::deserialize::<Record>(v).map_err(Error::from))
            .collect()
    }

    fn get_record(&self, model: &str, id: &str) -> Result<Option<Record>> {
        let key = Key::Record(model.to_string(), id.to_string()).encode()?;
        let data = self.data.lock()?;
        data.get(&key)
            .map(|v| bincode::deserialize(v))
            .transpose()
            .map_err(Error::from)
    }

    fn set(&self, key: Key, value: Vec<u8>) -> Result<()> {
        self.data.lock()?.insert(key.encode()?, value);
        Ok(())
    }

    fn delete(&self, key: Key) -> Result<()> {
        self.data.lock()?.remove(&key.encode()?);
        Ok(())
    }

    fn has(&self, key: Key) -> Result<bool> {
        Ok(self.data.lock()?.contains_key(&key.encode()?))
    }

    fn apply(&self, op: &Operation) -> Result<()> {
        let segments = op.path.segments();
        let (model, id) = match segments {
            [model, id, ..] => (model.clone(), id.clone()),
            _ => return Err(op.not_allowed()),
        };

        // [model, id]
        if segments.len() == 2 {
            return match (op.op, &op.value) {
                (OpCode::Remove, _) => self.delete(Key::Record(model, id)),
                (_, Some(Payload::Record(record))) => {
                    let mut record = record.clone();
                    if record.id.is_none() {
                        record.id = Some(Value::String(id.clone()));
                    }
                    self.set(Key::Record(model, id), bincode::serialize(&record)?)
                }
                _ => Err(Error::Internal(format!(
                    "{} at {} needs a record payload",
                    op.op, op.path
                ))),
            };
        }

        // [model, id, __rel, ...]
        if segments[2] == RELATIONSHIP_MARKER {
            let link = Key::Link(model, id, segments[3..].join("/"));
            return match (op.op, &op.value) {
                (OpCode::Remove, _) => self.delete(link),
                (_, Some(Payload::Value(value))) => self.set(link, bincode::serialize(value)?),
                (_, _) => self.set(link, bincode::serialize(&Value::Null)?),
            };
        }

        // [model, id, attribute]
        let mut record = self
            .get_record(&model, &id)?
            .ok_or_else(|| Error::Internal(format!("no cached record at {}", op.path.parent())))?;
        let attr = segments[2].clone();
        match (op.op, &op.value) {
            (OpCode::Remove, _) => {
                record.attributes.remove(&attr);
            }
            (_, Some(Payload::Value(value))) => {
                record.attributes.insert(attr, value.clone());
            }
            (_, None) => {
                record.attributes.insert(attr, Value::Null);
            }
            (_, Some(Payload::Record(_))) => {
                return Err(Error::Internal(format!(
                    "{} at {} needs a value payload",
                    op.op, op.path
                )));
            }
        }
        self.set(Key::Record(model, id), bincode::serialize(&record)?)
    }
}

impl Cache for MemoryCache {
    fn register_model(&self, model: &str) -> Result<()> {
        self.set(Key::Model(model.to_string()), Vec::new())
    }

    fn retrieve(&self, path: &Path) -> Result<Option<Entry>> {
        match path.segments() {
            [model] => {
                if !self.has(Key::Model(model.clone()))? {
                    return Ok(None);
                }
                Ok(Some(Entry::Collection(self.scan_records(model)?)))
            }
            [model, id] => Ok(self.get_record(model, id)?.map(Entry::Record)),
            [model, id, marker, rest @ ..] if marker == RELATIONSHIP_MARKER => {
                let key = Key::Link(model.clone(), id.clone(), rest.join("/")).encode()?;
                let data = self.data.lock()?;
                Ok(data
                    .get(&key)
                    .map(|v| bincode::deserialize(v))
                    .transpose()?
                    .map(Entry::Value))
            }
            [model, id, attr, ..] => Ok(self
                .get_record(model, id)?
                .and_then(|r| r.attributes.get(attr).cloned())
                .map(Entry::Value)),
            _ => Ok(None),
        }
    }

    fn transform(&self, op: &Operation) -> Result<()> {
        debug!(op = %op.op, path = %op.path, "cache transform");
        self.apply(op)?;
        // no receivers is fine
        let _ = self.events.send(op.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCache;
    use crate::{
        cache::{Cache, Entry},
        error::Result,
        operation::{Operation, Path},
        types::{Record, Value},
    };

    #[test]
    fn test_model_bucket() -> Result<()> {
        let cache = MemoryCache::new();
        assert_eq!(cache.retrieve(&Path::new(&["task"]))?, None);

        cache.register_model("task")?;
        cache.register_model("tag")?;
        assert_eq!(
            cache.retrieve(&Path::new(&["task"]))?,
            Some(Entry::Collection(vec![]))
        );
        assert_eq!(cache.models()?, vec!["tag".to_string(), "task".to_string()]);
        Ok(())
    }

    #[test]
    fn test_record_lifecycle() -> Result<()> {
        let cache = MemoryCache::new();
        let mut events = cache.subscribe();
        cache.register_model("task")?;
        cache.register_model("tag")?;

        let record = Record::new("t1").with("title", "a");
        cache.transform(&Operation::add(&["task", "t1"], record.clone()))?;
        cache.transform(&Operation::add(&["tag", "g1"], Record::new("g1")))?;
        assert_eq!(
            cache.retrieve(&Path::new(&["task", "t1"]))?,
            Some(Entry::Record(record))
        );
        assert_eq!(cache.count("task")?, 1);
        assert_eq!(cache.count("tag")?, 1);

        cache.transform(&Operation::replace(&["task", "t1", "title"], Value::from("b")))?;
        assert_eq!(
            cache.retrieve(&Path::new(&["task", "t1", "title"]))?,
            Some(Entry::Value(Value::from("b")))
        );

        cache.transform(&Operation::remove(&["task", "t1", "title"]))?;
        assert_eq!(cache.retrieve(&Path::new(&["task", "t1", "title"]))?, None);

        cache.transform(&Operation::remove(&["task", "t1"]))?;
        assert_eq!(cache.retrieve(&Path::new(&["task", "t1"]))?, None);

        let first = events.try_recv().expect("add event");
        assert_eq!(first.path, Path::new(&["task", "t1"]));
        Ok(())
    }

    #[test]
    fn test_add_fills_missing_id() -> Result<()> {
        let cache = MemoryCache::new();
        cache.transform(&Operation::add(&["task", "t9"], Record::default()))?;
        match cache.retrieve(&Path::new(&["task", "t9"]))? {
            Some(Entry::Record(r)) => assert_eq!(r.id, Some(Value::from("t9"))),
            other => panic!("unexpected entry {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_links() -> Result<()> {
        let cache = MemoryCache::new();
        let path = ["task", "t1", "__rel", "tags", "g1"];
        cache.transform(&Operation::add(&path, Value::Boolean(true)))?;
        assert_eq!(
            cache.retrieve(&Path::new(&path))?,
            Some(Entry::Value(Value::Boolean(true)))
        );
        cache.transform(&Operation::remove(&path))?;
        assert_eq!(cache.retrieve(&Path::new(&path))?, None);
        Ok(())
    }

    #[test]
    fn test_attribute_on_missing_record_fails() {
        let cache = MemoryCache::new();
        let op = Operation::replace(&["task", "nope", "title"], Value::from("x"));
        assert!(cache.transform(&op).is_err());
    }
}

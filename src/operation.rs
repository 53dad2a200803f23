//! Patch operations and their classification
//!
//! An [`Operation`] is interpreted solely from its path length and the
//! identity of the third segment. [`Operation::classify`] makes that
//! decision once and returns an [`OperationKind`] the dispatcher matches on.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{Record, Value},
};

/// Path segment marking a relationship operation
pub const RELATIONSHIP_MARKER: &str = "__rel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Add,
    Replace,
    Remove,
}

impl Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Add => write!(f, "add"),
            OpCode::Replace => write!(f, "replace"),
            OpCode::Remove => write!(f, "remove"),
        }
    }
}

/// Ordered path segments: type, id, then an optional marker or attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new<S: AsRef<str>>(segments: &[S]) -> Self {
        Self(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    /// The path without its last segment
    pub fn parent(&self) -> Path {
        let end = self.0.len().saturating_sub(1);
        Path(self.0[..end].to_vec())
    }

    pub fn child(&self, segment: &str) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Path(segments)
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// Operation value: a whole record or a single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Record(Record),
    Value(Value),
}

impl From<Record> for Payload {
    fn from(value: Record) -> Self {
        Payload::Record(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

/// One atomic patch against a record or attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OpCode,
    pub path: Path,
    pub value: Option<Payload>,
}

impl Operation {
    pub fn add<S: AsRef<str>>(path: &[S], value: impl Into<Payload>) -> Self {
        Self {
            op: OpCode::Add,
            path: Path::new(path),
            value: Some(value.into()),
        }
    }

    pub fn replace<S: AsRef<str>>(path: &[S], value: impl Into<Payload>) -> Self {
        Self {
            op: OpCode::Replace,
            path: Path::new(path),
            value: Some(value.into()),
        }
    }

    pub fn remove<S: AsRef<str>>(path: &[S]) -> Self {
        Self {
            op: OpCode::Remove,
            path: Path::new(path),
            value: None,
        }
    }

    /// Decides how the operation is handled
    pub fn classify(&self) -> Result<OperationKind> {
        let path = &self.path;
        if path.len() > 2 {
            if path.get(2) == Some(RELATIONSHIP_MARKER) {
                return Ok(match self.op {
                    OpCode::Add => OperationKind::RelationshipAdd,
                    OpCode::Remove => OperationKind::RelationshipRemove,
                    OpCode::Replace => OperationKind::RelationshipReplace,
                });
            }
            return Ok(OperationKind::AttributeUpdate);
        }
        if path.len() == 2 {
            return Ok(match self.op {
                OpCode::Add => OperationKind::RecordAdd,
                OpCode::Replace => OperationKind::RecordReplace,
                OpCode::Remove => OperationKind::RecordRemove,
            });
        }
        Err(self.not_allowed())
    }

    pub fn not_allowed(&self) -> Error {
        Error::UnsupportedOperation {
            op: self.op.to_string(),
            path: self.path.to_string(),
        }
    }

    /// Model name (first segment)
    pub fn model(&self) -> Result<&str> {
        self.path.get(0).ok_or_else(|| self.not_allowed())
    }

    /// Record id (second segment)
    pub fn id(&self) -> Result<&str> {
        self.path.get(1).ok_or_else(|| self.not_allowed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    RecordAdd,
    RecordReplace,
    RecordRemove,
    AttributeUpdate,
    RelationshipAdd,
    RelationshipRemove,
    RelationshipReplace,
}

#[cfg(test)]
mod tests {
    use super::{OpCode, Operation, OperationKind, Path};
    use crate::{
        error::{Error, Result},
        types::{Record, Value},
    };

    #[test]
    fn test_classify_record_ops() -> Result<()> {
        let rec = Record::new("t1");
        assert_eq!(
            Operation::add(&["task", "t1"], rec.clone()).classify()?,
            OperationKind::RecordAdd
        );
        assert_eq!(
            Operation::replace(&["task", "t1"], rec).classify()?,
            OperationKind::RecordReplace
        );
        assert_eq!(
            Operation::remove(&["task", "t1"]).classify()?,
            OperationKind::RecordRemove
        );
        Ok(())
    }

    #[test]
    fn test_classify_attribute_and_relationship() -> Result<()> {
        for op in [OpCode::Add, OpCode::Replace, OpCode::Remove] {
            let update = Operation {
                op,
                path: Path::new(&["task", "t1", "title"]),
                value: Some(Value::from("x").into()),
            };
            assert_eq!(update.classify()?, OperationKind::AttributeUpdate);
        }

        let link = Operation::add(&["task", "t1", "__rel", "tags", "g1"], Value::Boolean(true));
        assert_eq!(link.classify()?, OperationKind::RelationshipAdd);
        let unlink = Operation::remove(&["task", "t1", "__rel", "tags", "g1"]);
        assert_eq!(unlink.classify()?, OperationKind::RelationshipRemove);
        let relink = Operation::replace(&["task", "t1", "__rel", "owner"], Value::from("u2"));
        assert_eq!(relink.classify()?, OperationKind::RelationshipReplace);
        Ok(())
    }

    #[test]
    fn test_classify_rejects_short_paths() {
        let op = Operation::remove(&["task"]);
        let err = op.classify().unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedOperation {
                op: "remove".into(),
                path: "task".into(),
            }
        );
        assert_eq!(err.to_string(), "operation not allowed: remove with path: task");
        assert!(Operation::remove::<&str>(&[]).classify().is_err());
    }

    #[test]
    fn test_path_parent() {
        let p = Path::new(&["task", "t1", "title"]);
        assert_eq!(p.parent(), Path::new(&["task", "t1"]));
        assert_eq!(p.parent().parent().parent().parent(), Path::new::<&str>(&[]));
        assert_eq!(p.to_string(), "task/t1/title");
    }
}

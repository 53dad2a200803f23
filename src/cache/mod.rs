//! In-memory record cache capability
//!
//! The source only needs to ask whether a path resolves and to apply an
//! operation. [`memory::MemoryCache`] is the bundled implementation.

use crate::{
    error::Result,
    operation::{Operation, Path},
    types::{Record, Value},
};

pub mod memory;

/// What a cache path resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// `[model]`: every cached record of the model
    Collection(Vec<Record>),
    /// `[model, id]`
    Record(Record),
    /// `[model, id, attribute]` or a relationship path
    Value(Value),
}

pub trait Cache: Send + Sync {
    /// Prepares the cache to hold records of `model`
    fn register_model(&self, _model: &str) -> Result<()> {
        Ok(())
    }

    /// Returns what `path` currently resolves to, if anything
    fn retrieve(&self, path: &Path) -> Result<Option<Entry>>;

    /// Applies the operation and notifies listeners
    fn transform(&self, op: &Operation) -> Result<()>;
}

//! Post-write replay of operations against the in-memory cache
//!
//! The cache is expected to be sparser than the database, so a path that
//! does not resolve is not an error: the operation is reported as
//! transformed without touching the cache.

use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    cache::Cache,
    error::Result,
    operation::{OpCode, Operation},
};

/// "did transform" notification emitted by the source
#[derive(Debug, Clone, PartialEq)]
pub struct TransformEvent {
    pub operation: Operation,
    /// Whether the cache was mutated
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The cache applied the operation
    Applied,
    /// The cache had nothing at the path and was left untouched
    Completed,
}

/// Replays `op` against the cache after its write committed
pub fn reconcile<C: Cache + ?Sized>(
    cache: &C,
    events: &broadcast::Sender<TransformEvent>,
    op: Operation,
) -> Result<Reconciled> {
    reconcile_inner(cache, events, op, true)
}

fn reconcile_inner<C: Cache + ?Sized>(
    cache: &C,
    events: &broadcast::Sender<TransformEvent>,
    mut op: Operation,
    retry: bool,
) -> Result<Reconciled> {
    // an add needs its parent to exist, everything else the target itself
    let verify = match op.op {
        OpCode::Add => op.path.parent(),
        _ => op.path.clone(),
    };

    if cache.retrieve(&verify)?.is_some() {
        cache.transform(&op)?;
        notify(events, op, true);
        return Ok(Reconciled::Applied);
    }

    if op.op == OpCode::Replace && retry {
        debug!(path = %op.path, "replace target not cached, retrying as add");
        op.op = OpCode::Add;
        return reconcile_inner(cache, events, op, false);
    }

    debug!(op = %op.op, path = %op.path, "path not cached, cache left untouched");
    notify(events, op, false);
    Ok(Reconciled::Completed)
}

fn notify(events: &broadcast::Sender<TransformEvent>, operation: Operation, applied: bool) {
    // nobody listening is fine
    let _ = events.send(TransformEvent { operation, applied });
}

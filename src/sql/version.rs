use tracing::{error, info};

use crate::{engine::SqlEngine, error::Result};

/// Outcome of comparing the persisted version with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCheck {
    pub persisted: i64,
    pub target: i64,
    pub matched: bool,
}

impl VersionCheck {
    /// Every registered model must be migrated when versions differ
    pub fn needs_migration(&self) -> bool {
        !self.matched
    }
}

/// Reads the persisted schema version; an unreadable store is fatal
pub async fn current_version<E: SqlEngine + ?Sized>(engine: &E) -> Result<i64> {
    engine.user_version().await.inspect_err(|err| {
        error!(%err, "cannot read persisted schema version");
    })
}

/// Compares versions and persists `target` on mismatch
pub async fn ensure_version<E: SqlEngine + ?Sized>(engine: &E, target: i64) -> Result<VersionCheck> {
    let persisted = current_version(engine).await?;
    let matched = persisted == target;
    if !matched {
        info!(persisted, target, "schema version changed, tables will be rebuilt");
        engine.set_user_version(target).await?;
    }
    Ok(VersionCheck {
        persisted,
        target,
        matched,
    })
}

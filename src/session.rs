use std::future::Future;

use tracing::info;

use crate::{
    config::SourceConfig,
    engine::SqlEngine,
    error::{Error, Result},
    sql::version::{self, VersionCheck},
};

/// Explicit per-database context threaded through every source call
pub struct Session<E: SqlEngine> {
    engine: E,
    namespace: String,
    version: VersionCheck,
}

impl<E: SqlEngine> Session<E> {
    /// Opens a session right away
    ///
    /// Fails when the config asks for a readiness gate; use
    /// [`Session::open_after`] in that case.
    pub async fn open(config: SourceConfig, engine: E) -> Result<Self> {
        if config.device_readiness_gate {
            return Err(Error::Configuration(
                "device readiness gate is set, open the session after the ready signal".into(),
            ));
        }
        Self::start(config, engine).await
    }

    /// Waits for `ready` before touching the database
    pub async fn open_after<F>(config: SourceConfig, engine: E, ready: F) -> Result<Self>
    where
        F: Future<Output = ()>,
    {
        ready.await;
        Self::start(config, engine).await
    }

    async fn start(config: SourceConfig, engine: E) -> Result<Self> {
        config.validate()?;
        engine.check_capabilities()?;

        let version = version::ensure_version(&engine, config.version).await?;
        info!(
            namespace = %config.namespace,
            version = config.version,
            migrate = version.needs_migration(),
            "session opened"
        );
        Ok(Self {
            engine,
            namespace: config.namespace,
            version,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> VersionCheck {
        self.version
    }

    /// Whether registered models get their tables rebuilt
    pub fn needs_migration(&self) -> bool {
        self.version.needs_migration()
    }
}

//! Per-operation connection acquisition

use crate::{Connection, ConnectionConfig, DatabaseDriver, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Hands out a fresh connection for each engine operation.
///
/// The connection is released when the returned `Arc` is dropped, so every
/// exit path of a caller gives it back.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Open (or check out) a connection
    async fn acquire(&self) -> Result<Arc<dyn Connection>>;

    /// Configuration the connections are opened with
    fn config(&self) -> &ConnectionConfig;
}

/// A [`ConnectionSource`] that opens a new driver connection every time
pub struct DriverConnectionSource {
    driver: Arc<dyn DatabaseDriver>,
    config: ConnectionConfig,
}

impl DriverConnectionSource {
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: ConnectionConfig) -> Self {
        Self { driver, config }
    }
}

#[async_trait]
impl ConnectionSource for DriverConnectionSource {
    #[tracing::instrument(skip(self), fields(driver = self.driver.name()))]
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        let connection = self.driver.connect(&self.config).await?;
        tracing::trace!("connection acquired");
        Ok(connection)
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

//! Driver lookup by the name a connection string selects

use std::collections::BTreeMap;
use std::sync::Arc;
use tabula_core::{ConnectionConfig, DatabaseDriver, DriverConnectionSource, Result, TabulaError};

/// Drivers keyed by [`DatabaseDriver::name`]
pub struct DriverRegistry {
    drivers: BTreeMap<&'static str, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Every driver compiled in through crate features
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));

        registry
    }

    /// Add `driver`, replacing any driver registered under the same name
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        tracing::debug!(driver = driver.name(), "registering database driver");
        self.drivers.insert(driver.name(), driver);
    }

    /// Registered driver names, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.drivers.keys().copied().collect()
    }

    /// Pair `config` with the driver named by `config.driver`
    pub fn connection_source(&self, config: ConnectionConfig) -> Result<DriverConnectionSource> {
        match self.drivers.get(config.driver.as_str()) {
            Some(driver) => Ok(DriverConnectionSource::new(driver.clone(), config)),
            None => {
                tracing::warn!(driver = %config.driver, "no such driver");
                Err(TabulaError::Configuration(format!(
                    "unknown driver '{}' (available: {})",
                    config.driver,
                    self.names().join(", ")
                )))
            }
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_both_drivers() {
        let registry = DriverRegistry::with_defaults();
        #[cfg(all(feature = "postgres", feature = "sqlite"))]
        assert_eq!(registry.names(), vec!["postgres", "sqlite"]);
        assert!(DriverRegistry::empty().names().is_empty());
    }

    #[test]
    fn unknown_driver_is_a_configuration_error() {
        let registry = DriverRegistry::with_defaults();
        let err = registry
            .connection_source(ConnectionConfig::new("oracle"))
            .err();
        assert!(matches!(err, Some(TabulaError::Configuration(_))));
    }
}

//! Drivers and the configuration they connect with

use crate::{Connection, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns a [`ConnectionConfig`] into a live [`Connection`]
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Short identifier matched against `ConnectionConfig::driver` (e.g., "postgres", "sqlite")
    fn name(&self) -> &'static str;

    /// Open a connection for `config`
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;
}

/// Where and how to connect, as parsed from a connection string
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Registry key of the driver: "postgres" or "sqlite"
    pub driver: String,
    /// Empty for SQLite
    pub host: String,
    /// 0 means the driver default
    pub port: u16,
    /// Database name, or the file path for SQLite
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Additional connection parameters (`schema`, `ssl_mode`, ...)
    pub params: HashMap<String, String>,
}

impl ConnectionConfig {
    /// An empty configuration for `driver`; fill in the rest field by field
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            host: String::new(),
            port: 0,
            database: None,
            username: None,
            password: None,
            params: HashMap::new(),
        }
    }

    /// Configuration for a SQLite database file
    pub fn new_sqlite(database_path: &str) -> Self {
        let mut config = Self::new("sqlite");
        config.database = Some(database_path.to_string());
        config
    }

    /// A parameter by name, falling back to the matching field
    /// (`host`, `database`/`path`, `username`/`user`, `password`)
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "host" if !self.host.is_empty() => Some(self.host.clone()),
            "database" | "path" => self.database.clone(),
            "username" | "user" => self.username.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }

    /// Schema the engine reads and writes, if one was configured
    pub fn schema(&self) -> Option<&str> {
        self.params.get("schema").map(String::as_str)
    }
}

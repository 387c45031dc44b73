//! `postgres` entry in the driver registry

use async_trait::async_trait;
use std::sync::Arc;
use tabula_core::{Connection, ConnectionConfig, DatabaseDriver, Result};

use crate::PostgresConnection;

/// Connects over TCP with optional TLS; `schema` (default `public`) scopes catalog reads
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(skip(self, config), fields(host = config.get_string("host").as_deref(), database = config.get_string("database").as_deref()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = if config.port > 0 { config.port } else { 5432 };
        let database = config
            .get_string("database")
            .unwrap_or_else(|| "postgres".to_string());
        let schema = config.schema().unwrap_or("public").to_string();
        let ssl_mode = config
            .get_string("ssl_mode")
            .unwrap_or_else(|| "prefer".to_string());
        let ssl_ca_cert = config.get_string("ssl_ca_cert");

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&host)
            .port(port)
            .dbname(&database)
            .application_name("tabula");
        if let Some(user) = config.get_string("user") {
            pg_config.user(&user);
        }
        if let Some(password) = config.get_string("password") {
            pg_config.password(password);
        }

        let conn =
            PostgresConnection::connect(pg_config, &ssl_mode, ssl_ca_cert.as_deref(), schema)
                .await
                .inspect_err(|e| {
                    tracing::error!(error = %e, code = e.code(), "failed to connect to PostgreSQL database");
                })?;

        tracing::info!(host = %host, port = %port, database = %database, ssl = %ssl_mode, "PostgreSQL connection created");
        Ok(Arc::new(conn))
    }
}

//! Connection string parsing
//!
//! Three forms are accepted:
//!
//! - `Key=Value;` pairs: `Host=localhost;Port=5432;Database=app;Username=me;Password=pw;`
//! - URLs: `postgres://me:pw@localhost:5432/app?schema=sales`
//! - SQLite paths: `sqlite:./data.db` or `sqlite://relative/or/absolute.db`

use crate::{ConnectionConfig, Result, TabulaError};

/// Environment variable consulted for the connection string
pub const CONNECTION_STRING_ENV: &str = "DB_CONNECTION_STRING";

/// Used when neither the environment nor the settings file supply a connection string
pub const DEFAULT_CONNECTION_STRING: &str =
    "Host=localhost;Port=5432;Database=postgres;Username=postgres;Password=postgres;";

/// Parse any supported connection string form into a [`ConnectionConfig`]
pub fn parse_connection_string(input: &str) -> Result<ConnectionConfig> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TabulaError::Configuration(
            "connection string is empty".to_string(),
        ));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        parse_postgres_url(trimmed)
    } else if lower.starts_with("sqlite:") {
        parse_sqlite(trimmed)
    } else if trimmed.contains('=') {
        parse_key_value(trimmed)
    } else {
        Err(TabulaError::Configuration(format!(
            "unrecognised connection string format: {}",
            redact(trimmed)
        )))
    }
}

/// Resolve the connection string from `DB_CONNECTION_STRING`, then `fallback`,
/// then the built-in default.
pub fn connection_string_from_env(fallback: Option<&str>) -> String {
    match std::env::var(CONNECTION_STRING_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => fallback
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_CONNECTION_STRING)
            .to_string(),
    }
}

fn parse_key_value(input: &str) -> Result<ConnectionConfig> {
    let mut config = ConnectionConfig::new("postgres");
    config.host = "localhost".to_string();
    config.port = 5432;

    for pair in input.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, value)) = pair.split_once('=') else {
            return Err(TabulaError::Configuration(format!(
                "expected Key=Value, found {pair:?}"
            )));
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "host" | "server" => config.host = value,
            "port" => {
                config.port = value.parse().map_err(|_| {
                    TabulaError::Configuration(format!("invalid port: {value:?}"))
                })?
            }
            "database" => config.database = Some(value),
            "username" | "user id" | "userid" | "user" => config.username = Some(value),
            "password" => config.password = Some(value),
            "driver" => {
                config.driver = normalize_driver(&value)?;
            }
            "schema" | "search path" => {
                config.params.insert("schema".to_string(), value);
            }
            "sslmode" | "ssl mode" => {
                config.params.insert("ssl_mode".to_string(), value.to_ascii_lowercase());
            }
            other => {
                tracing::debug!(key = %other, "ignoring unknown connection string key");
            }
        }
    }

    if config.driver == "sqlite" {
        config.host.clear();
        config.port = 0;
    }

    Ok(config)
}

fn parse_postgres_url(input: &str) -> Result<ConnectionConfig> {
    let url = url::Url::parse(input)
        .map_err(|e| TabulaError::Configuration(format!("invalid connection URL: {e}")))?;

    let mut config = ConnectionConfig::new("postgres");
    config.host = url.host_str().unwrap_or("localhost").to_string();
    config.port = url.port().unwrap_or(5432);

    let database = url.path().trim_start_matches('/');
    if !database.is_empty() {
        config.database = Some(percent_decode(database));
    }
    if !url.username().is_empty() {
        config.username = Some(percent_decode(url.username()));
    }
    config.password = url.password().map(percent_decode);

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "schema" | "search_path" => {
                config.params.insert("schema".to_string(), value.into_owned());
            }
            "sslmode" => {
                config.params.insert("ssl_mode".to_string(), value.into_owned());
            }
            other => {
                config.params.insert(other.to_string(), value.into_owned());
            }
        }
    }

    Ok(config)
}

fn parse_sqlite(input: &str) -> Result<ConnectionConfig> {
    // "sqlite:" is 7 bytes; an optional "//" follows in URL style
    let rest = &input[7..];
    let path = rest.strip_prefix("//").unwrap_or(rest);
    if path.is_empty() {
        return Err(TabulaError::Configuration(
            "sqlite connection string has no path".to_string(),
        ));
    }
    Ok(ConnectionConfig::new_sqlite(path))
}

fn normalize_driver(value: &str) -> Result<String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "npgsql" | "pg" => Ok("postgres".to_string()),
        "sqlite" | "sqlite3" => Ok("sqlite".to_string()),
        other => Err(TabulaError::Configuration(format!(
            "unsupported driver: {other}"
        ))),
    }
}

fn percent_decode(s: &str) -> String {
    url::form_urlencoded::parse(format!("v={s}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}

/// Replace any password in a connection string with `***` for logging
pub fn redact(input: &str) -> String {
    if input.contains("://") {
        if let Ok(mut url) = url::Url::parse(input) {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            return url.to_string();
        }
        return input.to_string();
    }
    input
        .split(';')
        .map(|pair| match pair.split_once('=') {
            Some((k, _)) if k.trim().eq_ignore_ascii_case("password") => format!("{k}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

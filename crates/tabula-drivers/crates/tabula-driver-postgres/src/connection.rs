//! PostgreSQL sessions over tokio-postgres

use async_trait::async_trait;
use bytes::BytesMut;
use native_tls::{Certificate, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use std::sync::Arc;
use std::sync::OnceLock;
use tabula_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, SchemaIntrospection, StatementResult,
    TabulaError, Transaction, Value,
};
use tokio::sync::Mutex;
use tokio_postgres::{
    Client, NoTls, Row as PgRow, Socket, Statement,
    tls::{MakeTlsConnect, TlsConnect},
    types::{FromSql, Kind, ToSql, Type},
};

use crate::numeric::{decode_numeric, encode_numeric};

/// Dedicated Tokio runtime that drives PostgreSQL connection tasks.
///
/// The background connection future must outlive whichever runtime the caller
/// happens to be on (a `#[tokio::test]` runtime is torn down per test), so it
/// is spawned here instead.
fn postgres_runtime() -> Result<&'static tokio::runtime::Runtime> {
    static RUNTIME: OnceLock<std::result::Result<tokio::runtime::Runtime, String>> =
        OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .thread_name("tabula-postgres-runtime")
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| TabulaError::Connection(format!("failed to start PostgreSQL runtime: {e}")))
}

/// Server message with any detail, hint and column the server attached
fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    for (label, extra) in [
        ("detail", db_error.detail()),
        ("hint", db_error.hint()),
        ("column", db_error.column()),
    ] {
        if let Some(extra) = extra
            && !extra.trim().is_empty()
        {
            message.push_str(&format!(" ({label}: {extra})"));
        }
    }

    let summary = match db_error.code().code() {
        "23505" => "duplicate value violates unique constraint",
        "23503" => "foreign key violation",
        "23502" => "null value violates not-null constraint",
        "22007" => "invalid datetime format",
        "22P02" => "invalid input syntax",
        _ => return message,
    };
    format!("{summary}: {message}")
}

/// Convert a tokio-postgres error into a `TabulaError`, keeping the SQLSTATE.
pub(crate) fn map_postgres_error(context: &str, error: &tokio_postgres::Error) -> TabulaError {
    let message = format!("{}: {}", context, format_postgres_error(error));
    match error.code() {
        Some(state) => TabulaError::Database {
            message,
            code: Some(state.code().to_string()),
        },
        None if error.is_closed() => TabulaError::Connection(message),
        None => TabulaError::Query(message),
    }
}

/// One tokio-postgres client shared with the transactions it opens
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    schema: String,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database.
    ///
    /// `ssl_mode` follows libpq naming (`disable`, `prefer`, `require`,
    /// `verify-ca`, `verify-full`). `schema` is the schema catalog queries
    /// default to.
    pub async fn connect(
        mut config: tokio_postgres::Config,
        ssl_mode: &str,
        ssl_ca_cert: Option<&str>,
        schema: String,
    ) -> Result<Self> {
        let ssl_mode = ssl_mode.to_ascii_lowercase();
        config.ssl_mode(match ssl_mode.as_str() {
            "disable" => tokio_postgres::config::SslMode::Disable,
            "require" | "verify-ca" | "verify_ca" | "verify-full" | "verify_full" => {
                tokio_postgres::config::SslMode::Require
            }
            _ => tokio_postgres::config::SslMode::Prefer,
        });

        let client = if ssl_mode == "disable" {
            open_session(config, NoTls).await?
        } else {
            open_session(config, build_tls_connector(&ssl_mode, ssl_ca_cert)?).await?
        };

        tracing::debug!(schema = %schema, ssl_mode = %ssl_mode, "PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            schema,
        })
    }

    /// Schema catalog queries default to
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

/// Connect on the driver runtime and keep the connection task running there
async fn open_session<T>(config: tokio_postgres::Config, tls: T) -> Result<Client>
where
    T: MakeTlsConnect<Socket> + Send + 'static,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let runtime = postgres_runtime()?;
    let (client, connection) = runtime
        .spawn(async move { config.connect(tls).await })
        .await
        .map_err(|e| TabulaError::Connection(format!("PostgreSQL connection task failed: {}", e)))?
        .map_err(|e| map_postgres_error("failed to connect to PostgreSQL", &e))?;

    runtime.spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection closed with an error");
        }
    });
    Ok(client)
}

fn build_tls_connector(ssl_mode: &str, ssl_ca_cert: Option<&str>) -> Result<MakeTlsConnector> {
    let mut builder = TlsConnector::builder();

    if let Some(path) = ssl_ca_cert.filter(|p| !p.is_empty()) {
        let pem = std::fs::read(path)?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            TabulaError::Connection(format!("failed to parse CA certificate: {}", e))
        })?;
        builder.add_root_certificate(cert);
    }

    // prefer/require encrypt without verifying; verify-ca skips only the hostname check
    match ssl_mode {
        "verify-full" | "verify_full" => {}
        "verify-ca" | "verify_ca" => {
            builder.danger_accept_invalid_hostnames(true);
        }
        _ => {
            builder.danger_accept_invalid_hostnames(true);
            builder.danger_accept_invalid_certs(true);
        }
    }

    let connector = builder
        .build()
        .map_err(|e| TabulaError::Connection(format!("failed to build TLS connector: {}", e)))?;
    Ok(MakeTlsConnector::new(connector))
}

/// Owned parameter value handed to tokio-postgres.
///
/// Values are converted against the prepared statement's parameter types so
/// the binary encoding matches the column (INT4 vs INT8, NUMERIC, DATE...).
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

#[derive(Debug)]
struct PgNumericString(String);
#[derive(Debug)]
struct PgFallbackString(String);

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let text = String::from_utf8(raw.to_vec())?;
        Ok(Self(text))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn is_text_type(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

impl PgValue {
    /// Convert a `Value` into the `PgValue` matching the target parameter type.
    fn from_value_for_type(value: &Value, target_type: &Type) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) if is_text_type(target_type) => PgValue::String(v.to_string()),
            Value::Bool(v) => PgValue::Bool(*v),

            Value::Int16(v) => Self::coerce_int(i64::from(*v), target_type),
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target_type),
            Value::Int64(v) => Self::coerce_int(*v, target_type),

            Value::Float32(v) => Self::coerce_float(f64::from(*v), target_type),
            Value::Float64(v) => Self::coerce_float(*v, target_type),

            Value::Decimal(v) => Self::coerce_string(v, target_type),
            Value::String(v) => Self::coerce_string(v, target_type),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) if is_text_type(target_type) => PgValue::String(v.to_string()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(serde_json::Value::String(s)) if *target_type != Type::JSON
                && *target_type != Type::JSONB =>
            {
                Self::coerce_string(s, target_type)
            }
            Value::Json(v) if is_text_type(target_type) => PgValue::String(v.to_string()),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }

    /// Pick the integer width the target column expects. A value that does
    /// not fit is bound as text, which fails the statement instead of
    /// truncating.
    fn coerce_int(value: i64, target_type: &Type) -> Self {
        let as_text = || PgValue::String(value.to_string());
        match *target_type {
            Type::INT2 => i16::try_from(value).map_or_else(|_| as_text(), PgValue::Int16),
            Type::INT4 => i32::try_from(value).map_or_else(|_| as_text(), PgValue::Int32),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            Type::BOOL => PgValue::Bool(value != 0),
            ref ty if is_text_type(ty) => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_float(value: f64, target_type: &Type) -> Self {
        match *target_type {
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::NUMERIC if value.is_nan() => PgValue::Numeric("NaN".to_string()),
            Type::NUMERIC if value.is_infinite() => PgValue::Numeric(if value > 0.0 {
                "Infinity".to_string()
            } else {
                "-Infinity".to_string()
            }),
            Type::NUMERIC => PgValue::Numeric(value.to_string()),
            // i64::MAX as f64 rounds up to 2^63, hence the strict bound
            Type::INT2 | Type::INT4 | Type::INT8
                if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
            {
                Self::coerce_int(value as i64, target_type)
            }
            Type::INT2 | Type::INT4 | Type::INT8 => PgValue::String(value.to_string()),
            ref ty if is_text_type(ty) => PgValue::String(value.to_string()),
            _ => PgValue::Float64(value),
        }
    }

    /// Parse text into the strongly typed value the column expects. Text that
    /// does not parse is sent as-is so the server reports the error.
    fn coerce_string(value: &str, target_type: &Type) -> Self {
        let fallback = || PgValue::String(value.to_string());
        let trimmed = value.trim();

        match *target_type {
            Type::BOOL => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "on" | "1" => PgValue::Bool(true),
                "false" | "f" | "no" | "n" | "off" | "0" => PgValue::Bool(false),
                _ => fallback(),
            },
            Type::INT2 => trimmed.parse().map(PgValue::Int16).unwrap_or_else(|_| fallback()),
            Type::INT4 => trimmed.parse().map(PgValue::Int32).unwrap_or_else(|_| fallback()),
            Type::INT8 => trimmed.parse().map(PgValue::Int64).unwrap_or_else(|_| fallback()),
            Type::FLOAT4 => trimmed.parse().map(PgValue::Float32).unwrap_or_else(|_| fallback()),
            Type::FLOAT8 => trimmed.parse().map(PgValue::Float64).unwrap_or_else(|_| fallback()),
            Type::NUMERIC => match encode_numeric(trimmed) {
                Ok(_) => PgValue::Numeric(trimmed.to_string()),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| PgValue::Numeric(f.to_string()))
                    .unwrap_or_else(fallback),
            },
            Type::UUID => uuid::Uuid::parse_str(trimmed)
                .map(PgValue::Uuid)
                .unwrap_or_else(|_| fallback()),
            Type::BYTEA => trimmed
                .strip_prefix("\\x")
                .and_then(|hex_digits| hex::decode(hex_digits).ok())
                .map(PgValue::Bytes)
                .unwrap_or_else(|| PgValue::Bytes(value.as_bytes().to_vec())),
            Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)
                .map(PgValue::Json)
                .unwrap_or_else(|_| PgValue::Json(serde_json::Value::String(value.to_string()))),
            Type::DATE => chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| fallback()),
            Type::TIME => chrono::NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
                .or_else(|_| chrono::NaiveTime::parse_from_str(trimmed, "%H:%M"))
                .map(PgValue::Time)
                .unwrap_or_else(|_| fallback()),
            Type::TIMESTAMP => parse_naive_timestamp(trimmed)
                .map(PgValue::DateTime)
                .unwrap_or_else(fallback),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
                .or_else(|| {
                    parse_naive_timestamp(trimmed).map(|timestamp| {
                        chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
                            timestamp,
                            chrono::Utc,
                        )
                    })
                })
                .map(PgValue::DateTimeUtc)
                .unwrap_or_else(fallback),
            _ => fallback(),
        }
    }
}

fn parse_naive_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql_checked(ty, out),
            PgValue::Int16(v) => v.to_sql_checked(ty, out),
            PgValue::Int32(v) => v.to_sql_checked(ty, out),
            PgValue::Int64(v) => v.to_sql_checked(ty, out),
            PgValue::Float32(v) => v.to_sql_checked(ty, out),
            PgValue::Float64(v) => v.to_sql_checked(ty, out),
            PgValue::Numeric(v) if *ty == Type::NUMERIC => {
                out.extend_from_slice(&encode_numeric(v)?);
                Ok(postgres_types::IsNull::No)
            }
            // enum labels use their text form on the wire
            PgValue::Numeric(v) | PgValue::String(v) if matches!(ty.kind(), Kind::Enum(_)) => {
                v.to_sql(ty, out)
            }
            PgValue::Numeric(v) | PgValue::String(v) => v.to_sql_checked(ty, out),
            PgValue::Bytes(v) => v.to_sql_checked(ty, out),
            PgValue::Uuid(v) => v.to_sql_checked(ty, out),
            PgValue::Json(v) => v.to_sql_checked(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql_checked(ty, out),
            PgValue::Date(v) => v.to_sql_checked(ty, out),
            PgValue::Time(v) => v.to_sql_checked(ty, out),
            PgValue::DateTime(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Prepare `sql` and convert `params` to the types its placeholders expect
async fn prepare_bound(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> Result<(Statement, Vec<PgValue>)> {
    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| map_postgres_error("failed to prepare statement", &e))?;

    let expected = statement.params();
    if expected.len() != params.len() {
        return Err(TabulaError::Query(format!(
            "statement expects {} parameters, got {}",
            expected.len(),
            params.len()
        )));
    }
    let bound = params
        .iter()
        .zip(expected)
        .map(|(value, ty)| PgValue::from_value_for_type(value, ty))
        .collect();
    Ok((statement, bound))
}

fn as_sql_refs(bound: &[PgValue]) -> Vec<&(dyn ToSql + Sync)> {
    bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

async fn run_query(client: &Client, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let started = std::time::Instant::now();
    let (statement, bound) = prepare_bound(client, sql, params).await?;

    let pg_rows = client
        .query(&statement, &as_sql_refs(&bound))
        .await
        .map_err(|e| map_postgres_error("failed to execute query", &e))?;

    // columns come from the statement so an empty result still has them
    let columns: Vec<ColumnMeta> = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.type_().name().to_string(),
            nullable: true,
            ordinal,
        })
        .collect();
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let rows: Vec<Row> = pg_rows
        .iter()
        .map(|pg_row| {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect();
            Row::new(names.clone(), values)
        })
        .collect();

    tracing::debug!(
        row_count = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query finished"
    );
    Ok(QueryResult { columns, rows })
}

async fn run_execute(client: &Client, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let (statement, bound) = prepare_bound(client, sql, params).await?;

    let affected = client
        .execute(&statement, &as_sql_refs(&bound))
        .await
        .map_err(|e| map_postgres_error("failed to execute statement", &e))?;

    tracing::debug!(affected_rows = affected, "statement finished");
    Ok(StatementResult::affected(affected))
}

/// Statements run on the owning connection's client between `BEGIN` and
/// `COMMIT`/`ROLLBACK`. Dropping an unfinished transaction issues a
/// `ROLLBACK` in the background.
pub struct PostgresTransaction {
    client: Arc<Mutex<Client>>,
    finished: bool,
}

impl PostgresTransaction {
    async fn finish(&mut self, statement: &str) -> Result<()> {
        tracing::debug!(statement, "ending PostgreSQL transaction");
        let outcome = self.client.lock().await.batch_execute(statement).await;
        self.finished = true;
        outcome.map_err(|e| map_postgres_error(&format!("{statement} failed"), &e))
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("PostgreSQL transaction dropped without commit or rollback, rolling back");
        let client = Arc::clone(&self.client);
        if let Ok(runtime) = postgres_runtime() {
            runtime.spawn(async move {
                if let Err(e) = client.lock().await.batch_execute("ROLLBACK").await {
                    tracing::warn!(error = %e, "background rollback failed");
                }
            });
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");
        self.client
            .lock()
            .await
            .batch_execute("BEGIN")
            .await
            .map_err(|e| map_postgres_error("failed to begin transaction", &e))?;

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            finished: false,
        }))
    }

    async fn server_version(&self) -> Result<String> {
        let result = self.query("SHOW server_version", &[]).await?;
        result
            .scalar()
            .and_then(|v| v.as_str())
            .map(|s| format!("PostgreSQL {}", s))
            .ok_or_else(|| TabulaError::Query("server_version returned no rows".to_string()))
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

fn get_or_null<'a, T, F>(row: &'a PgRow, idx: usize, wrap: F) -> Value
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    row.try_get::<_, Option<T>>(idx)
        .ok()
        .flatten()
        .map(wrap)
        .unwrap_or(Value::Null)
}

/// Decode column `idx` by its type name; unknown types fall back to text
fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    match type_name {
        "bool" => get_or_null(row, idx, Value::Bool),
        "int2" => get_or_null(row, idx, Value::Int16),
        "int4" => get_or_null(row, idx, Value::Int32),
        "int8" => get_or_null(row, idx, Value::Int64),
        "oid" => get_or_null(row, idx, |v: u32| Value::Int64(i64::from(v))),
        "float4" => get_or_null(row, idx, Value::Float32),
        "float8" => get_or_null(row, idx, Value::Float64),
        "numeric" => get_or_null(row, idx, |v: PgNumericString| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" => get_or_null(row, idx, Value::String),
        "bytea" => get_or_null(row, idx, Value::Bytes),
        "uuid" => get_or_null(row, idx, Value::Uuid),
        "json" | "jsonb" => get_or_null(row, idx, Value::Json),
        "date" => get_or_null(row, idx, Value::Date),
        "time" => get_or_null(row, idx, Value::Time),
        "timestamp" => get_or_null(row, idx, Value::DateTime),
        "timestamptz" => get_or_null(row, idx, Value::DateTimeUtc),
        // arrays: element type name with a leading underscore
        "_text" | "_varchar" | "_bpchar" | "_name" => get_or_null(row, idx, |arr: Vec<String>| {
            Value::Array(arr.into_iter().map(Value::String).collect())
        }),
        "_int2" => get_or_null(row, idx, |arr: Vec<i16>| {
            Value::Array(arr.into_iter().map(Value::Int16).collect())
        }),
        "_int4" => get_or_null(row, idx, |arr: Vec<i32>| {
            Value::Array(arr.into_iter().map(Value::Int32).collect())
        }),
        "_int8" => get_or_null(row, idx, |arr: Vec<i64>| {
            Value::Array(arr.into_iter().map(Value::Int64).collect())
        }),
        // Enums and other custom types arrive as raw UTF-8
        _ => get_or_null(row, idx, |v: PgFallbackString| Value::String(v.0)),
    }
}

//! Parameterized statement construction for dynamically named tables
//!
//! Identifiers are validated and double-quoted; values always travel as bound
//! parameters. The placeholder style follows the driver: `$1, $2, ...` for
//! PostgreSQL and `?` for everything else.

use tabula_core::{Value, validate_identifier};

use crate::ValueMap;
use crate::error::{ServiceError, ServiceResult};

/// How bound parameters are written into SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ...
    Numbered,
    /// `?`
    Positional,
}

impl PlaceholderStyle {
    pub fn for_driver(driver_name: &str) -> Self {
        match driver_name {
            "postgres" | "postgresql" => PlaceholderStyle::Numbered,
            _ => PlaceholderStyle::Positional,
        }
    }

    fn render(self, index: usize) -> String {
        match self {
            PlaceholderStyle::Numbered => format!("${}", index),
            PlaceholderStyle::Positional => "?".to_string(),
        }
    }
}

/// A statement and the values to bind to it, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds INSERT/UPDATE/DELETE/SELECT statements for one driver and schema
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    style: PlaceholderStyle,
    schema: Option<String>,
}

impl QueryBuilder {
    pub fn for_driver(driver_name: &str) -> Self {
        Self {
            style: PlaceholderStyle::for_driver(driver_name),
            schema: None,
        }
    }

    /// Qualify every table reference with `schema`
    pub fn with_schema(mut self, schema: Option<&str>) -> Self {
        self.schema = schema.map(str::to_string);
        self
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    fn quote(name: &str) -> ServiceResult<String> {
        let name = validate_identifier(name)?;
        Ok(format!("\"{}\"", name))
    }

    fn table_ref(&self, table: &str) -> ServiceResult<String> {
        let table = Self::quote(table)?;
        match &self.schema {
            Some(schema) => Ok(format!("{}.{}", Self::quote(schema)?, table)),
            None => Ok(table),
        }
    }

    /// Render `k = $n AND ...` into `sql`, using `IS NULL` (and no parameter)
    /// for null key values.
    ///
    /// PostgreSQL has no `=` for `json`, so JSON values compare as `jsonb`.
    /// Types with no equality operator at all (`xml`, `point`, ...) cannot be
    /// matched and the statement fails.
    fn push_conditions(
        &self,
        sql: &mut String,
        keys: &ValueMap,
        params: &mut Vec<Value>,
    ) -> ServiceResult<()> {
        let mut conditions = Vec::with_capacity(keys.len());
        for (column, value) in keys {
            let column = Self::quote(column)?;
            if value.is_null() {
                conditions.push(format!("{} IS NULL", column));
            } else {
                params.push(value.clone());
                let placeholder = self.style.render(params.len());
                match (self.style, value) {
                    (PlaceholderStyle::Numbered, Value::Json(_)) => conditions
                        .push(format!("{}::jsonb = {}::jsonb", column, placeholder)),
                    _ => conditions.push(format!("{} = {}", column, placeholder)),
                }
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
        Ok(())
    }

    pub fn insert(&self, table: &str, values: &ValueMap) -> ServiceResult<BuiltQuery> {
        let table = self.table_ref(table)?;
        if values.is_empty() {
            return Err(ServiceError::NoValues("INSERT"));
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(Self::quote(column)?);
            params.push(value.clone());
            placeholders.push(self.style.render(params.len()));
        }

        Ok(BuiltQuery {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }

    pub fn update(&self, table: &str, set: &ValueMap, keys: &ValueMap) -> ServiceResult<BuiltQuery> {
        let table = self.table_ref(table)?;
        if set.is_empty() {
            return Err(ServiceError::NoValues("UPDATE"));
        }
        if keys.is_empty() {
            return Err(ServiceError::UnboundedStatement("UPDATE"));
        }

        let mut params = Vec::with_capacity(set.len() + keys.len());
        let mut assignments = Vec::with_capacity(set.len());
        for (column, value) in set {
            let column = Self::quote(column)?;
            params.push(value.clone());
            assignments.push(format!("{} = {}", column, self.style.render(params.len())));
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        self.push_conditions(&mut sql, keys, &mut params)?;
        Ok(BuiltQuery { sql, params })
    }

    pub fn delete(&self, table: &str, keys: &ValueMap) -> ServiceResult<BuiltQuery> {
        let table = self.table_ref(table)?;
        if keys.is_empty() {
            return Err(ServiceError::UnboundedStatement("DELETE"));
        }

        let mut params = Vec::with_capacity(keys.len());
        let mut sql = format!("DELETE FROM {}", table);
        self.push_conditions(&mut sql, keys, &mut params)?;
        Ok(BuiltQuery { sql, params })
    }

    pub fn select_all(&self, table: &str, limit: usize) -> ServiceResult<BuiltQuery> {
        Ok(BuiltQuery {
            sql: format!("SELECT * FROM {} LIMIT {}", self.table_ref(table)?, limit),
            params: Vec::new(),
        })
    }

    pub fn count(&self, table: &str) -> ServiceResult<BuiltQuery> {
        Ok(BuiltQuery {
            sql: format!("SELECT COUNT(*) FROM {}", self.table_ref(table)?),
            params: Vec::new(),
        })
    }
}

//! Core Database Driver Traits
//!
//! The migration engine never talks to a database directly. Everything it
//! needs (statement execution, table existence checks, foreign-key check
//! toggling and the table-query operations behind the history store) goes
//! through [`DatabaseDriver`].

use std::collections::HashMap;

use async_trait::async_trait;

use super::dialect::SqlDialect;
use crate::error::{MigrationError, MigrationResult};
use crate::query::TableQuery;

/// Abstract database driver consumed by Forge and the migration runner
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// SQL dialect spoken by this driver
    fn dialect(&self) -> SqlDialect;

    /// Connection-level settings (table prefix, charset, collation)
    fn settings(&self) -> &ConnectionSettings;

    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64>;

    /// Check whether an (unprefixed) table exists
    async fn table_exists(&self, table: &str) -> MigrationResult<bool>;

    /// Check whether a database exists
    async fn database_exists(&self, name: &str) -> MigrationResult<bool>;

    /// Run a table query and return the matching rows
    async fn select(&self, query: &TableQuery) -> MigrationResult<Vec<Row>>;

    /// Insert one row into an (unprefixed) table
    async fn insert(&self, table: &str, values: &[(&str, DatabaseValue)]) -> MigrationResult<u64>;

    /// Delete the rows matched by a table query
    async fn delete(&self, query: &TableQuery) -> MigrationResult<u64>;

    /// Remove every row from an (unprefixed) table
    async fn truncate(&self, table: &str) -> MigrationResult<()>;

    /// Disable foreign-key constraint checking for this connection
    async fn disable_foreign_key_checks(&self) -> MigrationResult<()> {
        match self.dialect().foreign_key_checks_off() {
            Some(sql) => self.execute(sql, &[]).await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Re-enable foreign-key constraint checking for this connection
    async fn enable_foreign_key_checks(&self) -> MigrationResult<()> {
        match self.dialect().foreign_key_checks_on() {
            Some(sql) => self.execute(sql, &[]).await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Apply the configured table prefix to a table name
    fn prefixed(&self, table: &str) -> String {
        format!("{}{}", self.settings().prefix, table)
    }
}

/// Connection configuration surface consumed by Forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub prefix: String,
    pub charset: String,
    pub collation: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_general_ci".to_string(),
        }
    }
}

impl ConnectionSettings {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Integer view of the value, if it has one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// String view of the value, if it has one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int32(i) => write!(f, "{}", i),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: HashMap<String, DatabaseValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: DatabaseValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns.get(column)
    }

    /// Get a column as a string, failing if missing or of another type
    pub fn get_string(&self, column: &str) -> MigrationResult<String> {
        match self.columns.get(column) {
            Some(DatabaseValue::String(s)) => Ok(s.clone()),
            Some(DatabaseValue::Null) | None => Err(MigrationError::Database(format!(
                "column '{}' missing from row",
                column
            ))),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Get a column as an integer, failing if missing or not numeric
    pub fn get_i64(&self, column: &str) -> MigrationResult<i64> {
        self.columns
            .get(column)
            .and_then(DatabaseValue::as_i64)
            .ok_or_else(|| {
                MigrationError::Database(format!("column '{}' is not an integer", column))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new()
            .with("id", 7i64)
            .with("version", "2023-01-01-000001")
            .with("batch", 2i32);

        assert_eq!(row.get_i64("id").unwrap(), 7);
        assert_eq!(row.get_i64("batch").unwrap(), 2);
        assert_eq!(row.get_string("version").unwrap(), "2023-01-01-000001");
        assert!(row.get_string("class").is_err());
    }

    #[test]
    fn test_option_conversion() {
        assert!(DatabaseValue::from(None::<i32>).is_null());
        assert_eq!(DatabaseValue::from(Some("x")), DatabaseValue::String("x".into()));
    }
}

//! PostgreSQL Driver Implementation
//!
//! Implements [`DatabaseDriver`] on top of a single sqlx `PgConnection`.
//! A dedicated connection (rather than a pool) keeps session-level
//! statements such as `SET CONSTRAINTS` on the same session as the DDL
//! they guard.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::{Column, Connection, Postgres, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;
use tracing::debug;

use super::core::{ConnectionSettings, DatabaseDriver, DatabaseValue, Row};
use super::dialect::SqlDialect;
use crate::error::{MigrationError, MigrationResult};
use crate::query::{self, TableQuery};

/// PostgreSQL driver over one dedicated connection
pub struct PostgresDriver {
    conn: Mutex<PgConnection>,
    settings: ConnectionSettings,
}

impl PostgresDriver {
    /// Connect to the database at `database_url`
    pub async fn connect(database_url: &str) -> MigrationResult<Self> {
        Self::connect_with(database_url, ConnectionSettings::default()).await
    }

    /// Connect with explicit connection settings
    pub async fn connect_with(
        database_url: &str,
        settings: ConnectionSettings,
    ) -> MigrationResult<Self> {
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(MigrationError::Configuration(
                "Invalid PostgreSQL URL scheme".to_string(),
            ));
        }

        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            settings,
        })
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<Vec<Row>> {
        debug!(sql, "fetch");
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let mut conn = self.conn.lock().await;
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| MigrationError::Database(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(row_to_map).collect()
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        debug!(sql, "execute");
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_database_value(query, param);
        }

        let mut conn = self.conn.lock().await;
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrationError::Database(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn table_exists(&self, table: &str) -> MigrationResult<bool> {
        let rows = self
            .fetch_all(
                "SELECT 1 AS found FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[DatabaseValue::String(self.prefixed(table))],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn database_exists(&self, name: &str) -> MigrationResult<bool> {
        let rows = self
            .fetch_all(
                "SELECT 1 AS found FROM pg_database WHERE datname = $1",
                &[DatabaseValue::String(name.to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn select(&self, query: &TableQuery) -> MigrationResult<Vec<Row>> {
        let (sql, params) = query.to_select_sql(self.dialect(), &self.settings.prefix);
        self.fetch_all(&sql, &params).await
    }

    async fn insert(&self, table: &str, values: &[(&str, DatabaseValue)]) -> MigrationResult<u64> {
        let (sql, params) = query::insert_sql(self.dialect(), &self.prefixed(table), values);
        self.execute(&sql, &params).await
    }

    async fn delete(&self, query: &TableQuery) -> MigrationResult<u64> {
        let (sql, params) = query.to_delete_sql(self.dialect(), &self.settings.prefix);
        self.execute(&sql, &params).await
    }

    async fn truncate(&self, table: &str) -> MigrationResult<()> {
        let sql = query::truncate_sql(self.dialect(), &self.prefixed(table));
        self.execute(&sql, &[]).await.map(|_| ())
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
    }
}

fn row_to_map(row: &PgRow) -> MigrationResult<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(map)
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> MigrationResult<DatabaseValue> {
    let type_name = row.columns()[index].type_info().name();

    let value: DatabaseValue = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(i32::from).into(),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(index)?.into(),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(|e| {
                MigrationError::Database(format!(
                    "Failed to get value as string for unknown type '{}': {}",
                    type_name, e
                ))
            })?
            .into(),
    };
    Ok(value)
}

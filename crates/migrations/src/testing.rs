//! In-memory database driver
//!
//! [`MemoryDriver`] keeps tables and rows in process memory. It records
//! every statement passed to `execute`, follows `CREATE`/`DROP`/`RENAME`
//! statements to know which tables exist, evaluates [`TableQuery`] directly
//! and can be told to fail any statement containing a given substring.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::backends::{ConnectionSettings, DatabaseDriver, DatabaseValue, Row, SqlDialect};
use crate::error::{MigrationError, MigrationResult};
use crate::query::{self, OrderDirection, TableQuery};

#[derive(Debug, Default)]
struct MemoryState {
    executed: Vec<String>,
    tables: BTreeMap<String, Vec<Row>>,
    databases: BTreeSet<String>,
    failures: Vec<String>,
    checks_disabled: usize,
    checks_enabled: usize,
    next_id: i64,
}

/// Database driver holding everything in memory
#[derive(Debug)]
pub struct MemoryDriver {
    dialect: SqlDialect,
    settings: ConnectionSettings,
    state: Mutex<MemoryState>,
}

impl MemoryDriver {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            settings: ConnectionSettings::default(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Pretend an (unprefixed) table already exists
    pub fn add_table(&self, table: &str) {
        let name = self.prefixed(table);
        self.state().tables.entry(name).or_default();
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(&self.prefixed(table))
    }

    /// Pretend a database already exists
    pub fn add_database(&self, name: &str) {
        self.state().databases.insert(name.to_string());
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state().databases.contains(name)
    }

    /// Statements successfully executed so far
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn clear_executed(&self) {
        self.state().executed.clear();
    }

    /// Fail every later statement containing `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.state().failures.push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Rows of an (unprefixed) table in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state()
            .tables
            .get(&self.prefixed(table))
            .cloned()
            .unwrap_or_default()
    }

    /// How many times foreign-key checks were disabled and re-enabled
    pub fn foreign_key_toggles(&self) -> (usize, usize) {
        let state = self.state();
        (state.checks_disabled, state.checks_enabled)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn identifier(&self, token: &str) -> String {
        self.dialect.unescape_identifier(token)
    }

    /// Track the tables and databases a DDL statement touches
    fn apply_ddl(&self, state: &mut MemoryState, sql: &str) {
        if Some(sql) == self.dialect.foreign_key_checks_off() {
            state.checks_disabled += 1;
            return;
        }
        if Some(sql) == self.dialect.foreign_key_checks_on() {
            state.checks_enabled += 1;
            return;
        }

        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let rest = rest.strip_prefix("IF NOT EXISTS ").unwrap_or(rest);
            if let Some(name) = first_token(rest) {
                state.tables.entry(self.identifier(name)).or_default();
            }
        } else if let Some(rest) = sql.strip_prefix("DROP TABLE ") {
            let rest = rest.strip_prefix("IF EXISTS ").unwrap_or(rest);
            if let Some(name) = first_token(rest) {
                state.tables.remove(&self.identifier(name));
            }
        } else if let Some(rest) = sql.strip_prefix("ALTER TABLE ") {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            if let [from, "RENAME", "TO", to] = tokens.as_slice() {
                let from = self.identifier(from);
                let rows = state.tables.remove(&from).unwrap_or_default();
                state.tables.insert(self.identifier(to), rows);
            }
        } else if let Some(rest) = sql.strip_prefix("CREATE DATABASE ") {
            let rest = rest.strip_prefix("IF NOT EXISTS ").unwrap_or(rest);
            if let Some(name) = first_token(rest) {
                state.databases.insert(self.identifier(name));
            }
        } else if let Some(rest) = sql.strip_prefix("DROP DATABASE ") {
            if let Some(name) = first_token(rest) {
                state.databases.remove(&self.identifier(name));
            }
        }
    }

    fn check_failure(state: &MemoryState, sql: &str) -> MigrationResult<()> {
        match state.failures.iter().find(|pattern| sql.contains(pattern.as_str())) {
            Some(pattern) => Err(MigrationError::Database(format!(
                "injected failure for statement containing '{}'",
                pattern
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseDriver for MemoryDriver {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn execute(&self, sql: &str, _params: &[DatabaseValue]) -> MigrationResult<u64> {
        debug!(sql, "memory execute");
        let mut state = self.state();
        Self::check_failure(&state, sql)?;
        self.apply_ddl(&mut state, sql);
        state.executed.push(sql.to_string());
        Ok(0)
    }

    async fn table_exists(&self, table: &str) -> MigrationResult<bool> {
        Ok(self.has_table(table))
    }

    async fn database_exists(&self, name: &str) -> MigrationResult<bool> {
        Ok(self.has_database(name))
    }

    async fn select(&self, query: &TableQuery) -> MigrationResult<Vec<Row>> {
        let state = self.state();
        let rows = table_rows(&state, &self.prefixed(&query.table))?;

        let mut matched: Vec<Row> = rows
            .iter()
            .filter(|row| matches_conditions(row, &query.where_conditions))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            for (column, direction) in &query.order_by {
                let ordering = compare_values(a.get(column), b.get(column));
                let ordering = match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if !query.select_fields.is_empty() {
            matched = matched
                .into_iter()
                .map(|row| {
                    let mut projected = Row::new();
                    for field in &query.select_fields {
                        projected.insert(field.as_str(), row.get(field).cloned().unwrap_or(DatabaseValue::Null));
                    }
                    projected
                })
                .collect();
        }

        if query.distinct {
            let mut unique: Vec<Row> = Vec::new();
            for row in matched {
                if !unique.contains(&row) {
                    unique.push(row);
                }
            }
            matched = unique;
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn insert(&self, table: &str, values: &[(&str, DatabaseValue)]) -> MigrationResult<u64> {
        let table = self.prefixed(table);
        let (sql, _) = query::insert_sql(self.dialect, &table, values);

        let mut state = self.state();
        Self::check_failure(&state, &sql)?;
        if !state.tables.contains_key(&table) {
            return Err(MigrationError::Database(format!("table '{}' does not exist", table)));
        }

        let mut row = Row::new();
        for (column, value) in values {
            row.insert(*column, value.clone());
        }
        if row.get("id").is_none() {
            state.next_id += 1;
            row.insert("id", DatabaseValue::Int64(state.next_id));
        }

        if let Some(rows) = state.tables.get_mut(&table) {
            rows.push(row);
        }
        Ok(1)
    }

    async fn delete(&self, query: &TableQuery) -> MigrationResult<u64> {
        let table = self.prefixed(&query.table);
        let (sql, _) = query.to_delete_sql(self.dialect, &self.settings.prefix);

        let mut state = self.state();
        Self::check_failure(&state, &sql)?;
        let rows = state
            .tables
            .get_mut(&table)
            .ok_or_else(|| MigrationError::Database(format!("table '{}' does not exist", table)))?;

        let before = rows.len();
        rows.retain(|row| !matches_conditions(row, &query.where_conditions));
        Ok((before - rows.len()) as u64)
    }

    async fn truncate(&self, table: &str) -> MigrationResult<()> {
        let table = self.prefixed(table);
        let mut state = self.state();
        let rows = state
            .tables
            .get_mut(&table)
            .ok_or_else(|| MigrationError::Database(format!("table '{}' does not exist", table)))?;
        rows.clear();
        Ok(())
    }
}

fn table_rows<'s>(state: &'s MemoryState, table: &str) -> MigrationResult<&'s Vec<Row>> {
    state
        .tables
        .get(table)
        .ok_or_else(|| MigrationError::Database(format!("table '{}' does not exist", table)))
}

fn first_token(sql: &str) -> Option<&str> {
    sql.split(|c: char| c.is_whitespace() || c == '(')
        .find(|token| !token.is_empty())
}

fn matches_conditions(row: &Row, conditions: &[(String, DatabaseValue)]) -> bool {
    conditions
        .iter()
        .all(|(column, expected)| values_equal(row.get(column), expected))
}

fn values_equal(stored: Option<&DatabaseValue>, expected: &DatabaseValue) -> bool {
    match (stored, expected) {
        (None, DatabaseValue::Null) => true,
        (None, _) => false,
        (Some(stored), expected) if is_integer(stored) && is_integer(expected) => {
            stored.as_i64() == expected.as_i64()
        }
        (Some(stored), expected) => stored == expected,
    }
}

fn compare_values(a: Option<&DatabaseValue>, b: Option<&DatabaseValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if is_integer(a) && is_integer(b) => a.as_i64().cmp(&b.as_i64()),
        (Some(DatabaseValue::Float64(a)), Some(DatabaseValue::Float64(b))) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn is_integer(value: &DatabaseValue) -> bool {
    matches!(value, DatabaseValue::Int32(_) | DatabaseValue::Int64(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracks_tables_through_ddl() {
        let driver = MemoryDriver::new(SqlDialect::MySQL)
            .with_settings(ConnectionSettings::default().with_prefix("app_"));

        driver
            .execute("CREATE TABLE IF NOT EXISTS `app_users` (\n\t`id` INT\n)", &[])
            .await
            .unwrap();
        assert!(driver.has_table("users"));
        assert!(driver.table_exists("users").await.unwrap());

        driver
            .execute("ALTER TABLE `app_users` RENAME TO `app_members`", &[])
            .await
            .unwrap();
        assert!(!driver.has_table("users"));
        assert!(driver.has_table("members"));

        driver.execute("DROP TABLE `app_members`", &[]).await.unwrap();
        assert!(!driver.has_table("members"));
        assert_eq!(driver.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        driver.fail_on("widgets");

        let err = driver.execute("DROP TABLE \"widgets\"", &[]).await.unwrap_err();
        assert!(matches!(err, MigrationError::Database(_)));
        assert!(driver.executed().is_empty());

        driver.clear_failures();
        assert!(driver.execute("DROP TABLE \"widgets\"", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_table_queries() {
        let driver = MemoryDriver::new(SqlDialect::SQLite);
        driver.add_table("migrations");

        for (version, batch) in [("3", 2i64), ("1", 1), ("2", 1)] {
            driver
                .insert("migrations", &[("version", version.into()), ("batch", batch.into())])
                .await
                .unwrap();
        }

        let batches = driver
            .select(
                &TableQuery::table("migrations")
                    .select(&["batch"])
                    .distinct()
                    .order_by("batch", OrderDirection::Desc),
            )
            .await
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].get_i64("batch").unwrap(), 2);

        let first = driver
            .select(&TableQuery::table("migrations").where_eq("batch", 1i32).order_by("id", OrderDirection::Asc).limit(1))
            .await
            .unwrap();
        assert_eq!(first[0].get_string("version").unwrap(), "1");

        let removed = driver
            .delete(&TableQuery::table("migrations").where_eq("batch", 1i64))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(driver.rows("migrations").len(), 1);

        driver.truncate("migrations").await.unwrap();
        assert!(driver.rows("migrations").is_empty());
        assert!(driver.insert("missing", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_counts_foreign_key_toggles() {
        let driver = MemoryDriver::new(SqlDialect::SQLite);
        driver.disable_foreign_key_checks().await.unwrap();
        driver.enable_foreign_key_checks().await.unwrap();
        assert_eq!(driver.foreign_key_toggles(), (1, 1));
    }
}

//! Migration history
//!
//! One row per applied unit, stored in the configured history table. The
//! table is created through Forge the first time it is needed.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::unit::{derive_uid, MigrationUnit};
use crate::backends::{DatabaseDriver, Row};
use crate::error::MigrationResult;
use crate::forge::{Field, Forge};
use crate::query::{OrderDirection, TableQuery};

/// A row of the history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub version: String,
    pub class: String,
    pub group: String,
    pub namespace: String,
    /// Unix seconds
    pub time: i64,
    pub batch: i64,
}

impl HistoryRecord {
    pub fn from_row(row: &Row) -> MigrationResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            version: row.get_string("version")?,
            class: row.get_string("class")?,
            group: row.get_string("group")?,
            namespace: row.get_string("namespace")?,
            time: row.get_i64("time")?,
            batch: row.get_i64("batch")?,
        })
    }

    /// uid of the unit this row records
    pub fn uid(&self) -> String {
        derive_uid(&self.version, &self.class)
    }
}

/// Access to the history table
pub struct HistoryStore {
    db: Arc<dyn DatabaseDriver>,
    table: String,
    checked: bool,
}

impl HistoryStore {
    pub fn new(db: Arc<dyn DatabaseDriver>, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            checked: false,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the history table unless this store already saw it
    pub async fn ensure_table(&mut self) -> MigrationResult<()> {
        if self.checked {
            return Ok(());
        }

        if self.db.table_exists(&self.table).await? {
            self.checked = true;
            return Ok(());
        }

        info!(table = %self.table, "creating migration history table");
        let mut forge = Forge::new(self.db.as_ref());
        forge
            .add_fields(vec![
                ("id", Field::new("BIGINT").constraint(20).unsigned().auto_increment()),
                ("version", Field::new("VARCHAR").constraint(255).nullable(false)),
                ("class", Field::new("VARCHAR").constraint(255).nullable(false)),
                ("group", Field::new("VARCHAR").constraint(255).nullable(false)),
                ("namespace", Field::new("VARCHAR").constraint(255).nullable(false)),
                ("time", Field::new("INT").constraint(11).nullable(false)),
                ("batch", Field::new("INT").constraint(11).unsigned().nullable(false)),
            ])?
            .add_primary_key(&["id"]);
        forge.create_table(&self.table, true, &[]).await?;

        self.checked = true;
        Ok(())
    }

    /// History rows in insertion order; an empty group matches every group
    pub async fn get_history(&mut self, group: &str, namespace: Option<&str>) -> MigrationResult<Vec<HistoryRecord>> {
        self.ensure_table().await?;

        let mut query = TableQuery::table(&self.table);
        if !group.is_empty() {
            query = query.where_eq("group", group);
        }
        if let Some(namespace) = namespace {
            query = query.where_eq("namespace", namespace);
        }
        self.fetch(query.order_by("id", OrderDirection::Asc)).await
    }

    /// Distinct batch numbers, ascending
    pub async fn get_batches(&mut self) -> MigrationResult<Vec<i64>> {
        self.ensure_table().await?;

        let query = TableQuery::table(&self.table)
            .select(&["batch"])
            .distinct()
            .order_by("batch", OrderDirection::Asc);
        let rows = self.db.select(&query).await?;
        rows.iter().map(|row| row.get_i64("batch")).collect()
    }

    /// Highest batch number, `0` when nothing ran yet
    pub async fn get_last_batch(&mut self) -> MigrationResult<i64> {
        Ok(self.get_batches().await?.last().copied().unwrap_or(0))
    }

    pub async fn get_batch_history(&mut self, batch: i64, order: OrderDirection) -> MigrationResult<Vec<HistoryRecord>> {
        self.ensure_table().await?;

        let query = TableQuery::table(&self.table)
            .where_eq("batch", batch)
            .order_by("id", order);
        self.fetch(query).await
    }

    /// Version of the first unit in a batch; a negative batch means the last one
    pub async fn get_batch_start(&mut self, batch: i64) -> MigrationResult<String> {
        self.batch_edge(batch, OrderDirection::Asc).await
    }

    /// Version of the last unit in a batch; a negative batch means the last one
    pub async fn get_batch_end(&mut self, batch: i64) -> MigrationResult<String> {
        self.batch_edge(batch, OrderDirection::Desc).await
    }

    async fn batch_edge(&mut self, batch: i64, order: OrderDirection) -> MigrationResult<String> {
        self.ensure_table().await?;
        let batch = if batch < 0 { self.get_last_batch().await? } else { batch };

        let query = TableQuery::table(&self.table)
            .where_eq("batch", batch)
            .order_by("id", order)
            .limit(1);
        Ok(self
            .fetch(query)
            .await?
            .into_iter()
            .next()
            .map(|record| record.version)
            .unwrap_or_else(|| "0".to_string()))
    }

    /// Record a successfully applied unit
    pub async fn add(&mut self, unit: &MigrationUnit, group: &str, batch: i64) -> MigrationResult<()> {
        self.ensure_table().await?;

        self.db
            .insert(
                &self.table,
                &[
                    ("version", unit.version.as_str().into()),
                    ("class", unit.class.as_str().into()),
                    ("group", group.into()),
                    ("namespace", unit.namespace.as_str().into()),
                    ("time", Utc::now().timestamp().into()),
                    ("batch", batch.into()),
                ],
            )
            .await?;
        info!(uid = %unit.uid, group, batch, "recorded migration");
        Ok(())
    }

    /// Remove the row of a reverted unit
    pub async fn remove(&mut self, record: &HistoryRecord) -> MigrationResult<()> {
        self.ensure_table().await?;

        let query = TableQuery::table(&self.table).where_eq("id", record.id);
        self.db.delete(&query).await?;
        info!(uid = %record.uid(), batch = record.batch, "removed migration record");
        Ok(())
    }

    /// Empty the history table if it exists
    pub async fn clear(&mut self) -> MigrationResult<()> {
        if self.db.table_exists(&self.table).await? {
            info!(table = %self.table, "clearing migration history");
            self.db.truncate(&self.table).await?;
        }
        Ok(())
    }

    async fn fetch(&self, query: TableQuery) -> MigrationResult<Vec<HistoryRecord>> {
        debug!(table = %query.table, "history query");
        let rows = self.db.select(&query).await?;
        rows.iter().map(HistoryRecord::from_row).collect()
    }
}

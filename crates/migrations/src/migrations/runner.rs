//! Migration Runner - Applies and reverts migration units
//!
//! `latest` applies every pending unit as one new batch, `regress` walks
//! batches back down to a target and `force` toggles a single unit. The
//! history table is the only record of what ran; rows are added and removed
//! one unit at a time so that a failure part-way through leaves history
//! matching the schema.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::discovery::MigrationLocator;
use super::events::{MigrationEvent, MigrationObserver, RunnerState, TracingObserver};
use super::history::{HistoryRecord, HistoryStore};
use super::unit::{Direction, FileNamePattern, MigrationUnit, TESTS_GROUP};
use crate::backends::DatabaseDriver;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::forge::Forge;
use crate::query::OrderDirection;

/// Result of executing one unit
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    /// The unit ran; carries the group it ran against
    Ran(String),
    /// The group filter excluded the unit
    Skipped,
}

/// A discovered unit paired with its history row, if applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub unit: MigrationUnit,
    pub record: Option<HistoryRecord>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.record.is_some()
    }
}

/// Migration runner over one database driver
pub struct MigrationRunner {
    config: MigrationConfig,
    db: Arc<dyn DatabaseDriver>,
    locator: Arc<dyn MigrationLocator>,
    history: HistoryStore,
    file_pattern: FileNamePattern,
    namespace: Option<String>,
    group: Option<String>,
    silent: bool,
    batch: i64,
    messages: Vec<String>,
    observers: Vec<Arc<dyn MigrationObserver>>,
}

impl MigrationRunner {
    /// Create a runner; strict unless `config.strict` is off
    pub fn new(
        config: MigrationConfig,
        db: Arc<dyn DatabaseDriver>,
        locator: Arc<dyn MigrationLocator>,
    ) -> MigrationResult<Self> {
        config.validate()?;

        Ok(Self {
            history: HistoryStore::new(db.clone(), config.table.clone()),
            file_pattern: FileNamePattern::new()?,
            silent: !config.strict,
            config,
            db,
            locator,
            namespace: None,
            group: None,
            batch: 0,
            messages: Vec::new(),
            observers: vec![Arc::new(TracingObserver)],
        })
    }

    /// Register an additional lifecycle observer
    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Restrict discovery to one namespace, or `None` for all of them
    pub fn set_namespace(&mut self, namespace: Option<&str>) -> &mut Self {
        self.namespace = namespace.map(str::to_string);
        self
    }

    /// Only apply units belonging to `group`
    pub fn set_group(&mut self, group: Option<&str>) -> &mut Self {
        self.group = group.map(str::to_string);
        self
    }

    /// Record failures as messages instead of returning errors
    pub fn set_silent(&mut self, silent: bool) -> &mut Self {
        self.silent = silent;
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Diagnostic messages accumulated so far
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Apply every pending unit as a new batch
    pub async fn latest(&mut self, group: Option<&str>) -> MigrationResult<bool> {
        self.ensure_enabled()?;
        self.history.ensure_table().await?;

        if let Some(group) = group {
            self.group = Some(group.to_string());
        }

        let mut pending = match self.find_migrations() {
            Ok(units) => units,
            Err(e) => return self.report(e),
        };
        if pending.is_empty() {
            return Ok(true);
        }

        let applied: HashSet<String> = self
            .history
            .get_history(group.unwrap_or(""), self.namespace.as_deref())
            .await?
            .iter()
            .map(HistoryRecord::uid)
            .collect();
        pending.retain(|unit| !applied.contains(&unit.uid));
        if pending.is_empty() {
            debug!("nothing to migrate");
            return Ok(true);
        }

        let previous_batch = self.history.get_last_batch().await?;
        self.batch = previous_batch + 1;

        for unit in &pending {
            let failure = match self.migrate(Direction::Up, unit).await {
                Ok(Outcome::Ran(group)) => match self.add_history(unit, &group).await {
                    Ok(()) => None,
                    Err(err) => {
                        // applied but unrecorded: undo it here, the batch rollback cannot see it
                        if let Err(revert) = self.migrate(Direction::Down, unit).await {
                            warn!(uid = %unit.uid, error = %revert, "could not revert unrecorded migration");
                            self.messages.push(revert.to_string());
                        }
                        Some(err)
                    }
                },
                Ok(Outcome::Skipped) => {
                    debug!(uid = %unit.uid, "skipped by group filter");
                    None
                }
                Err(err) => Some(err),
            };

            if let Some(err) = failure {
                warn!(uid = %unit.uid, error = %err, "migration failed, rolling back batch");
                self.compensate(previous_batch).await;
                return self.report(err);
            }
        }

        self.notify("latest").await;
        Ok(true)
    }

    /// Revert batches down to `target_batch`.
    ///
    /// `0` reverts everything, a negative value counts batches back from the
    /// last one and a positive value keeps that batch and everything before it.
    pub async fn regress(&mut self, target_batch: i64, group: Option<&str>) -> MigrationResult<bool> {
        self.ensure_enabled()?;

        if let Some(group) = group {
            self.group = Some(group.to_string());
        }

        self.rollback(target_batch, true).await
    }

    /// Apply one unit if it has no history row, otherwise revert it
    pub async fn force(&mut self, path: &Path, namespace: &str, group: Option<&str>) -> MigrationResult<bool> {
        self.ensure_enabled()?;
        self.history.ensure_table().await?;

        if let Some(group) = group {
            self.group = Some(group.to_string());
        }

        let unit = match self.migration_from_file(path, namespace) {
            Some(unit) => unit,
            None => return self.report(MigrationError::NotFound(path.display().to_string())),
        };
        self.namespace = Some(namespace.to_string());

        let record = self
            .history
            .get_history("", Some(namespace))
            .await?
            .into_iter()
            .find(|record| record.uid() == unit.uid);

        match record {
            Some(record) => match self.migrate(Direction::Down, &unit).await {
                Ok(Outcome::Ran(_)) => {
                    self.remove_history(&record).await?;
                    Ok(true)
                }
                Ok(Outcome::Skipped) => self.report(skipped_by_filter(&unit)),
                Err(err) => self.report(err),
            },
            None => {
                self.batch = self.history.get_last_batch().await? + 1;
                match self.migrate(Direction::Up, &unit).await {
                    Ok(Outcome::Ran(group)) => {
                        self.add_history(&unit, &group).await?;
                        Ok(true)
                    }
                    Ok(Outcome::Skipped) => self.report(skipped_by_filter(&unit)),
                    Err(err) => self.report(err),
                }
            }
        }
    }

    /// Every discovered unit with its history row, if applied
    pub async fn status(&mut self) -> MigrationResult<Vec<MigrationStatus>> {
        let units = self.find_migrations()?;
        let mut records: HashMap<String, HistoryRecord> = self
            .history
            .get_history("", self.namespace.as_deref())
            .await?
            .into_iter()
            .map(|record| (record.uid(), record))
            .collect();

        Ok(units
            .into_iter()
            .map(|unit| MigrationStatus {
                record: records.remove(&unit.uid),
                unit,
            })
            .collect())
    }

    /// Units under the active namespace, or every namespace, ordered by uid
    pub fn find_migrations(&self) -> MigrationResult<Vec<MigrationUnit>> {
        let namespaces = match &self.namespace {
            Some(namespace) => vec![namespace.clone()],
            None => self.locator.namespaces(),
        };

        let mut found = BTreeMap::new();
        for namespace in namespaces {
            for unit in self.find_namespace_migrations(&namespace)? {
                insert_unique(&mut found, unit)?;
            }
        }
        Ok(found.into_values().collect())
    }

    /// Units of a single namespace, ordered by uid
    pub fn find_namespace_migrations(&self, namespace: &str) -> MigrationResult<Vec<MigrationUnit>> {
        let mut found = BTreeMap::new();
        for path in self.locator.list_files(namespace) {
            if let Some(unit) = self.migration_from_file(&path, namespace) {
                insert_unique(&mut found, unit)?;
            }
        }
        Ok(found.into_values().collect())
    }

    /// Describe the unit at `path`, `None` if it is not a migration
    pub fn migration_from_file(&self, path: &Path, namespace: &str) -> Option<MigrationUnit> {
        let (version, name) = self.file_pattern.parse(path)?;
        let class = self.locator.class_name(path)?;
        Some(MigrationUnit::new(version, name, namespace, path, class))
    }

    /// History rows of the active namespace; an empty group matches all groups
    pub async fn get_history(&mut self, group: &str) -> MigrationResult<Vec<HistoryRecord>> {
        self.history.get_history(group, self.namespace.as_deref()).await
    }

    pub async fn get_batches(&mut self) -> MigrationResult<Vec<i64>> {
        self.history.get_batches().await
    }

    pub async fn get_last_batch(&mut self) -> MigrationResult<i64> {
        self.history.get_last_batch().await
    }

    pub async fn get_batch_history(&mut self, batch: i64, order: OrderDirection) -> MigrationResult<Vec<HistoryRecord>> {
        self.history.get_batch_history(batch, order).await
    }

    pub async fn get_batch_start(&mut self, batch: i64) -> MigrationResult<String> {
        self.history.get_batch_start(batch).await
    }

    pub async fn get_batch_end(&mut self, batch: i64) -> MigrationResult<String> {
        self.history.get_batch_end(batch).await
    }

    pub async fn clear_history(&mut self) -> MigrationResult<()> {
        self.history.clear().await
    }

    /// Shared body of `regress` and the compensating rollback of `latest`
    async fn rollback(&mut self, target_batch: i64, notify: bool) -> MigrationResult<bool> {
        let batches = self.history.get_batches().await?;
        let target = resolve_target(&batches, target_batch);

        if batches.is_empty() && target == 0 {
            return Ok(true);
        }
        if target != 0 && !batches.contains(&target) {
            return self.report(MigrationError::BatchNotFound(target));
        }

        let saved_namespace = self.namespace.take();
        let result = self.regress_batches(batches, target).await;
        self.namespace = saved_namespace;

        match result {
            Ok(()) => {
                if notify {
                    self.notify("regress").await;
                }
                Ok(true)
            }
            Err(err) => self.report(err),
        }
    }

    async fn regress_batches(&mut self, mut batches: Vec<i64>, target: i64) -> MigrationResult<()> {
        let discovered: HashMap<String, MigrationUnit> = self
            .find_migrations()?
            .into_iter()
            .map(|unit| (unit.uid.clone(), unit))
            .collect();

        let mut plan = Vec::new();
        while let Some(batch) = batches.pop() {
            if batch <= target {
                break;
            }
            for record in self.history.get_batch_history(batch, OrderDirection::Desc).await? {
                match discovered.get(&record.uid()) {
                    Some(unit) => plan.push((unit.clone(), record)),
                    None => return Err(MigrationError::MigrationGap(record.version)),
                }
            }
        }

        for (unit, record) in plan {
            match self.migrate(Direction::Down, &unit).await? {
                Outcome::Ran(_) => self.remove_history(&record).await?,
                Outcome::Skipped => debug!(uid = %unit.uid, "revert skipped, keeping history row"),
            }
        }
        Ok(())
    }

    /// Undo the units recorded since `previous_batch`; publishes no event
    async fn compensate(&mut self, previous_batch: i64) {
        match self.rollback(previous_batch, false).await {
            Ok(true) => {}
            Ok(false) => warn!("compensating rollback reported failure"),
            Err(e) => {
                warn!(error = %e, "compensating rollback failed");
                self.messages.push(e.to_string());
            }
        }
    }

    async fn migrate(&self, direction: Direction, unit: &MigrationUnit) -> MigrationResult<Outcome> {
        let migration = self
            .locator
            .instantiate(&unit.class)
            .ok_or_else(|| MigrationError::ClassNotFound(unit.class.clone()))?;

        let group = migration
            .group()
            .unwrap_or(&self.config.default_group)
            .to_string();

        if group == TESTS_GROUP
            && !self.config.environment.is_testing()
            && self.group.as_deref() != Some(TESTS_GROUP)
        {
            return Ok(Outcome::Skipped);
        }

        if direction == Direction::Up {
            if let Some(filter) = &self.group {
                if *filter != group {
                    return Ok(Outcome::Skipped);
                }
            }
        }

        let mut forge = Forge::new(self.db.as_ref());
        let result = match direction {
            Direction::Up => migration.up(&mut forge).await,
            Direction::Down => migration.down(&mut forge).await,
        };

        match result {
            Ok(()) => {
                info!(uid = %unit.uid, %direction, group = %group, "migrated");
                Ok(Outcome::Ran(group))
            }
            Err(err @ MigrationError::MissingDirection(_)) => Err(err),
            Err(err) => Err(MigrationError::failed(unit.uid.clone(), err)),
        }
    }

    async fn add_history(&mut self, unit: &MigrationUnit, group: &str) -> MigrationResult<()> {
        self.history.add(unit, group, self.batch).await?;
        self.messages.push(format!(
            "Running: ({}) {}_{}",
            unit.namespace, unit.version, unit.class
        ));
        Ok(())
    }

    async fn remove_history(&mut self, record: &HistoryRecord) -> MigrationResult<()> {
        self.history.remove(record).await?;
        self.messages.push(format!(
            "Rolling back: ({}) {}_{}",
            record.namespace, record.version, record.class
        ));
        Ok(())
    }

    async fn notify(&self, method: &str) {
        let event = MigrationEvent {
            method: method.to_string(),
            state: self.state(),
        };
        for observer in &self.observers {
            observer.migrate(&event).await;
        }
    }

    fn state(&self) -> RunnerState {
        RunnerState {
            namespace: self.namespace.clone(),
            group: self.group.clone(),
            default_group: self.config.default_group.clone(),
            table: self.history.table().to_string(),
            batch: self.batch,
            silent: self.silent,
            environment: self.config.environment,
            messages: self.messages.clone(),
        }
    }

    fn ensure_enabled(&self) -> MigrationResult<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(MigrationError::Disabled)
        }
    }

    fn report(&mut self, err: MigrationError) -> MigrationResult<bool> {
        if !self.silent {
            return Err(err);
        }
        warn!(error = %err, "migration error recorded");
        self.messages.push(err.to_string());
        Ok(false)
    }
}

fn insert_unique(found: &mut BTreeMap<String, MigrationUnit>, unit: MigrationUnit) -> MigrationResult<()> {
    if let Some(existing) = found.get(&unit.uid) {
        return Err(MigrationError::DuplicateUid {
            uid: unit.uid.clone(),
            first: existing.path.display().to_string(),
            second: unit.path.display().to_string(),
        });
    }
    found.insert(unit.uid.clone(), unit);
    Ok(())
}

/// Turn a regress target into a concrete batch number, `0` meaning everything.
///
/// Negative targets count back from the last batch; counting past the first
/// batch resolves to `0`.
fn resolve_target(batches: &[i64], target_batch: i64) -> i64 {
    if target_batch >= 0 {
        return target_batch;
    }

    usize::try_from(target_batch.unsigned_abs())
        .ok()
        .and_then(|back| back.checked_add(1))
        .and_then(|back| batches.len().checked_sub(back))
        .and_then(|index| batches.get(index).copied())
        .unwrap_or(0)
}

fn skipped_by_filter(unit: &MigrationUnit) -> MigrationError {
    MigrationError::failed(unit.uid.clone(), "excluded by the active group filter")
}

//! Migration engine
//!
//! Discovery, history bookkeeping and the runner that applies and reverts
//! units in batches.

pub mod discovery;
pub mod events;
pub mod history;
pub mod runner;
pub mod unit;

pub use discovery::{MigrationFactory, MigrationLocator, MigrationRegistry};
pub use events::{MigrationEvent, MigrationObserver, RunnerState, TracingObserver};
pub use history::{HistoryRecord, HistoryStore};
pub use runner::{MigrationRunner, MigrationStatus};
pub use unit::{derive_uid, Direction, FileNamePattern, Migration, MigrationUnit, TESTS_GROUP};

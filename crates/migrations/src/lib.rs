//! # elif-migrations: Schema migrations for elif.rs
//!
//! Versioned migration units applied and reverted in batches, a history
//! table recording what ran, and Forge, a builder that renders portable
//! table definitions into dialect-specific DDL.
//!
//! ```ignore
//! let mut registry = MigrationRegistry::new();
//! registry.register("App", "2023-01-01-000001_create_users.rs", "CreateUsers", || CreateUsers);
//!
//! let driver = Arc::new(PostgresDriver::connect(&url).await?);
//! let mut runner = MigrationRunner::new(MigrationConfig::from_env()?, driver, Arc::new(registry))?;
//! runner.latest(None).await?;
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod forge;
pub mod migrations;
pub mod query;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export core traits and types
pub use backends::{
    ConnectionSettings, DatabaseDriver, DatabaseValue, PostgresDriver, Row, SqlDialect, UnsignedMapping,
    UnsignedSupport,
};
pub use config::*;
pub use error::*;
pub use forge::*;
pub use migrations::*;
pub use query::{OrderDirection, TableQuery};
#[cfg(any(test, feature = "testing"))]
pub use testing::MemoryDriver;

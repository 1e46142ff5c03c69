//! Database Driver Abstractions
//!
//! The driver trait the migration engine executes through, the SQL dialects
//! Forge renders for, and the PostgreSQL driver built on sqlx.

pub mod core;
pub mod dialect;
pub mod postgres;

pub use self::core::*;
pub use dialect::{SqlDialect, UnsignedMapping, UnsignedSupport};
pub use postgres::PostgresDriver;

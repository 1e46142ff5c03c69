//! Migration units
//!
//! A [`Migration`] is the executable logic of one schema change; a
//! [`MigrationUnit`] is the descriptor discovery produces for it: where it
//! came from, its version and the uid used to order it and to match it to
//! a history row.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;

use crate::error::{MigrationError, MigrationResult};
use crate::forge::Forge;

/// Group reserved for test fixtures; units in it only run under `Testing`
pub const TESTS_GROUP: &str = "tests";

/// Executable logic of a migration unit
#[async_trait]
pub trait Migration: Send + Sync {
    /// Logical database group, `None` for the configured default
    fn group(&self) -> Option<&str> {
        None
    }

    /// Apply the change
    async fn up(&self, _forge: &mut Forge<'_>) -> MigrationResult<()> {
        Err(MigrationError::MissingDirection(Direction::Up.to_string()))
    }

    /// Revert the change
    async fn down(&self, _forge: &mut Forge<'_>) -> MigrationResult<()> {
        Err(MigrationError::MissingDirection(Direction::Down.to_string()))
    }
}

/// Direction a unit is executed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Descriptor of a discovered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationUnit {
    /// Timestamp prefix of the file name, e.g. `2023-01-01-000001`
    pub version: String,
    /// Descriptive suffix of the file name
    pub name: String,
    pub namespace: String,
    pub path: PathBuf,
    /// Implementation identifier the locator instantiates
    pub class: String,
    /// Digits of `version` followed by `class`
    pub uid: String,
}

impl MigrationUnit {
    pub fn new(
        version: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        path: impl Into<PathBuf>,
        class: impl Into<String>,
    ) -> Self {
        let version = version.into();
        let class = class.into();
        let uid = derive_uid(&version, &class);
        Self {
            version,
            name: name.into(),
            namespace: namespace.into(),
            path: path.into(),
            class,
            uid,
        }
    }
}

/// Build the uid matching a unit to its history row
pub fn derive_uid(version: &str, class: &str) -> String {
    let digits: String = version.chars().filter(char::is_ascii_digit).collect();
    format!("{}{}", digits, class)
}

/// Matcher for `YYYY[-_]MM[-_]DD[-_]HHMMSS_Name` file names
#[derive(Debug, Clone)]
pub struct FileNamePattern {
    regex: Regex,
}

impl FileNamePattern {
    pub fn new() -> MigrationResult<Self> {
        let regex = Regex::new(r"\A(\d{4}[_-]?\d{2}[_-]?\d{2}[_-]?\d{6})_(\w+)\z").map_err(|e| {
            MigrationError::Configuration(format!("Invalid migration file pattern: {}", e))
        })?;
        Ok(Self { regex })
    }

    /// Split a file path into `(version, name)`, ignoring its extension
    pub fn parse(&self, path: &Path) -> Option<(String, String)> {
        let stem = path.file_stem()?.to_str()?;
        let captures = self.regex.captures(stem)?;
        Some((captures[1].to_string(), captures[2].to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_uses_version_digits() {
        assert_eq!(derive_uid("2023-01-01-000001", "Foo"), "20230101000001Foo");
        assert_eq!(derive_uid("20230101_000002", "Bar"), "20230101000002Bar");

        let unit = MigrationUnit::new("2023-01-02-000001", "add_baz", "App", "a.rs", "Baz");
        assert_eq!(unit.uid, "20230102000001Baz");
    }

    #[test]
    fn test_file_name_pattern() {
        let pattern = FileNamePattern::new().unwrap();

        assert_eq!(
            pattern.parse(Path::new("migrations/2023-01-01-000001_create_users.rs")),
            Some(("2023-01-01-000001".to_string(), "create_users".to_string()))
        );
        assert_eq!(
            pattern.parse(Path::new("20230101000001_CreateUsers")),
            Some(("20230101000001".to_string(), "CreateUsers".to_string()))
        );
        assert_eq!(pattern.parse(Path::new("create_users.rs")), None);
        assert_eq!(pattern.parse(Path::new("2023-01-01_create_users.rs")), None);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Up.to_string(), "up");
        assert_eq!(Direction::Down.to_string(), "down");
    }
}

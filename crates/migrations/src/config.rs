//! Migration configuration
//!
//! Values consumed when a [`crate::MigrationRunner`] is constructed: whether
//! migrations are enabled, the history table name and the default logical
//! group assigned to units that do not declare one.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{MigrationError, MigrationResult};

/// Runtime environment the runner is operating in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(MigrationError::Configuration(format!(
                "invalid environment '{}', expected development, testing, or production",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    /// Check if environment is testing
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }
}

/// Configuration for the migration runner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Migrations refuse to run unless enabled
    pub enabled: bool,
    /// Name of the history table (unprefixed)
    pub table: String,
    /// Group recorded for units that do not declare their own
    pub default_group: String,
    /// Environment; units in the `tests` group only run under `Testing`
    pub environment: Environment,
    /// Strict mode raises errors, silent mode records them as messages
    pub strict: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table: "migrations".to_string(),
            default_group: "default".to_string(),
            environment: Environment::Development,
            strict: true,
        }
    }
}

impl MigrationConfig {
    /// Configuration used by test suites
    pub fn testing() -> Self {
        Self {
            environment: Environment::Testing,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> MigrationResult<Self> {
        let defaults = Self::default();

        let enabled = match env::var("MIGRATIONS_ENABLED") {
            Ok(value) => parse_bool("MIGRATIONS_ENABLED", &value)?,
            Err(_) => defaults.enabled,
        };
        let strict = match env::var("MIGRATIONS_STRICT") {
            Ok(value) => parse_bool("MIGRATIONS_STRICT", &value)?,
            Err(_) => defaults.strict,
        };
        let environment = match env::var("APP_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.environment,
        };

        let config = Self {
            enabled,
            table: env::var("MIGRATIONS_TABLE").unwrap_or(defaults.table),
            default_group: env::var("MIGRATIONS_DEFAULT_GROUP").unwrap_or(defaults.default_group),
            environment,
            strict,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json(json: &str) -> MigrationResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> MigrationResult<()> {
        if self.table.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "history table name must not be empty".to_string(),
            ));
        }
        if self.default_group.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "default group must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(field: &str, value: &str) -> MigrationResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MigrationError::Configuration(format!(
            "invalid boolean '{}' for {}",
            value, field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert!(config.enabled);
        assert!(config.strict);
        assert_eq!(config.table, "migrations");
        assert_eq!(config.default_group, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Testing);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = MigrationConfig::from_json(r#"{"table": "schema_history", "environment": "testing"}"#)
            .unwrap();
        assert_eq!(config.table, "schema_history");
        assert!(config.environment.is_testing());
        assert_eq!(config.default_group, "default");
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let config = MigrationConfig {
            table: " ".to_string(),
            ..MigrationConfig::default()
        };
        assert!(matches!(config.validate(), Err(MigrationError::Configuration(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "on").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}

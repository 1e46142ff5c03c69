//! SQL dialects
//!
//! A dialect supplies statement templates, capability flags, identifier and
//! value escaping, and the unsigned-type support matrix. Templates that a
//! dialect cannot express return `None`; Forge turns that into either a
//! `FeatureUnavailable` error or a `false` result depending on strictness.

use super::core::DatabaseValue;

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
    SqlServer,
}

/// How a dialect honours `unsigned: true` on a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignedSupport {
    /// Always append ` UNSIGNED`
    Always,
    /// Silently ignore the flag
    Never,
    /// Consult a per-type table
    Table(&'static [(&'static str, UnsignedMapping)]),
}

/// Entry of an unsigned translation table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignedMapping {
    /// The type accepts an ` UNSIGNED` suffix
    Suffix,
    /// The type is replaced with a wider signed type
    Substitute(&'static str),
}

const MYSQL_UNSIGNED: &[(&str, UnsignedMapping)] = &[
    ("DECIMAL", UnsignedMapping::Suffix),
    ("DOUBLE", UnsignedMapping::Suffix),
    ("FLOAT", UnsignedMapping::Suffix),
    ("INT", UnsignedMapping::Suffix),
    ("INTEGER", UnsignedMapping::Suffix),
    ("MEDIUMINT", UnsignedMapping::Suffix),
    ("SMALLINT", UnsignedMapping::Suffix),
    ("TINYINT", UnsignedMapping::Suffix),
    ("BIGINT", UnsignedMapping::Suffix),
];

const POSTGRES_UNSIGNED: &[(&str, UnsignedMapping)] = &[
    ("INT2", UnsignedMapping::Substitute("INTEGER")),
    ("SMALLINT", UnsignedMapping::Substitute("INTEGER")),
    ("INT", UnsignedMapping::Substitute("BIGINT")),
    ("INT4", UnsignedMapping::Substitute("BIGINT")),
    ("INTEGER", UnsignedMapping::Substitute("BIGINT")),
    ("INT8", UnsignedMapping::Substitute("NUMERIC")),
    ("BIGINT", UnsignedMapping::Substitute("NUMERIC")),
    ("REAL", UnsignedMapping::Substitute("DOUBLE PRECISION")),
    ("FLOAT", UnsignedMapping::Substitute("DOUBLE PRECISION")),
];

const SQLSERVER_UNSIGNED: &[(&str, UnsignedMapping)] = &[
    ("TINYINT", UnsignedMapping::Substitute("SMALLINT")),
    ("SMALLINT", UnsignedMapping::Substitute("INT")),
    ("INT", UnsignedMapping::Substitute("BIGINT")),
    ("INTEGER", UnsignedMapping::Substitute("BIGINT")),
    ("BIGINT", UnsignedMapping::Substitute("NUMERIC")),
    ("REAL", UnsignedMapping::Substitute("FLOAT")),
];

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::SqlServer => format!("@p{}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the opening and closing quote characters for identifiers
    pub fn identifier_quotes(&self) -> (char, char) {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => ('"', '"'),
            SqlDialect::MySQL => ('`', '`'),
            SqlDialect::SqlServer => ('[', ']'),
        }
    }

    /// Escape a (possibly dotted) identifier
    pub fn escape_identifier(&self, identifier: &str) -> String {
        let (open, close) = self.identifier_quotes();
        identifier
            .split('.')
            .map(|part| {
                let doubled = part.replace(close, &format!("{}{}", close, close));
                format!("{}{}{}", open, doubled, close)
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escape a list of identifiers and join them with `, `
    pub fn escape_identifier_list<S: AsRef<str>>(&self, identifiers: &[S]) -> String {
        identifiers
            .iter()
            .map(|identifier| self.escape_identifier(identifier.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Strip identifier quotes produced by [`SqlDialect::escape_identifier`]
    pub fn unescape_identifier(&self, identifier: &str) -> String {
        let (open, close) = self.identifier_quotes();
        identifier
            .trim()
            .trim_start_matches(open)
            .trim_end_matches(close)
            .replace(&format!("{}{}", close, close), &close.to_string())
    }

    /// Render a value as an SQL literal
    pub fn escape_value(&self, value: &DatabaseValue) -> String {
        match value {
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Bool(b) => match self {
                SqlDialect::PostgreSQL => (if *b { "TRUE" } else { "FALSE" }).to_string(),
                _ => (if *b { "1" } else { "0" }).to_string(),
            },
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::String(s) => self.escape_string(s),
        }
    }

    /// Quote a string literal
    pub fn escape_string(&self, value: &str) -> String {
        let mut escaped = value.replace('\'', "''");
        if *self == SqlDialect::MySQL {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }

    /// Whether `CREATE TABLE IF NOT EXISTS` is understood natively
    pub fn supports_create_table_if_not_exists(&self) -> bool {
        !matches!(self, SqlDialect::SqlServer)
    }

    /// Whether `DROP TABLE IF EXISTS` is understood natively
    pub fn supports_drop_table_if_exists(&self) -> bool {
        !matches!(self, SqlDialect::SqlServer)
    }

    /// Whether secondary indexes are declared inside `CREATE TABLE`
    pub fn creates_indexes_inline(&self) -> bool {
        matches!(self, SqlDialect::MySQL)
    }

    /// Whether integer types accept a display length such as `INT(11)`
    pub fn allows_integer_length(&self) -> bool {
        matches!(self, SqlDialect::MySQL | SqlDialect::SQLite)
    }

    /// Unsigned support matrix
    pub fn unsigned_support(&self) -> UnsignedSupport {
        match self {
            SqlDialect::MySQL => UnsignedSupport::Table(MYSQL_UNSIGNED),
            SqlDialect::PostgreSQL => UnsignedSupport::Table(POSTGRES_UNSIGNED),
            SqlDialect::SqlServer => UnsignedSupport::Table(SQLSERVER_UNSIGNED),
            SqlDialect::SQLite => UnsignedSupport::Never,
        }
    }

    /// Translate a generic type name into this dialect's spelling
    pub fn map_type(&self, type_name: &str) -> String {
        let upper = type_name.to_uppercase();
        let mapped = match (self, upper.as_str()) {
            (SqlDialect::PostgreSQL, "TINYINT") => "SMALLINT",
            (SqlDialect::PostgreSQL, "MEDIUMINT") => "INTEGER",
            (SqlDialect::PostgreSQL, "DATETIME") => "TIMESTAMP",
            (SqlDialect::PostgreSQL, "BLOB") => "BYTEA",
            (SqlDialect::PostgreSQL, "DOUBLE") => "DOUBLE PRECISION",
            (SqlDialect::SQLite, "ENUM") | (SqlDialect::SQLite, "SET") => "TEXT",
            (SqlDialect::SqlServer, "MEDIUMINT") => "INTEGER",
            (SqlDialect::SqlServer, "TEXT") => "VARCHAR(MAX)",
            (SqlDialect::SqlServer, "BOOLEAN") => "BIT",
            _ => return type_name.to_string(),
        };
        mapped.to_string()
    }

    /// Statement that disables foreign-key checking
    pub fn foreign_key_checks_off(&self) -> Option<&'static str> {
        match self {
            SqlDialect::PostgreSQL => Some("SET CONSTRAINTS ALL DEFERRED"),
            SqlDialect::MySQL => Some("SET FOREIGN_KEY_CHECKS = 0"),
            SqlDialect::SQLite => Some("PRAGMA foreign_keys = OFF"),
            SqlDialect::SqlServer => {
                Some("EXEC sp_MSforeachtable \"ALTER TABLE ? NOCHECK CONSTRAINT all\"")
            }
        }
    }

    /// Statement that re-enables foreign-key checking
    pub fn foreign_key_checks_on(&self) -> Option<&'static str> {
        match self {
            SqlDialect::PostgreSQL => Some("SET CONSTRAINTS ALL IMMEDIATE"),
            SqlDialect::MySQL => Some("SET FOREIGN_KEY_CHECKS = 1"),
            SqlDialect::SQLite => Some("PRAGMA foreign_keys = ON"),
            SqlDialect::SqlServer => {
                Some("EXEC sp_MSforeachtable \"ALTER TABLE ? WITH CHECK CHECK CONSTRAINT all\"")
            }
        }
    }

    /// `CREATE DATABASE` statement; `if_not_exists` yields `None` when the
    /// dialect has no native guard and the caller must emulate it
    pub fn create_database_sql(
        &self,
        name: &str,
        charset: &str,
        collation: &str,
        if_not_exists: bool,
    ) -> Option<String> {
        let name = self.escape_identifier(name);
        match self {
            SqlDialect::MySQL => Some(format!(
                "CREATE DATABASE {}{} CHARACTER SET {} COLLATE {}",
                if if_not_exists { "IF NOT EXISTS " } else { "" },
                name,
                self.escape_string(charset),
                self.escape_string(collation)
            )),
            SqlDialect::PostgreSQL | SqlDialect::SqlServer if !if_not_exists => {
                Some(format!("CREATE DATABASE {}", name))
            }
            _ => None,
        }
    }

    /// Whether `CREATE DATABASE IF NOT EXISTS` is understood natively
    pub fn supports_create_database_if_not_exists(&self) -> bool {
        matches!(self, SqlDialect::MySQL)
    }

    /// `DROP DATABASE` statement
    pub fn drop_database_sql(&self, name: &str) -> Option<String> {
        match self {
            SqlDialect::SQLite => None,
            _ => Some(format!("DROP DATABASE {}", self.escape_identifier(name))),
        }
    }

    /// `RENAME TABLE` statement, names already prefixed
    pub fn rename_table_sql(&self, from: &str, to: &str) -> Option<String> {
        match self {
            SqlDialect::SqlServer => Some(format!(
                "EXEC sp_rename {}, {}",
                self.escape_string(from),
                self.escape_string(to)
            )),
            _ => Some(format!(
                "ALTER TABLE {} RENAME TO {}",
                self.escape_identifier(from),
                self.escape_identifier(to)
            )),
        }
    }

    /// Statement dropping a named foreign-key constraint
    pub fn drop_foreign_key_sql(&self, table: &str, constraint: &str) -> Option<String> {
        let table = self.escape_identifier(table);
        let constraint = self.escape_identifier(constraint);
        match self {
            SqlDialect::MySQL => Some(format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, constraint)),
            SqlDialect::PostgreSQL | SqlDialect::SqlServer => {
                Some(format!("ALTER TABLE {} DROP CONSTRAINT {}", table, constraint))
            }
            SqlDialect::SQLite => None,
        }
    }

    /// Whether an existing column can be changed in place
    pub fn supports_modify_column(&self) -> bool {
        !matches!(self, SqlDialect::SQLite)
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
            SqlDialect::SqlServer => write!(f, "sqlserver"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(SqlDialect::MySQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            "sqlserver" | "mssql" => Ok(SqlDialect::SqlServer),
            _ => Err(format!("Unsupported database dialect: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(SqlDialect::PostgreSQL.escape_identifier("users"), "\"users\"");
        assert_eq!(SqlDialect::MySQL.escape_identifier("db.users"), "`db`.`users`");
        assert_eq!(SqlDialect::SqlServer.escape_identifier("users"), "[users]");
        assert_eq!(SqlDialect::MySQL.escape_identifier("we`ird"), "`we``ird`");
        assert_eq!(SqlDialect::MySQL.unescape_identifier("`we``ird`"), "we`ird");
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(SqlDialect::PostgreSQL.escape_value(&"it's".into()), "'it''s'");
        assert_eq!(SqlDialect::PostgreSQL.escape_value(&true.into()), "TRUE");
        assert_eq!(SqlDialect::MySQL.escape_value(&true.into()), "1");
        assert_eq!(SqlDialect::SQLite.escape_value(&DatabaseValue::Null), "NULL");
        assert_eq!(SqlDialect::MySQL.escape_value(&42i64.into()), "42");
    }

    #[test]
    fn test_capabilities() {
        assert!(SqlDialect::MySQL.creates_indexes_inline());
        assert!(!SqlDialect::PostgreSQL.creates_indexes_inline());
        assert!(!SqlDialect::SqlServer.supports_create_table_if_not_exists());
        assert!(SqlDialect::SQLite.drop_database_sql("app").is_none());
        assert!(SqlDialect::SQLite.drop_foreign_key_sql("posts", "fk").is_none());
        assert_eq!(SqlDialect::PostgreSQL.map_type("datetime"), "TIMESTAMP");
        assert_eq!(SqlDialect::MySQL.map_type("datetime"), "datetime");
    }

    #[test]
    fn test_create_database_guard() {
        let mysql = SqlDialect::MySQL
            .create_database_sql("app", "utf8mb4", "utf8mb4_general_ci", true)
            .unwrap();
        assert!(mysql.starts_with("CREATE DATABASE IF NOT EXISTS `app`"));

        assert!(SqlDialect::PostgreSQL
            .create_database_sql("app", "utf8", "", true)
            .is_none());
        assert_eq!(
            SqlDialect::PostgreSQL.create_database_sql("app", "utf8", "", false).unwrap(),
            "CREATE DATABASE \"app\""
        );
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("postgres".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSQL);
        assert_eq!("MSSQL".parse::<SqlDialect>().unwrap(), SqlDialect::SqlServer);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }
}

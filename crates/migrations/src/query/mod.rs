//! Table Query Builder
//!
//! A deliberately small query builder covering what the history store needs:
//! equality filters, ordering, a limit and `DISTINCT` projections, plus the
//! matching `INSERT`, `DELETE` and `TRUNCATE` statements. Drivers that speak
//! SQL render it with [`TableQuery::to_select_sql`] and friends; in-memory
//! drivers evaluate it directly.

use std::fmt;

use crate::backends::{DatabaseValue, SqlDialect};

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl std::str::FromStr for OrderDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(OrderDirection::Asc),
            "desc" => Ok(OrderDirection::Desc),
            _ => Err(format!("Invalid order direction: {}", s)),
        }
    }
}

/// Query against a single table
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub select_fields: Vec<String>,
    pub distinct: bool,
    pub where_conditions: Vec<(String, DatabaseValue)>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<usize>,
}

impl TableQuery {
    /// Start a query on an (unprefixed) table
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select_fields: Vec::new(),
            distinct: false,
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Restrict the projection to the given columns
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Return only distinct projected rows
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add an equality condition
    pub fn where_eq(mut self, column: &str, value: impl Into<DatabaseValue>) -> Self {
        self.where_conditions.push((column.to_string(), value.into()));
        self
    }

    /// Add an ORDER BY column
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    /// Render a SELECT statement with placeholders
    pub fn to_select_sql(&self, dialect: SqlDialect, prefix: &str) -> (String, Vec<DatabaseValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }

        if dialect == SqlDialect::SqlServer {
            if let Some(limit) = self.limit {
                sql.push_str(&format!("TOP {} ", limit));
            }
        }

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&dialect.escape_identifier_list(&self.select_fields));
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.escape_identifier(&format!("{}{}", prefix, self.table)));

        self.build_where_clause(dialect, &mut sql, &mut params);

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| {
                    format!("{} {}", dialect.escape_identifier(column), direction)
                })
                .collect();
            sql.push_str(&clauses.join(", "));
        }

        if dialect != SqlDialect::SqlServer {
            if let Some(limit) = self.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
        }

        (sql, params)
    }

    /// Render a DELETE statement with placeholders
    pub fn to_delete_sql(&self, dialect: SqlDialect, prefix: &str) -> (String, Vec<DatabaseValue>) {
        let mut sql = format!(
            "DELETE FROM {}",
            dialect.escape_identifier(&format!("{}{}", prefix, self.table))
        );
        let mut params = Vec::new();
        self.build_where_clause(dialect, &mut sql, &mut params);
        (sql, params)
    }

    fn build_where_clause(&self, dialect: SqlDialect, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        if self.where_conditions.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        for (i, (column, value)) in self.where_conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(&dialect.escape_identifier(column));
            if value.is_null() {
                sql.push_str(" IS NULL");
            } else {
                sql.push_str(" = ");
                sql.push_str(&dialect.parameter_placeholder(params.len()));
                params.push(value.clone());
            }
        }
    }
}

/// Render an INSERT statement with placeholders
pub fn insert_sql(
    dialect: SqlDialect,
    table: &str,
    values: &[(&str, DatabaseValue)],
) -> (String, Vec<DatabaseValue>) {
    let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
    let placeholders: Vec<String> = (0..values.len())
        .map(|i| dialect.parameter_placeholder(i))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.escape_identifier(table),
        dialect.escape_identifier_list(&columns),
        placeholders.join(", ")
    );
    let params = values.iter().map(|(_, value)| value.clone()).collect();
    (sql, params)
}

/// Render a statement emptying a table
pub fn truncate_sql(dialect: SqlDialect, table: &str) -> String {
    match dialect {
        SqlDialect::SQLite => format!("DELETE FROM {}", dialect.escape_identifier(table)),
        _ => format!("TRUNCATE TABLE {}", dialect.escape_identifier(table)),
    }
}

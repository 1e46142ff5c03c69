//! Forge - dialect-aware DDL builder
//!
//! Forge accumulates field, key and foreign-key declarations and turns them
//! into `CREATE`/`ALTER`/`DROP`/`RENAME` statements for the driver's
//! [`SqlDialect`]. The declaration buffer is cleared by every table-creating
//! or column-altering operation, whether it succeeds or not, so declarations
//! never leak into an unrelated statement.
//!
//! ```ignore
//! let mut forge = Forge::new(&driver);
//! forge
//!     .add_field_str("id")?
//!     .add_field("name", Field::new("VARCHAR").constraint(100))?
//!     .add_unique_key(&["name"]);
//! forge.create_table("widgets", true, &[]).await?;
//! ```

pub mod field;

pub use field::{Constraint, DefaultValue, Field, FieldDefinition, ForeignKey, ReferentialAction};

use tracing::{debug, info, warn};

use crate::backends::{DatabaseDriver, SqlDialect, UnsignedMapping, UnsignedSupport};
use crate::error::{MigrationError, MigrationResult};

/// Schema builder bound to one database driver
pub struct Forge<'a> {
    db: &'a dyn DatabaseDriver,
    strict: bool,
    fields: Vec<FieldDefinition>,
    keys: Vec<Vec<String>>,
    unique_keys: Vec<usize>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<(String, ForeignKey)>,
}

/// A processed column, ready to render
#[derive(Debug, Clone, Default)]
struct Column {
    name: String,
    new_name: Option<String>,
    type_name: String,
    length: String,
    unsigned: String,
    default: String,
    null: String,
    auto_increment: String,
    unique: String,
    literal: Option<String>,
    inline_primary: bool,
}

impl<'a> Forge<'a> {
    /// Create a strict builder: unavailable features and failed statements raise
    pub fn new(db: &'a dyn DatabaseDriver) -> Self {
        Self {
            db,
            strict: true,
            fields: Vec::new(),
            keys: Vec::new(),
            unique_keys: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Report unavailable features and failed statements as `Ok(false)`
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Driver the builder executes through
    pub fn db(&self) -> &'a dyn DatabaseDriver {
        self.db
    }

    pub fn dialect(&self) -> SqlDialect {
        self.db.dialect()
    }

    /// Whether anything is waiting in the declaration buffer
    pub fn has_declarations(&self) -> bool {
        !self.fields.is_empty()
            || !self.keys.is_empty()
            || !self.primary_keys.is_empty()
            || !self.foreign_keys.is_empty()
    }

    /// Clear every pending declaration
    pub fn reset(&mut self) {
        self.fields.clear();
        self.keys.clear();
        self.unique_keys.clear();
        self.primary_keys.clear();
        self.foreign_keys.clear();
    }

    /// Declare a column. Re-declaring a name replaces it in place.
    pub fn add_field(&mut self, name: &str, field: Field) -> MigrationResult<&mut Self> {
        if name.trim().is_empty() {
            return Err(MigrationError::Usage(
                "A field name is required for that operation.".to_string(),
            ));
        }

        let definition = FieldDefinition::Named {
            name: name.to_string(),
            field,
        };
        match self.fields.iter().position(|f| f.name() == Some(name)) {
            Some(index) => self.fields[index] = definition,
            None => self.fields.push(definition),
        }
        Ok(self)
    }

    /// Declare several columns, preserving their order
    pub fn add_fields(&mut self, fields: Vec<(&str, Field)>) -> MigrationResult<&mut Self> {
        for (name, field) in fields {
            self.add_field(name, field)?;
        }
        Ok(self)
    }

    /// Declare a column from a string.
    ///
    /// `"id"` is shorthand for an auto-incrementing `INT(9)` primary key;
    /// anything else must be a complete column definition.
    pub fn add_field_str(&mut self, definition: &str) -> MigrationResult<&mut Self> {
        let definition = definition.trim();
        if definition == "id" {
            self.add_field("id", Field::new("INT").constraint(9).auto_increment())?;
            return Ok(self.add_primary_key(&["id"]));
        }

        if !definition.contains(char::is_whitespace) {
            return Err(MigrationError::Usage(
                "Field information is required for that operation.".to_string(),
            ));
        }

        self.fields.push(FieldDefinition::Literal(definition.to_string()));
        Ok(self)
    }

    /// Register an index over `columns`
    pub fn add_key(&mut self, columns: &[&str], primary: bool, unique: bool) -> &mut Self {
        if primary {
            for column in columns {
                if !self.primary_keys.iter().any(|k| k == column) {
                    self.primary_keys.push(column.to_string());
                }
            }
            return self;
        }

        self.keys.push(columns.iter().map(|c| c.to_string()).collect());
        if unique {
            self.unique_keys.push(self.keys.len() - 1);
        }
        self
    }

    pub fn add_primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.add_key(columns, true, false)
    }

    pub fn add_unique_key(&mut self, columns: &[&str]) -> &mut Self {
        self.add_key(columns, false, true)
    }

    /// Declare a foreign key on an already declared column.
    ///
    /// Unrecognized `on_update`/`on_delete` actions are left out of the
    /// generated SQL.
    pub fn add_foreign_key(
        &mut self,
        column: &str,
        table: &str,
        table_column: &str,
        on_update: &str,
        on_delete: &str,
    ) -> MigrationResult<&mut Self> {
        if !self.has_field(column) {
            return Err(MigrationError::Schema(format!(
                "Field '{}' not found.",
                column
            )));
        }

        let foreign_key = ForeignKey {
            table: table.to_string(),
            column: table_column.to_string(),
            on_delete: parse_action(column, "ON DELETE", on_delete),
            on_update: parse_action(column, "ON UPDATE", on_update),
        };
        match self.foreign_keys.iter().position(|(c, _)| c == column) {
            Some(index) => self.foreign_keys[index].1 = foreign_key,
            None => self.foreign_keys.push((column.to_string(), foreign_key)),
        }
        Ok(self)
    }

    /// Name given to the constraint created for a foreign key on `column`
    pub fn foreign_key_name(&self, table: &str, column: &str) -> String {
        format!("{}_{}_foreign", self.db.prefixed(table), column)
    }

    /// Create a table from the declaration buffer
    pub async fn create_table(
        &mut self,
        table: &str,
        if_not_exists: bool,
        attributes: &[(&str, &str)],
    ) -> MigrationResult<bool> {
        let result = self.create_table_inner(table, if_not_exists, attributes).await;
        self.reset();
        result
    }

    async fn create_table_inner(
        &self,
        table: &str,
        if_not_exists: bool,
        attributes: &[(&str, &str)],
    ) -> MigrationResult<bool> {
        self.require_table_declaration(table)?;

        if if_not_exists
            && !self.dialect().supports_create_table_if_not_exists()
            && self.db.table_exists(table).await?
        {
            debug!(table, "table already exists, skipping create");
            return Ok(true);
        }

        let statements = self.create_table_sql(table, if_not_exists, attributes)?;
        info!(table, "creating table");
        self.run(&statements).await
    }

    /// Render the `CREATE TABLE` statement followed by any index statements
    pub fn create_table_sql(
        &self,
        table: &str,
        if_not_exists: bool,
        attributes: &[(&str, &str)],
    ) -> MigrationResult<Vec<String>> {
        self.require_table_declaration(table)?;

        let dialect = self.dialect();
        let full_table = self.db.prefixed(table);
        let escaped_table = dialect.escape_identifier(&full_table);

        let columns = self.process_fields(true);
        if columns.is_empty() {
            return Err(MigrationError::Usage(
                "Field information is required.".to_string(),
            ));
        }

        let mut body = columns
            .iter()
            .map(|column| format!("\n\t{}", render_column(dialect, column)))
            .collect::<Vec<_>>()
            .join(",");
        body.push_str(&self.primary_key_clause(dialect, &full_table, &columns));
        body.push_str(&self.foreign_key_clause(dialect, &full_table));

        let keys = self.declared_keys();
        if dialect.creates_indexes_inline() {
            for (columns, unique) in &keys {
                body.push_str(&format!(
                    ",\n\t{}KEY {} ({})",
                    if *unique { "UNIQUE " } else { "" },
                    dialect.escape_identifier(&columns.join("_")),
                    dialect.escape_identifier_list(columns)
                ));
            }
        }

        let keyword = if if_not_exists && dialect.supports_create_table_if_not_exists() {
            "CREATE TABLE IF NOT EXISTS"
        } else {
            "CREATE TABLE"
        };

        let mut statements = vec![format!(
            "{} {} ({}\n){}",
            keyword,
            escaped_table,
            body,
            self.table_attributes(dialect, attributes)
        )];

        if !dialect.creates_indexes_inline() {
            for (columns, unique) in &keys {
                let index_name = dialect.escape_identifier(&format!("{}_{}", full_table, columns.join("_")));
                let column_list = dialect.escape_identifier_list(columns);
                let sql = match (unique, dialect) {
                    (true, SqlDialect::SQLite) => format!(
                        "CREATE UNIQUE INDEX {} ON {} ({})",
                        index_name, escaped_table, column_list
                    ),
                    (true, _) => format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                        escaped_table, index_name, column_list
                    ),
                    (false, _) => format!(
                        "CREATE INDEX {} ON {} ({})",
                        index_name, escaped_table, column_list
                    ),
                };
                statements.push(sql);
            }
        }

        Ok(statements)
    }

    /// Drop a table with foreign-key checks disabled for the statement
    pub async fn drop_table(&mut self, table: &str, if_exists: bool, cascade: bool) -> MigrationResult<bool> {
        let result = self.drop_table_inner(table, if_exists, cascade).await;
        self.reset();
        result
    }

    async fn drop_table_inner(&self, table: &str, if_exists: bool, cascade: bool) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;

        let dialect = self.dialect();
        let escaped = dialect.escape_identifier(&self.db.prefixed(table));
        let mut sql = if if_exists && dialect.supports_drop_table_if_exists() {
            format!("DROP TABLE IF EXISTS {}", escaped)
        } else {
            if if_exists && !self.db.table_exists(table).await? {
                return Ok(true);
            }
            format!("DROP TABLE {}", escaped)
        };
        if cascade && dialect == SqlDialect::PostgreSQL {
            sql.push_str(" CASCADE");
        }

        info!(table, "dropping table");
        self.db.disable_foreign_key_checks().await?;
        let dropped = self.run(&[sql]).await;
        let restored = self.db.enable_foreign_key_checks().await;

        let dropped = dropped?;
        restored?;
        Ok(dropped)
    }

    pub async fn rename_table(&mut self, table: &str, new_name: &str) -> MigrationResult<bool> {
        let result = self.rename_table_inner(table, new_name).await;
        self.reset();
        result
    }

    async fn rename_table_inner(&self, table: &str, new_name: &str) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;
        require_name(new_name, "A table name is required for that operation.")?;

        let sql = self
            .dialect()
            .rename_table_sql(&self.db.prefixed(table), &self.db.prefixed(new_name));
        match sql {
            Some(sql) => self.run(&[sql]).await,
            None => self.unavailable("rename table"),
        }
    }

    /// Add the given columns (plus anything already declared) to a table
    pub async fn add_column(&mut self, table: &str, columns: Vec<(&str, Field)>) -> MigrationResult<bool> {
        let declared = self.add_fields(columns).map(|_| ());
        let result = match declared {
            Ok(()) => self.add_column_inner(table).await,
            Err(e) => Err(e),
        };
        self.reset();
        result
    }

    async fn add_column_inner(&self, table: &str) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;

        let dialect = self.dialect();
        let columns = self.process_fields(false);
        if columns.is_empty() {
            return Err(MigrationError::Usage(
                "Field information is required.".to_string(),
            ));
        }

        let escaped = dialect.escape_identifier(&self.db.prefixed(table));
        let statements: Vec<String> = columns
            .iter()
            .map(|column| format!("ALTER TABLE {} ADD {}", escaped, render_column(dialect, column)))
            .collect();
        self.run(&statements).await
    }

    pub async fn drop_column(&mut self, table: &str, columns: &[&str]) -> MigrationResult<bool> {
        let result = self.drop_column_inner(table, columns).await;
        self.reset();
        result
    }

    async fn drop_column_inner(&self, table: &str, columns: &[&str]) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;
        if columns.is_empty() {
            return Err(MigrationError::Usage(
                "Column names are required for that operation.".to_string(),
            ));
        }

        let dialect = self.dialect();
        let escaped = dialect.escape_identifier(&self.db.prefixed(table));
        let statements = match dialect {
            SqlDialect::SQLite => columns
                .iter()
                .map(|c| format!("ALTER TABLE {} DROP COLUMN {}", escaped, dialect.escape_identifier(c)))
                .collect(),
            SqlDialect::SqlServer => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                escaped,
                dialect.escape_identifier_list(columns)
            )],
            _ => vec![format!(
                "ALTER TABLE {} {}",
                escaped,
                columns
                    .iter()
                    .map(|c| format!("DROP COLUMN {}", dialect.escape_identifier(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            )],
        };
        self.run(&statements).await
    }

    /// Change existing columns; `Field::rename_to` renames them
    pub async fn modify_column(&mut self, table: &str, columns: Vec<(&str, Field)>) -> MigrationResult<bool> {
        let declared = self.add_fields(columns).map(|_| ());
        let result = match declared {
            Ok(()) => self.modify_column_inner(table).await,
            Err(e) => Err(e),
        };
        self.reset();
        result
    }

    async fn modify_column_inner(&self, table: &str) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;

        let columns = self.process_fields(false);
        if columns.is_empty() {
            return Err(MigrationError::Usage(
                "Field information is required.".to_string(),
            ));
        }

        let dialect = self.dialect();
        if !dialect.supports_modify_column() {
            return self.unavailable("modify column");
        }

        let full_table = self.db.prefixed(table);
        let statements: Vec<String> = columns
            .iter()
            .flat_map(|column| modify_column_statements(dialect, &full_table, column))
            .collect();
        self.run(&statements).await
    }

    pub async fn drop_foreign_key(&mut self, table: &str, constraint: &str) -> MigrationResult<bool> {
        let result = self.drop_foreign_key_inner(table, constraint).await;
        self.reset();
        result
    }

    async fn drop_foreign_key_inner(&self, table: &str, constraint: &str) -> MigrationResult<bool> {
        require_name(table, "A table name is required for that operation.")?;
        require_name(constraint, "A constraint name is required for that operation.")?;

        match self.dialect().drop_foreign_key_sql(&self.db.prefixed(table), constraint) {
            Some(sql) => self.run(&[sql]).await,
            None => self.unavailable("drop foreign key"),
        }
    }

    pub async fn create_database(&self, name: &str, if_not_exists: bool) -> MigrationResult<bool> {
        require_name(name, "A database name is required for that operation.")?;

        let dialect = self.dialect();
        let mut guard = if_not_exists;
        if guard && !dialect.supports_create_database_if_not_exists() {
            if self.db.database_exists(name).await? {
                return Ok(true);
            }
            guard = false;
        }

        let settings = self.db.settings();
        match dialect.create_database_sql(name, &settings.charset, &settings.collation, guard) {
            Some(sql) => self.run(&[sql]).await,
            None => self.unavailable("create database"),
        }
    }

    pub async fn drop_database(&self, name: &str) -> MigrationResult<bool> {
        require_name(name, "A database name is required for that operation.")?;

        match self.dialect().drop_database_sql(name) {
            Some(sql) => self.run(&[sql]).await,
            None => self.unavailable("drop database"),
        }
    }

    async fn run(&self, statements: &[String]) -> MigrationResult<bool> {
        for sql in statements {
            debug!(sql = %sql, "forge");
            if let Err(e) = self.db.execute(sql, &[]).await {
                if self.strict {
                    return Err(e);
                }
                warn!(error = %e, sql = %sql, "statement failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn unavailable(&self, operation: &str) -> MigrationResult<bool> {
        if self.strict {
            return Err(MigrationError::unavailable(operation));
        }
        warn!(operation, dialect = %self.dialect(), "feature unavailable");
        Ok(false)
    }

    fn require_table_declaration(&self, table: &str) -> MigrationResult<()> {
        require_name(table, "A table name is required for that operation.")?;
        if self.fields.is_empty() {
            return Err(MigrationError::Usage(
                "Field information is required.".to_string(),
            ));
        }
        Ok(())
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == Some(name))
    }

    fn process_fields(&self, create_table: bool) -> Vec<Column> {
        let dialect = self.dialect();
        let mut columns = Vec::new();

        for definition in &self.fields {
            match definition {
                FieldDefinition::Literal(sql) => columns.push(Column {
                    literal: Some(sql.clone()),
                    ..Column::default()
                }),
                FieldDefinition::Named { name, field } => {
                    if create_table && field.type_name.trim().is_empty() {
                        continue;
                    }
                    columns.push(process_field(dialect, name, field, create_table));
                }
            }
        }

        columns
    }

    /// Non-primary keys restricted to declared columns, with their unique flag
    fn declared_keys(&self) -> Vec<(Vec<String>, bool)> {
        self.keys
            .iter()
            .enumerate()
            .filter_map(|(index, columns)| {
                let columns: Vec<String> = columns
                    .iter()
                    .filter(|c| self.has_field(c))
                    .cloned()
                    .collect();
                if columns.is_empty() {
                    None
                } else {
                    Some((columns, self.unique_keys.contains(&index)))
                }
            })
            .collect()
    }

    fn primary_key_clause(&self, dialect: SqlDialect, full_table: &str, columns: &[Column]) -> String {
        if columns.iter().any(|c| c.inline_primary) {
            return String::new();
        }

        let keys: Vec<&String> = self
            .primary_keys
            .iter()
            .filter(|k| self.has_field(k))
            .collect();
        if keys.is_empty() {
            return String::new();
        }

        format!(
            ",\n\tCONSTRAINT {} PRIMARY KEY({})",
            dialect.escape_identifier(&format!("pk_{}", full_table)),
            dialect.escape_identifier_list(&keys)
        )
    }

    fn foreign_key_clause(&self, dialect: SqlDialect, full_table: &str) -> String {
        let mut sql = String::new();
        for (column, foreign_key) in &self.foreign_keys {
            sql.push_str(&format!(
                ",\n\tCONSTRAINT {} FOREIGN KEY({}) REFERENCES {} ({})",
                dialect.escape_identifier(&format!("{}_{}_foreign", full_table, column)),
                dialect.escape_identifier(column),
                dialect.escape_identifier(&self.db.prefixed(&foreign_key.table)),
                dialect.escape_identifier(&foreign_key.column)
            ));
            if let Some(action) = foreign_key.on_delete {
                sql.push_str(&format!(" ON DELETE {}", action.as_sql()));
            }
            if let Some(action) = foreign_key.on_update {
                sql.push_str(&format!(" ON UPDATE {}", action.as_sql()));
            }
        }
        sql
    }

    fn table_attributes(&self, dialect: SqlDialect, attributes: &[(&str, &str)]) -> String {
        let separator = if dialect == SqlDialect::MySQL { " = " } else { " " };
        let mut sql = String::new();
        for (key, value) in attributes {
            sql.push_str(&format!(
                " {}{}{}",
                key.to_uppercase(),
                separator,
                dialect.escape_string(value)
            ));
        }

        if dialect == SqlDialect::MySQL {
            let settings = self.db.settings();
            if !settings.charset.is_empty() && !sql.contains("CHARACTER SET") && !sql.contains("CHARSET") {
                sql.push_str(&format!(
                    " DEFAULT CHARACTER SET = {}",
                    dialect.escape_string(&settings.charset)
                ));
            }
            if !settings.collation.is_empty() && !sql.contains("COLLATE") {
                sql.push_str(&format!(" COLLATE = {}", dialect.escape_string(&settings.collation)));
            }
        }
        sql
    }
}

fn require_name(name: &str, message: &str) -> MigrationResult<()> {
    if name.trim().is_empty() {
        return Err(MigrationError::Usage(message.to_string()));
    }
    Ok(())
}

fn parse_action(column: &str, clause: &str, action: &str) -> Option<ReferentialAction> {
    if action.trim().is_empty() {
        return None;
    }
    let parsed = ReferentialAction::parse(action);
    if parsed.is_none() {
        warn!(column, clause, action, "ignoring unrecognized referential action");
    }
    parsed
}

fn process_field(dialect: SqlDialect, name: &str, field: &Field, create_table: bool) -> Column {
    let mut column = Column {
        name: name.to_string(),
        new_name: field.new_name.clone(),
        type_name: dialect.map_type(&field.type_name),
        ..Column::default()
    };

    if field.unsigned {
        apply_unsigned(dialect.unsigned_support(), &mut column);
    }
    column.length = render_constraint(dialect, field, &column.type_name);

    let mut nullable = field.null;
    match &field.default {
        Some(DefaultValue::Null) => {
            column.default = " DEFAULT NULL".to_string();
            nullable = Some(true);
        }
        Some(DefaultValue::Value(value)) => {
            column.default = format!(" DEFAULT {}", dialect.escape_value(value));
        }
        Some(DefaultValue::Raw(expression)) => {
            column.default = format!(" DEFAULT {}", expression);
        }
        None => {}
    }

    column.null = match nullable {
        Some(true) => " NULL",
        Some(false) => " NOT NULL",
        None if create_table => " NOT NULL",
        None => "",
    }
    .to_string();

    if field.unique {
        column.unique = " UNIQUE".to_string();
    }
    if field.auto_increment && field.is_integer_type() {
        apply_auto_increment(dialect, &mut column);
    }

    column
}

/// Apply the dialect's unsigned rule to a column that requested it
fn apply_unsigned(support: UnsignedSupport, column: &mut Column) {
    match support {
        UnsignedSupport::Always => column.unsigned = " UNSIGNED".to_string(),
        UnsignedSupport::Never => {}
        UnsignedSupport::Table(entries) => {
            let entry = entries
                .iter()
                .find(|(type_name, _)| type_name.eq_ignore_ascii_case(&column.type_name));
            match entry {
                Some((_, UnsignedMapping::Suffix)) => column.unsigned = " UNSIGNED".to_string(),
                Some((_, UnsignedMapping::Substitute(wider))) => column.type_name = wider.to_string(),
                None => {}
            }
        }
    }
}

fn render_constraint(dialect: SqlDialect, field: &Field, type_name: &str) -> String {
    match &field.constraint {
        None => String::new(),
        Some(Constraint::Values(values)) => {
            let upper = type_name.to_uppercase();
            if upper != "ENUM" && upper != "SET" {
                return String::new();
            }
            let list: Vec<String> = values.iter().map(|v| dialect.escape_string(v)).collect();
            format!("({})", list.join(","))
        }
        Some(Constraint::Length(length)) => {
            if field.is_integer_type() && !dialect.allows_integer_length() {
                String::new()
            } else {
                format!("({})", length)
            }
        }
    }
}

fn apply_auto_increment(dialect: SqlDialect, column: &mut Column) {
    match dialect {
        SqlDialect::MySQL => column.auto_increment = " AUTO_INCREMENT".to_string(),
        SqlDialect::PostgreSQL => {
            let upper = column.type_name.to_uppercase();
            column.type_name = if matches!(upper.as_str(), "BIGINT" | "INT8" | "NUMERIC") {
                "BIGSERIAL".to_string()
            } else {
                "SERIAL".to_string()
            };
            column.length.clear();
            column.unsigned.clear();
            column.default.clear();
        }
        SqlDialect::SQLite => {
            column.type_name = "INTEGER PRIMARY KEY".to_string();
            column.length.clear();
            column.default.clear();
            column.null.clear();
            column.unique.clear();
            column.auto_increment = " AUTOINCREMENT".to_string();
            column.inline_primary = true;
        }
        SqlDialect::SqlServer => {
            column.auto_increment = " IDENTITY(1,1)".to_string();
            column.length.clear();
        }
    }
}

fn render_column(dialect: SqlDialect, column: &Column) -> String {
    if let Some(literal) = &column.literal {
        return literal.clone();
    }

    format!(
        "{} {}{}{}{}{}{}{}",
        dialect.escape_identifier(&column.name),
        column.type_name,
        column.length,
        column.unsigned,
        column.default,
        column.null,
        column.auto_increment,
        column.unique
    )
}

fn modify_column_statements(dialect: SqlDialect, full_table: &str, column: &Column) -> Vec<String> {
    let table = dialect.escape_identifier(full_table);

    if let Some(literal) = &column.literal {
        let keyword = if dialect == SqlDialect::MySQL { "CHANGE" } else { "ALTER COLUMN" };
        return vec![format!("ALTER TABLE {} {} {}", table, keyword, literal)];
    }

    let name = dialect.escape_identifier(&column.name);
    match dialect {
        SqlDialect::MySQL => {
            let mut renamed = column.clone();
            if let Some(new_name) = &column.new_name {
                renamed.name = new_name.clone();
            }
            vec![format!(
                "ALTER TABLE {} CHANGE {} {}",
                table,
                name,
                render_column(dialect, &renamed)
            )]
        }
        SqlDialect::PostgreSQL => {
            let mut statements = Vec::new();
            if !column.type_name.is_empty() {
                statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {}{}",
                    table, name, column.type_name, column.length
                ));
            }
            if !column.default.is_empty() {
                statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET{}",
                    table, name, column.default
                ));
            }
            match column.null.as_str() {
                " NULL" => statements.push(format!("ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL", table, name)),
                " NOT NULL" => statements.push(format!("ALTER TABLE {} ALTER COLUMN {} SET NOT NULL", table, name)),
                _ => {}
            }
            if let Some(new_name) = &column.new_name {
                statements.push(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    table,
                    name,
                    dialect.escape_identifier(new_name)
                ));
            }
            statements
        }
        SqlDialect::SqlServer => {
            let mut statements = vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} {}{}{}",
                table, name, column.type_name, column.length, column.null
            )];
            if let Some(new_name) = &column.new_name {
                statements.push(format!(
                    "EXEC sp_rename {}, {}, 'COLUMN'",
                    dialect.escape_string(&format!("{}.{}", full_table, column.name)),
                    dialect.escape_string(new_name)
                ));
            }
            statements
        }
        SqlDialect::SQLite => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ConnectionSettings;
    use crate::testing::MemoryDriver;

    fn widget_forge(driver: &MemoryDriver) -> Forge<'_> {
        let mut forge = Forge::new(driver);
        forge
            .add_field("id", Field::new("INT").constraint(9).auto_increment())
            .unwrap()
            .add_field("name", Field::new("VARCHAR").constraint(100))
            .unwrap()
            .add_primary_key(&["id"]);
        forge
    }

    #[test]
    fn test_create_table_sql_postgres() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let forge = widget_forge(&driver);

        let statements = forge.create_table_sql("widgets", false, &[]).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "CREATE TABLE \"widgets\" (\n\t\"id\" SERIAL NOT NULL,\n\t\"name\" VARCHAR(100) NOT NULL,\n\tCONSTRAINT \"pk_widgets\" PRIMARY KEY(\"id\")\n)"
        );
    }

    #[test]
    fn test_create_table_sql_mysql_inline_keys_and_attributes() {
        let driver = MemoryDriver::new(SqlDialect::MySQL);
        let mut forge = widget_forge(&driver);
        forge.add_unique_key(&["name"]).add_key(&["name", "id"], false, false);

        let statements = forge
            .create_table_sql("widgets", true, &[("engine", "InnoDB")])
            .unwrap();
        assert_eq!(statements.len(), 1);
        let sql = &statements[0];
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `widgets` ("));
        assert!(sql.contains("`id` INT(9) NOT NULL AUTO_INCREMENT"));
        assert!(sql.contains("CONSTRAINT `pk_widgets` PRIMARY KEY(`id`)"));
        assert!(sql.contains("UNIQUE KEY `name` (`name`)"));
        assert!(sql.contains("KEY `name_id` (`name`, `id`)"));
        assert!(sql.ends_with(
            " ENGINE = 'InnoDB' DEFAULT CHARACTER SET = 'utf8mb4' COLLATE = 'utf8mb4_general_ci'"
        ));
    }

    #[test]
    fn test_create_table_sql_separate_index_statements() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = widget_forge(&driver);
        forge.add_unique_key(&["name"]).add_key(&["name", "id"], false, false);
        forge.add_key(&["ghost"], false, false);

        let statements = forge.create_table_sql("widgets", false, &[]).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[1],
            "ALTER TABLE \"widgets\" ADD CONSTRAINT \"widgets_name\" UNIQUE (\"name\")"
        );
        assert_eq!(
            statements[2],
            "CREATE INDEX \"widgets_name_id\" ON \"widgets\" (\"name\", \"id\")"
        );
    }

    #[test]
    fn test_sqlite_inline_primary_key() {
        let driver = MemoryDriver::new(SqlDialect::SQLite);
        let mut forge = Forge::new(&driver);
        forge.add_field_str("id").unwrap();

        let statements = forge.create_table_sql("widgets", true, &[]).unwrap();
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS \"widgets\" (\n\t\"id\" INTEGER PRIMARY KEY AUTOINCREMENT\n)"
        );
    }

    #[test]
    fn test_column_rendering_order() {
        let driver = MemoryDriver::new(SqlDialect::MySQL);
        let mut forge = Forge::new(&driver);
        forge
            .add_field(
                "qty",
                Field::new("INT").constraint(11).unsigned().default(0i64).nullable(false).unique(),
            )
            .unwrap()
            .add_field("note", Field::new("TEXT").default_null())
            .unwrap()
            .add_field("created_at", Field::new("DATETIME").default_raw("CURRENT_TIMESTAMP"))
            .unwrap()
            .add_field("status", Field::new("ENUM").values(&["on", "off"]))
            .unwrap();

        let sql = &forge.create_table_sql("stock", false, &[]).unwrap()[0];
        assert!(sql.contains("`qty` INT(11) UNSIGNED DEFAULT 0 NOT NULL UNIQUE"));
        assert!(sql.contains("`note` TEXT DEFAULT NULL NULL"));
        assert!(sql.contains("`created_at` DATETIME DEFAULT CURRENT_TIMESTAMP NOT NULL"));
        assert!(sql.contains("`status` ENUM('on','off') NOT NULL"));
    }

    #[test]
    fn test_unsigned_modes() {
        let mut column = Column {
            type_name: "INT".to_string(),
            ..Column::default()
        };
        apply_unsigned(UnsignedSupport::Always, &mut column);
        assert_eq!(column.unsigned, " UNSIGNED");

        let mut column = Column {
            type_name: "INT".to_string(),
            ..Column::default()
        };
        apply_unsigned(UnsignedSupport::Never, &mut column);
        assert!(column.unsigned.is_empty());

        let mut column = Column {
            type_name: "int".to_string(),
            ..Column::default()
        };
        apply_unsigned(SqlDialect::PostgreSQL.unsigned_support(), &mut column);
        assert_eq!(column.type_name, "BIGINT");
        assert!(column.unsigned.is_empty());

        let mut column = Column {
            type_name: "VARCHAR".to_string(),
            ..Column::default()
        };
        apply_unsigned(SqlDialect::MySQL.unsigned_support(), &mut column);
        assert!(column.unsigned.is_empty());
    }

    #[test]
    fn test_auto_increment_requires_integer_type() {
        let driver = MemoryDriver::new(SqlDialect::MySQL);
        let mut forge = Forge::new(&driver);
        forge
            .add_field("code", Field::new("VARCHAR").constraint(20).auto_increment())
            .unwrap();

        let sql = &forge.create_table_sql("codes", false, &[]).unwrap()[0];
        assert!(sql.contains("`code` VARCHAR(20) NOT NULL"));
        assert!(!sql.contains("AUTO_INCREMENT"));
    }

    #[test]
    fn test_add_field_replaces_in_place() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = Forge::new(&driver);
        forge
            .add_field("a", Field::new("INT"))
            .unwrap()
            .add_field("b", Field::new("INT"))
            .unwrap()
            .add_field("a", Field::new("VARCHAR").constraint(10))
            .unwrap();

        let sql = &forge.create_table_sql("t", false, &[]).unwrap()[0];
        assert_eq!(sql, "CREATE TABLE \"t\" (\n\t\"a\" VARCHAR(10) NOT NULL,\n\t\"b\" INT NOT NULL\n)");
    }

    #[test]
    fn test_add_field_str_validation() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = Forge::new(&driver);

        assert!(matches!(forge.add_field_str("bad"), Err(MigrationError::Usage(_))));
        forge.add_field_str("title VARCHAR(20) NOT NULL").unwrap();
        let sql = &forge.create_table_sql("posts", false, &[]).unwrap()[0];
        assert!(sql.contains("\n\ttitle VARCHAR(20) NOT NULL"));
    }

    #[test]
    fn test_foreign_keys() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL)
            .with_settings(ConnectionSettings::default().with_prefix("app_"));
        let mut forge = Forge::new(&driver);

        let err = forge
            .add_foreign_key("user_id", "users", "id", "", "CASCADE")
            .err()
            .unwrap();
        assert!(matches!(err, MigrationError::Schema(_)));

        forge
            .add_field("user_id", Field::new("INT"))
            .unwrap()
            .add_foreign_key("user_id", "users", "id", "explode", "cascade")
            .unwrap();

        let sql = &forge.create_table_sql("posts", false, &[]).unwrap()[0];
        assert!(sql.contains(
            "CONSTRAINT \"app_posts_user_id_foreign\" FOREIGN KEY(\"user_id\") REFERENCES \"app_users\" (\"id\") ON DELETE CASCADE"
        ));
        assert!(!sql.contains("ON UPDATE"));
        assert_eq!(forge.foreign_key_name("posts", "user_id"), "app_posts_user_id_foreign");
    }

    #[tokio::test]
    async fn test_create_table_requires_fields_and_resets() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = Forge::new(&driver);

        let err = forge.create_table("empty", false, &[]).await.unwrap_err();
        assert!(matches!(err, MigrationError::Usage(_)));

        forge.add_field_str("id").unwrap();
        assert!(forge.create_table("widgets", false, &[]).await.unwrap());
        assert!(!forge.has_declarations());
        assert!(driver.has_table("widgets"));

        let err = forge.create_table("again", false, &[]).await.unwrap_err();
        assert!(matches!(err, MigrationError::Usage(_)));
    }

    #[tokio::test]
    async fn test_create_table_if_not_exists_emulation() {
        let driver = MemoryDriver::new(SqlDialect::SqlServer);
        driver.add_table("widgets");
        let mut forge = Forge::new(&driver);
        forge.add_field_str("id").unwrap();

        assert!(forge.create_table("widgets", true, &[]).await.unwrap());
        assert!(driver.executed().is_empty());
        assert!(!forge.has_declarations());
    }

    #[tokio::test]
    async fn test_drop_table_restores_foreign_key_checks_on_failure() {
        let driver = MemoryDriver::new(SqlDialect::MySQL);
        driver.fail_on("DROP TABLE");
        let mut forge = Forge::new(&driver);

        let err = forge.drop_table("widgets", false, false).await.unwrap_err();
        assert!(matches!(err, MigrationError::Database(_)));
        assert_eq!(
            driver.executed(),
            vec!["SET FOREIGN_KEY_CHECKS = 0".to_string(), "SET FOREIGN_KEY_CHECKS = 1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_drop_table_if_exists_emulation() {
        let driver = MemoryDriver::new(SqlDialect::SqlServer);
        let mut forge = Forge::new(&driver);
        assert!(forge.drop_table("missing", true, false).await.unwrap());
        assert!(driver.executed().is_empty());

        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = Forge::new(&driver);
        driver.add_table("posts");
        assert!(forge.drop_table("posts", true, true).await.unwrap());
        assert!(driver
            .executed()
            .contains(&"DROP TABLE IF EXISTS \"posts\" CASCADE".to_string()));
        assert!(!driver.has_table("posts"));
    }

    #[tokio::test]
    async fn test_lenient_mode_returns_false() {
        let driver = MemoryDriver::new(SqlDialect::SQLite);
        let forge = Forge::new(&driver).lenient();
        assert!(!forge.drop_database("app").await.unwrap());

        let strict = Forge::new(&driver);
        let err = strict.drop_database("app").await.unwrap_err();
        assert!(matches!(err, MigrationError::FeatureUnavailable(_)));
    }

    #[tokio::test]
    async fn test_column_alterations() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        let mut forge = Forge::new(&driver);

        forge
            .add_column("users", vec![("nickname", Field::new("VARCHAR").constraint(50).nullable(true))])
            .await
            .unwrap();
        forge.drop_column("users", &["a", "b"]).await.unwrap();
        forge
            .modify_column(
                "users",
                vec![("nickname", Field::new("VARCHAR").constraint(80).nullable(false).rename_to("handle"))],
            )
            .await
            .unwrap();
        forge.rename_table("users", "members").await.unwrap();

        assert_eq!(
            driver.executed(),
            vec![
                "ALTER TABLE \"users\" ADD \"nickname\" VARCHAR(50) NULL".to_string(),
                "ALTER TABLE \"users\" DROP COLUMN \"a\", DROP COLUMN \"b\"".to_string(),
                "ALTER TABLE \"users\" ALTER COLUMN \"nickname\" TYPE VARCHAR(80)".to_string(),
                "ALTER TABLE \"users\" ALTER COLUMN \"nickname\" SET NOT NULL".to_string(),
                "ALTER TABLE \"users\" RENAME COLUMN \"nickname\" TO \"handle\"".to_string(),
                "ALTER TABLE \"users\" RENAME TO \"members\"".to_string(),
            ]
        );
        assert!(!forge.has_declarations());
    }

    #[tokio::test]
    async fn test_modify_column_unavailable_on_sqlite() {
        let driver = MemoryDriver::new(SqlDialect::SQLite);
        let mut forge = Forge::new(&driver);
        let err = forge
            .modify_column("users", vec![("name", Field::new("TEXT"))])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::FeatureUnavailable(_)));
        assert!(!forge.has_declarations());
    }

    #[tokio::test]
    async fn test_create_database_emulates_if_not_exists() {
        let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
        driver.add_database("app");
        let forge = Forge::new(&driver);

        assert!(forge.create_database("app", true).await.unwrap());
        assert!(driver.executed().is_empty());

        assert!(forge.create_database("other", true).await.unwrap());
        assert_eq!(driver.executed(), vec!["CREATE DATABASE \"other\"".to_string()]);
    }
}

//! Field, key and foreign-key declarations accumulated by [`super::Forge`]

use crate::backends::DatabaseValue;

/// Length or value-list constraint attached to a column type
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Rendered as `(<length>)`, e.g. `255` or `10,2`
    Length(String),
    /// Rendered as a quoted value list for `ENUM`/`SET` types
    Values(Vec<String>),
}

impl From<u32> for Constraint {
    fn from(value: u32) -> Self {
        Constraint::Length(value.to_string())
    }
}

impl From<&str> for Constraint {
    fn from(value: &str) -> Self {
        Constraint::Length(value.to_string())
    }
}

/// Column default
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// `DEFAULT NULL`; implies a nullable column
    Null,
    /// A value escaped through the dialect
    Value(DatabaseValue),
    /// Emitted verbatim, e.g. `CURRENT_TIMESTAMP`
    Raw(String),
}

/// Typed column declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub type_name: String,
    pub constraint: Option<Constraint>,
    pub unsigned: bool,
    pub null: Option<bool>,
    pub default: Option<DefaultValue>,
    pub auto_increment: bool,
    pub unique: bool,
    pub new_name: Option<String>,
}

impl Field {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            constraint: None,
            unsigned: false,
            null: None,
            default: None,
            auto_increment: false,
            unique: false,
            new_name: None,
        }
    }

    pub fn constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// Value list for `ENUM`/`SET` columns
    pub fn values(mut self, values: &[&str]) -> Self {
        self.constraint = Some(Constraint::Values(
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn nullable(mut self, null: bool) -> Self {
        self.null = Some(null);
        self
    }

    pub fn default(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_raw(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Raw(expression.into()));
        self
    }

    pub fn default_null(mut self) -> Self {
        self.default = Some(DefaultValue::Null);
        self
    }

    /// Only honoured on integer-family types
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// New column name when used with `modify_column`
    pub fn rename_to(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    /// Whether the declared type belongs to the integer family
    pub fn is_integer_type(&self) -> bool {
        self.type_name.to_lowercase().contains("int")
    }
}

/// One entry of the declaration buffer
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefinition {
    Named { name: String, field: Field },
    /// A complete column definition emitted as-is
    Literal(String),
}

impl FieldDefinition {
    pub fn name(&self) -> Option<&str> {
        match self {
            FieldDefinition::Named { name, .. } => Some(name),
            FieldDefinition::Literal(_) => None,
        }
    }
}

/// Referential action accepted for `ON DELETE` / `ON UPDATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    NoAction,
    Restrict,
    SetDefault,
}

impl ReferentialAction {
    /// Parse an action case-insensitively; unknown actions yield `None`
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim().to_uppercase().as_str() {
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Foreign key declared on a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

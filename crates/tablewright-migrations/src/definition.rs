//! Table, column, and alter-clause definitions.
//!
//! These types are the in-memory form of a schema change request. They are
//! request-scoped: the engine validates them, turns them into DDL, and
//! persists them as a [`MigrationRecord`] before discarding them.
//!
//! [`ColumnPayload`] is the permissive JSON shape shared by every request
//! and record. [`ColumnSpec`], [`ColumnRename`], and [`ColumnChange`] are the
//! strict per-operation views built from it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tablewright_core::{TablewrightError, ValidationError};

use crate::identifier::{validate_identifier, SqlType};

// ── Defaults ─────────────────────────────────────────────────────────────

/// A column default.
///
/// Text is always emitted as an escaped string literal. The three keyword
/// variants are the only raw SQL a default can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScalarDefault", into = "ScalarDefault")]
pub enum DefaultValue {
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating-point literal.
    Float(f64),
    /// A string literal.
    Text(String),
    /// `CURRENT_TIMESTAMP`.
    CurrentTimestamp,
    /// `CURRENT_DATE`.
    CurrentDate,
    /// `CURRENT_TIME`.
    CurrentTime,
}

/// The JSON form of a default: any scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ScalarDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<ScalarDefault> for DefaultValue {
    fn from(raw: ScalarDefault) -> Self {
        match raw {
            ScalarDefault::Bool(b) => Self::Bool(b),
            ScalarDefault::Int(i) => Self::Int(i),
            ScalarDefault::Float(f) => Self::Float(f),
            ScalarDefault::Text(s) => match s.to_ascii_uppercase().as_str() {
                "CURRENT_TIMESTAMP" | "NOW()" => Self::CurrentTimestamp,
                "CURRENT_DATE" => Self::CurrentDate,
                "CURRENT_TIME" => Self::CurrentTime,
                _ => Self::Text(s),
            },
        }
    }
}

impl From<DefaultValue> for ScalarDefault {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Bool(b) => Self::Bool(b),
            DefaultValue::Int(i) => Self::Int(i),
            DefaultValue::Float(f) => Self::Float(f),
            DefaultValue::Text(s) => Self::Text(s),
            DefaultValue::CurrentTimestamp => Self::Text("CURRENT_TIMESTAMP".into()),
            DefaultValue::CurrentDate => Self::Text("CURRENT_DATE".into()),
            DefaultValue::CurrentTime => Self::Text("CURRENT_TIME".into()),
        }
    }
}

impl From<bool> for DefaultValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DefaultValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

// ── Column payload (JSON) ────────────────────────────────────────────────

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

/// One entry of a request's or record's `columns` array.
///
/// Every field is optional on the wire; which fields matter depends on the
/// operation. For `alter_column`, `unique` and `not_null` given explicitly
/// mean add (`true`) or remove (`false`) and absent means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPayload {
    /// The column name.
    #[serde(default)]
    pub name: String,
    /// The column type (the new type for `alter_column`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sql_type: Option<String>,
    /// Part of the primary key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary: bool,
    /// `UNIQUE` constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    /// `NOT NULL` constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
    /// Default value. `null` means no default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Auto-incrementing integer.
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    /// Target name for `rename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    /// Drops the default in `alter_column`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub drop_default: bool,
}

impl ColumnPayload {
    /// Creates a payload carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

// ── Create ───────────────────────────────────────────────────────────────

/// A full column definition, as used by `create` and `add`.
///
/// # Examples
///
/// ```
/// use tablewright_migrations::definition::ColumnSpec;
///
/// let id = ColumnSpec::new("id", "INTEGER").primary().auto_increment();
/// assert!(id.primary && id.auto_increment);
/// assert!(!id.not_null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnPayload", into = "ColumnPayload")]
pub struct ColumnSpec {
    /// The column name.
    pub name: String,
    /// The column type as written in the request.
    pub sql_type: String,
    /// Part of the primary key.
    pub primary: bool,
    /// `UNIQUE` constraint.
    pub unique: bool,
    /// `NOT NULL` constraint.
    pub not_null: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Auto-incrementing integer.
    pub auto_increment: bool,
}

impl ColumnSpec {
    /// Creates a nullable column with no constraints.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary: false,
            unique: false,
            not_null: false,
            default: None,
            auto_increment: false,
        }
    }

    /// Marks the column as (part of) the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Adds a `UNIQUE` constraint.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a `NOT NULL` constraint.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the column as auto-incrementing.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.name, "column")?;
        SqlType::parse(&self.sql_type)?;
        if let Some(DefaultValue::Float(f)) = self.default {
            if !f.is_finite() {
                return Err(ValidationError::new(
                    "default must be a finite number",
                    "invalid_default",
                ));
            }
        }
        Ok(())
    }
}

impl TryFrom<ColumnPayload> for ColumnSpec {
    type Error = ValidationError;

    fn try_from(payload: ColumnPayload) -> Result<Self, Self::Error> {
        let sql_type = payload.sql_type.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            ValidationError::new("type is required", "required").with_column(payload.name.clone())
        })?;
        Ok(Self {
            name: payload.name,
            sql_type,
            primary: payload.primary,
            unique: payload.unique.unwrap_or(false),
            not_null: payload.not_null.unwrap_or(false),
            default: payload.default,
            auto_increment: payload.auto_increment,
        })
    }
}

impl From<ColumnSpec> for ColumnPayload {
    fn from(spec: ColumnSpec) -> Self {
        Self {
            name: spec.name,
            sql_type: Some(spec.sql_type),
            primary: spec.primary,
            unique: spec.unique.then_some(true),
            not_null: spec.not_null.then_some(true),
            default: spec.default,
            auto_increment: spec.auto_increment,
            new_name: None,
            drop_default: false,
        }
    }
}

/// A table and its ordered columns.
///
/// # Examples
///
/// ```
/// use tablewright_migrations::definition::{ColumnSpec, TableDefinition};
///
/// let widgets = TableDefinition::new("widgets")
///     .column(ColumnSpec::new("id", "INTEGER").primary().auto_increment())
///     .column(ColumnSpec::new("label", "VARCHAR(100)").not_null());
/// assert!(widgets.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// The table name.
    pub table: String,
    /// The columns, in DDL order.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl TableDefinition {
    /// Creates a definition with no columns.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Checks names, types, and column uniqueness.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.table, "table")?;
        if self.columns.is_empty() {
            return Err(
                ValidationError::new("at least one column is required", "required")
                    .with_table(&self.table),
            );
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            column.validate().map_err(|e| with_context(e, &self.table, &column.name))?;
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(ValidationError::new("duplicate column name", "duplicate_column")
                    .with_table(&self.table)
                    .with_column(&column.name));
            }
        }
        Ok(())
    }
}

fn with_context(err: ValidationError, table: &str, column: &str) -> ValidationError {
    let err = if err.table.is_none() { err.with_table(table) } else { err };
    if err.column.is_none() && !column.is_empty() {
        err.with_column(column)
    } else {
        err
    }
}

// ── Alter ────────────────────────────────────────────────────────────────

/// The four alter clause kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    /// `ADD COLUMN`.
    Add,
    /// `DROP COLUMN`.
    Drop,
    /// `RENAME COLUMN`.
    Rename,
    /// Type, default, and constraint changes to existing columns.
    AlterColumn,
}

impl ClauseKind {
    /// Returns the wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Drop => "drop",
            Self::Rename => "rename",
            Self::AlterColumn => "alter_column",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClauseKind {
    type Err = TablewrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "drop" => Ok(Self::Drop),
            "rename" => Ok(Self::Rename),
            "alter_column" => Ok(Self::AlterColumn),
            other => Err(TablewrightError::UnsupportedOperation(format!(
                "unknown alter clause '{other}'"
            ))),
        }
    }
}

/// Renames `name` to `new_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRename {
    /// The current column name.
    pub name: String,
    /// The new column name.
    pub new_name: String,
}

/// A default-value mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultChange {
    /// `SET DEFAULT`.
    Set(DefaultValue),
    /// `DROP DEFAULT`.
    Drop,
}

/// Property changes for one existing column. `None` leaves a property alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnChange {
    /// The column to change.
    pub name: String,
    /// A new type.
    pub new_type: Option<String>,
    /// A default mutation.
    pub default: Option<DefaultChange>,
    /// `Some(true)` adds `NOT NULL`, `Some(false)` removes it.
    pub not_null: Option<bool>,
    /// `Some(true)` adds `UNIQUE`, `Some(false)` removes it.
    pub unique: Option<bool>,
}

impl ColumnChange {
    /// Creates a change that mutates nothing yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when no property is mutated.
    pub fn is_empty(&self) -> bool {
        self.new_type.is_none()
            && self.default.is_none()
            && self.not_null.is_none()
            && self.unique.is_none()
    }
}

/// The mutation list of an alter request.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterClause {
    /// Columns to add.
    Add(Vec<ColumnSpec>),
    /// Column names to drop.
    Drop(Vec<String>),
    /// Columns to rename.
    Rename(Vec<ColumnRename>),
    /// Existing columns to change.
    AlterColumn(Vec<ColumnChange>),
}

impl AlterClause {
    /// Returns the clause kind.
    pub const fn kind(&self) -> ClauseKind {
        match self {
            Self::Add(_) => ClauseKind::Add,
            Self::Drop(_) => ClauseKind::Drop,
            Self::Rename(_) => ClauseKind::Rename,
            Self::AlterColumn(_) => ClauseKind::AlterColumn,
        }
    }

    /// Returns the number of column mutations.
    pub fn len(&self) -> usize {
        match self {
            Self::Add(v) => v.len(),
            Self::Drop(v) => v.len(),
            Self::Rename(v) => v.len(),
            Self::AlterColumn(v) => v.len(),
        }
    }

    /// Returns `true` when there are no mutations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An alter request against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterOperation {
    /// The target table.
    pub table: String,
    /// What to change.
    pub clause: AlterClause,
}

impl AlterOperation {
    /// Creates an alter operation.
    pub fn new(table: impl Into<String>, clause: AlterClause) -> Self {
        Self {
            table: table.into(),
            clause,
        }
    }

    /// Builds an operation from a clause kind and the request's column list.
    ///
    /// Shape errors (a missing `type` on `add`, a missing `new_name` on
    /// `rename`) are reported here; identifiers are checked by
    /// [`validate`](Self::validate).
    pub fn from_payload(
        table: impl Into<String>,
        kind: ClauseKind,
        columns: &[ColumnPayload],
    ) -> Result<Self, ValidationError> {
        let table = table.into();
        let clause = match kind {
            ClauseKind::Add => AlterClause::Add(
                columns
                    .iter()
                    .cloned()
                    .map(ColumnSpec::try_from)
                    .collect::<Result<Vec<_>, ValidationError>>()
                    .map_err(|e| e.with_table(&table))?,
            ),
            ClauseKind::Drop => {
                AlterClause::Drop(columns.iter().map(|c| c.name.clone()).collect())
            }
            ClauseKind::Rename => AlterClause::Rename(
                columns
                    .iter()
                    .map(|c| {
                        let new_name = c.new_name.clone().ok_or_else(|| {
                            ValidationError::new("new_name is required for rename", "required")
                                .with_table(&table)
                                .with_column(&c.name)
                        })?;
                        Ok(ColumnRename {
                            name: c.name.clone(),
                            new_name,
                        })
                    })
                    .collect::<Result<_, ValidationError>>()?,
            ),
            ClauseKind::AlterColumn => AlterClause::AlterColumn(
                columns
                    .iter()
                    .map(|c| ColumnChange {
                        name: c.name.clone(),
                        new_type: c.sql_type.clone(),
                        default: if c.drop_default {
                            Some(DefaultChange::Drop)
                        } else {
                            c.default.clone().map(DefaultChange::Set)
                        },
                        not_null: c.not_null,
                        unique: c.unique,
                    })
                    .collect(),
            ),
        };
        Ok(Self { table, clause })
    }

    /// Returns the column list in its JSON form.
    pub fn to_payload(&self) -> Vec<ColumnPayload> {
        match &self.clause {
            AlterClause::Add(specs) => specs.iter().cloned().map(ColumnPayload::from).collect(),
            AlterClause::Drop(names) => names.iter().map(ColumnPayload::named).collect(),
            AlterClause::Rename(renames) => renames
                .iter()
                .map(|r| ColumnPayload {
                    new_name: Some(r.new_name.clone()),
                    ..ColumnPayload::named(&r.name)
                })
                .collect(),
            AlterClause::AlterColumn(changes) => changes
                .iter()
                .map(|c| ColumnPayload {
                    sql_type: c.new_type.clone(),
                    unique: c.unique,
                    not_null: c.not_null,
                    default: match &c.default {
                        Some(DefaultChange::Set(v)) => Some(v.clone()),
                        _ => None,
                    },
                    drop_default: matches!(c.default, Some(DefaultChange::Drop)),
                    ..ColumnPayload::named(&c.name)
                })
                .collect(),
        }
    }

    /// Checks names, types, and that every mutation changes something.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.table, "table")?;
        if self.clause.is_empty() {
            return Err(ValidationError::new(
                format!("{} requires at least one column", self.clause.kind()),
                "required",
            )
            .with_table(&self.table));
        }
        let ctx = |e, column: &str| with_context(e, &self.table, column);
        match &self.clause {
            AlterClause::Add(specs) => {
                for spec in specs {
                    spec.validate().map_err(|e| ctx(e, &spec.name))?;
                }
            }
            AlterClause::Drop(names) => {
                for name in names {
                    validate_identifier(name, "column").map_err(|e| ctx(e, name))?;
                }
            }
            AlterClause::Rename(renames) => {
                for r in renames {
                    validate_identifier(&r.name, "column").map_err(|e| ctx(e, &r.name))?;
                    validate_identifier(&r.new_name, "column").map_err(|e| ctx(e, &r.name))?;
                }
            }
            AlterClause::AlterColumn(changes) => {
                for change in changes {
                    validate_identifier(&change.name, "column")
                        .map_err(|e| ctx(e, &change.name))?;
                    if change.is_empty() {
                        return Err(ctx(
                            ValidationError::new("alter_column changes nothing", "empty_change"),
                            &change.name,
                        ));
                    }
                    if let Some(ty) = &change.new_type {
                        SqlType::parse(ty).map_err(|e| ctx(e, &change.name))?;
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// The three kinds of recorded migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationKind {
    /// `CREATE TABLE`.
    Create,
    /// `ALTER TABLE`.
    Alter,
    /// `DROP TABLE`.
    Delete,
}

impl MigrationKind {
    /// Returns the tag used in migration filenames.
    pub const fn file_tag(self) -> &'static str {
        match self {
            Self::Create => "create_table",
            Self::Alter => "alter_table",
            Self::Delete => "delete_table",
        }
    }

    /// Parses a filename tag.
    pub fn from_file_tag(tag: &str) -> Option<Self> {
        match tag {
            "create_table" => Some(Self::Create),
            "alter_table" => Some(Self::Alter),
            "delete_table" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns the wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The on-disk payload of one migration.
///
/// `kind` is absent in records written before it was added; the filename
/// tag is authoritative then. `clause` is kept as raw text so an unknown
/// clause surfaces as an unsupported operation rather than a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// The migration kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MigrationKind>,
    /// The target table.
    pub table: String,
    /// The column payloads.
    #[serde(default)]
    pub columns: Vec<ColumnPayload>,
    /// The alter clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause: Option<String>,
}

impl MigrationRecord {
    /// A `create` record.
    pub fn create(definition: &TableDefinition) -> Self {
        Self {
            kind: Some(MigrationKind::Create),
            table: definition.table.clone(),
            columns: definition
                .columns
                .iter()
                .cloned()
                .map(ColumnPayload::from)
                .collect(),
            clause: None,
        }
    }

    /// An `alter` record.
    pub fn alter(operation: &AlterOperation) -> Self {
        Self {
            kind: Some(MigrationKind::Alter),
            table: operation.table.clone(),
            columns: operation.to_payload(),
            clause: Some(operation.clause.kind().as_str().to_string()),
        }
    }

    /// A `delete` record for one table.
    pub fn delete(table: impl Into<String>) -> Self {
        Self {
            kind: Some(MigrationKind::Delete),
            table: table.into(),
            columns: Vec::new(),
            clause: None,
        }
    }

    /// Rebuilds the create definition.
    pub fn to_definition(&self) -> Result<TableDefinition, TablewrightError> {
        let columns = self
            .columns
            .iter()
            .cloned()
            .map(ColumnSpec::try_from)
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(|e| e.with_table(&self.table))?;
        Ok(TableDefinition {
            table: self.table.clone(),
            columns,
        })
    }

    /// Rebuilds the alter operation.
    pub fn to_alter_operation(&self) -> Result<AlterOperation, TablewrightError> {
        let clause = self.clause.as_deref().ok_or_else(|| {
            TablewrightError::from(
                ValidationError::new("clause is required for alter", "required")
                    .with_table(&self.table),
            )
        })?;
        let kind: ClauseKind = clause.parse()?;
        Ok(AlterOperation::from_payload(&self.table, kind, &self.columns)?)
    }
}

//! DDL builders.
//!
//! The [`DdlBuilder`] trait turns definitions into dialect-specific DDL.
//! Each dialect supplies the handful of spellings that differ (the
//! auto-increment keyword, default literals, `alter_column` clauses, how
//! alter sub-clauses are grouped) and shares the rest through default
//! methods. The trait returns `Vec<String>` because some operations need
//! more than one statement on some dialects.
//!
//! Every identifier is validated and quoted, every type string is parsed
//! against an allow-listed grammar, and defaults are rendered from typed
//! values, so no request text reaches SQL verbatim.

use tablewright_core::{TablewrightError, TablewrightResult, ValidationError};
use tablewright_db_backends::Dialect;

use crate::definition::{
    AlterClause, AlterOperation, ColumnChange, ColumnSpec, DefaultChange, DefaultValue,
    MigrationKind, MigrationRecord, TableDefinition,
};
use crate::identifier::{quote_identifier, validate_identifier, SqlType};

/// Generates DDL for one dialect.
pub trait DdlBuilder: Send + Sync {
    /// Returns the dialect this builder targets.
    fn dialect(&self) -> Dialect;

    /// Quotes an identifier.
    fn quote(&self, name: &str) -> String {
        quote_identifier(self.dialect(), name)
    }

    /// Renders the column's type together with its auto-increment keyword.
    fn column_type_sql(&self, column: &ColumnSpec) -> Result<String, ValidationError>;

    /// Text emitted right after `PRIMARY KEY`.
    fn after_primary_key_sql(&self, _column: &ColumnSpec) -> &'static str {
        ""
    }

    /// Renders a default literal.
    fn default_sql(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            DefaultValue::CurrentDate => "CURRENT_DATE".to_string(),
            DefaultValue::CurrentTime => "CURRENT_TIME".to_string(),
        }
    }

    /// Renders one column definition.
    ///
    /// Clause order is fixed: type, auto-increment keyword, `PRIMARY KEY`,
    /// `UNIQUE`, `NOT NULL`, `DEFAULT`. `inline_primary` is `false` when the
    /// primary key is declared at table level instead.
    fn column_sql(
        &self,
        column: &ColumnSpec,
        inline_primary: bool,
    ) -> Result<String, ValidationError> {
        let mut sql = format!("{} {}", self.quote(&column.name), self.column_type_sql(column)?);
        if column.primary && inline_primary {
            sql.push_str(" PRIMARY KEY");
            sql.push_str(self.after_primary_key_sql(column));
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_sql(default));
        }
        Ok(sql)
    }

    /// Generates `CREATE TABLE IF NOT EXISTS`.
    fn build_create(&self, definition: &TableDefinition) -> TablewrightResult<Vec<String>> {
        definition.validate()?;
        let primaries: Vec<&ColumnSpec> =
            definition.columns.iter().filter(|c| c.primary).collect();
        let inline_primary = primaries.len() <= 1;

        let mut parts = definition
            .columns
            .iter()
            .map(|c| {
                self.column_sql(c, inline_primary)
                    .map_err(|e| e.with_table(&definition.table).with_column(&c.name))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !inline_primary {
            let cols: Vec<String> = primaries.iter().map(|c| self.quote(&c.name)).collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        Ok(vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quote(&definition.table),
            parts.join(", ")
        )])
    }

    /// Renders the `alter_column` sub-clauses for `table`.
    fn alter_column_clauses(
        &self,
        table: &str,
        changes: &[ColumnChange],
    ) -> TablewrightResult<Vec<String>>;

    /// Groups `ALTER TABLE` sub-clauses into statements. By default they
    /// are comma-joined into a single statement.
    fn alter_statements(&self, quoted_table: &str, clauses: Vec<String>) -> Vec<String> {
        vec![format!("ALTER TABLE {quoted_table} {}", clauses.join(", "))]
    }

    /// Generates `ALTER TABLE` for an add, drop, rename, or alter_column.
    fn build_alter(&self, operation: &AlterOperation) -> TablewrightResult<Vec<String>> {
        operation.validate()?;
        let table = &operation.table;
        let clauses = match &operation.clause {
            AlterClause::Add(specs) => specs
                .iter()
                .map(|c| {
                    self.column_sql(c, true)
                        .map(|sql| format!("ADD COLUMN {sql}"))
                        .map_err(|e| e.with_table(table).with_column(&c.name))
                })
                .collect::<Result<Vec<_>, _>>()?,
            AlterClause::Drop(names) => names
                .iter()
                .map(|n| format!("DROP COLUMN {}", self.quote(n)))
                .collect(),
            AlterClause::Rename(renames) => renames
                .iter()
                .map(|r| {
                    format!(
                        "RENAME COLUMN {} TO {}",
                        self.quote(&r.name),
                        self.quote(&r.new_name)
                    )
                })
                .collect(),
            AlterClause::AlterColumn(changes) => self.alter_column_clauses(table, changes)?,
        };
        Ok(self.alter_statements(&self.quote(table), clauses))
    }

    /// Generates one `DROP TABLE IF EXISTS` per table.
    fn build_drop(&self, tables: &[String]) -> TablewrightResult<Vec<String>> {
        if tables.is_empty() {
            return Err(ValidationError::new("at least one table is required", "required").into());
        }
        tables
            .iter()
            .map(|t| {
                validate_identifier(t, "table").map_err(|e| e.with_table(t))?;
                Ok(format!("DROP TABLE IF EXISTS {}", self.quote(t)))
            })
            .collect()
    }

    /// Generates the DDL a stored record describes.
    fn build_record(
        &self,
        kind: MigrationKind,
        record: &MigrationRecord,
    ) -> TablewrightResult<Vec<String>> {
        match kind {
            MigrationKind::Create => self.build_create(&record.to_definition()?),
            MigrationKind::Alter => self.build_alter(&record.to_alter_operation()?),
            MigrationKind::Delete => self.build_drop(std::slice::from_ref(&record.table)),
        }
    }
}

/// Returns the builder for `dialect`.
pub fn builder_for(dialect: Dialect) -> Box<dyn DdlBuilder> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresDdlBuilder),
        Dialect::MySql => Box::new(MySqlDdlBuilder),
        Dialect::Sqlite => Box::new(SqliteDdlBuilder),
    }
}

fn parse_type(dialect: Dialect, raw: &str) -> Result<SqlType, ValidationError> {
    SqlType::parse(raw)?.normalize(dialect)
}

fn require_integer(ty: &SqlType) -> Result<(), ValidationError> {
    if ty.is_integer() {
        Ok(())
    } else {
        Err(ValidationError::new(
            format!("auto_increment requires an integer type, got {ty}"),
            "invalid_auto_increment",
        ))
    }
}

fn with_column_context(err: ValidationError, table: &str, column: &str) -> TablewrightError {
    err.with_table(table).with_column(column).into()
}

// ── PostgreSQL ───────────────────────────────────────────────────────────

/// DDL builder for PostgreSQL.
///
/// Auto-increment is spelled with the serial pseudo-types and
/// `alter_column` decomposes into one `ALTER COLUMN` sub-clause per
/// mutated property.
pub struct PostgresDdlBuilder;

/// Longest identifier Postgres keeps (`NAMEDATALEN - 1`).
const PG_MAX_IDENTIFIER: usize = 63;

impl PostgresDdlBuilder {
    /// The name Postgres gives a column's unique constraint: `<t>_<c>_key`,
    /// with the longer of table and column trimmed one byte at a time until
    /// the whole name fits in 63 bytes. Identifiers are ASCII, so bytes and
    /// chars coincide.
    fn unique_constraint_name(table: &str, column: &str) -> String {
        const LABEL: &str = "key";
        let available = PG_MAX_IDENTIFIER - (LABEL.len() + 2);
        let (mut table_len, mut column_len) = (table.len(), column.len());
        while table_len + column_len > available {
            if table_len > column_len {
                table_len -= 1;
            } else {
                column_len -= 1;
            }
        }
        format!("{}_{}_{LABEL}", &table[..table_len], &column[..column_len])
    }
}

impl DdlBuilder for PostgresDdlBuilder {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> Result<String, ValidationError> {
        let ty = parse_type(Dialect::Postgres, &column.sql_type)?;
        if !column.auto_increment {
            return Ok(ty.to_string());
        }
        match ty.base.as_str() {
            "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" => Ok(ty.base.clone()),
            "BIGINT" | "INT8" => Ok("BIGSERIAL".to_string()),
            "SMALLINT" | "INT2" => Ok("SMALLSERIAL".to_string()),
            _ => {
                require_integer(&ty)?;
                Ok("SERIAL".to_string())
            }
        }
    }

    fn alter_column_clauses(
        &self,
        table: &str,
        changes: &[ColumnChange],
    ) -> TablewrightResult<Vec<String>> {
        let mut clauses = Vec::new();
        for change in changes {
            let col = self.quote(&change.name);
            if let Some(ty) = &change.new_type {
                let ty = parse_type(Dialect::Postgres, ty)
                    .map_err(|e| with_column_context(e, table, &change.name))?;
                clauses.push(format!("ALTER COLUMN {col} TYPE {ty}"));
            }
            match &change.default {
                Some(DefaultChange::Set(value)) => clauses.push(format!(
                    "ALTER COLUMN {col} SET DEFAULT {}",
                    self.default_sql(value)
                )),
                Some(DefaultChange::Drop) => clauses.push(format!("ALTER COLUMN {col} DROP DEFAULT")),
                None => {}
            }
            match change.not_null {
                Some(true) => clauses.push(format!("ALTER COLUMN {col} SET NOT NULL")),
                Some(false) => clauses.push(format!("ALTER COLUMN {col} DROP NOT NULL")),
                None => {}
            }
            if let Some(add) = change.unique {
                let constraint = self.quote(&Self::unique_constraint_name(table, &change.name));
                if add {
                    clauses.push(format!("ADD CONSTRAINT {constraint} UNIQUE ({col})"));
                } else {
                    clauses.push(format!("DROP CONSTRAINT {constraint}"));
                }
            }
        }
        Ok(clauses)
    }
}

// ── MySQL ────────────────────────────────────────────────────────────────

/// DDL builder for MySQL.
///
/// A type or nullability change has to go through `MODIFY COLUMN`, which
/// restates the whole column: anything left out is reset. Such a change must
/// therefore state the type, nullability, and default together. Default-only
/// and unique-only changes use `ALTER COLUMN ... SET/DROP DEFAULT` and the
/// index clauses, which touch nothing else.
pub struct MySqlDdlBuilder;

impl DdlBuilder for MySqlDdlBuilder {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> Result<String, ValidationError> {
        let ty = parse_type(Dialect::MySql, &column.sql_type)?;
        if column.auto_increment {
            require_integer(&ty)?;
            Ok(format!("{ty} AUTO_INCREMENT"))
        } else {
            Ok(ty.to_string())
        }
    }

    fn default_sql(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Text(s) => {
                format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
            }
            // Only CURRENT_TIMESTAMP is accepted bare; other expressions
            // need parentheses.
            DefaultValue::CurrentDate => "(CURRENT_DATE)".to_string(),
            DefaultValue::CurrentTime => "(CURRENT_TIME)".to_string(),
            DefaultValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }

    fn alter_column_clauses(
        &self,
        table: &str,
        changes: &[ColumnChange],
    ) -> TablewrightResult<Vec<String>> {
        let mut clauses = Vec::new();
        for change in changes {
            let col = self.quote(&change.name);
            let restated = change.new_type.is_some() || change.not_null.is_some();

            if restated {
                let (ty, not_null, default) = match (&change.new_type, change.not_null, &change.default) {
                    (Some(ty), Some(not_null), Some(default)) => (ty, not_null, default),
                    _ => {
                        return Err(with_column_context(
                            ValidationError::new(
                                "MySQL MODIFY COLUMN restates the column: type, not_null, and \
                                 default (or drop_default) must all be given",
                                "incomplete_restatement",
                            ),
                            table,
                            &change.name,
                        ))
                    }
                };
                let ty = parse_type(Dialect::MySql, ty)
                    .map_err(|e| with_column_context(e, table, &change.name))?;

                let mut clause = format!("MODIFY COLUMN {col} {ty}");
                clause.push_str(if not_null { " NOT NULL" } else { " NULL" });
                if let DefaultChange::Set(value) = default {
                    clause.push_str(" DEFAULT ");
                    clause.push_str(&self.default_sql(value));
                }
                clauses.push(clause);
            } else {
                match &change.default {
                    Some(DefaultChange::Set(value)) => clauses.push(format!(
                        "ALTER COLUMN {col} SET DEFAULT {}",
                        alter_default_sql(&self.default_sql(value))
                    )),
                    Some(DefaultChange::Drop) => {
                        clauses.push(format!("ALTER COLUMN {col} DROP DEFAULT"));
                    }
                    None => {}
                }
            }

            match change.unique {
                Some(true) => clauses.push(format!("ADD UNIQUE INDEX {col} ({col})")),
                Some(false) => clauses.push(format!("DROP INDEX {col}")),
                None => {}
            }
        }
        Ok(clauses)
    }
}

/// `ALTER COLUMN ... SET DEFAULT` only takes literals bare; expressions such
/// as `CURRENT_TIMESTAMP` must be parenthesised.
fn alter_default_sql(sql: &str) -> String {
    if sql == "CURRENT_TIMESTAMP" {
        format!("({sql})")
    } else {
        sql.to_string()
    }
}

// ── SQLite ───────────────────────────────────────────────────────────────

/// DDL builder for SQLite.
///
/// SQLite accepts one action per `ALTER TABLE` and cannot change an existing
/// column's definition at all.
pub struct SqliteDdlBuilder;

impl DdlBuilder for SqliteDdlBuilder {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn column_type_sql(&self, column: &ColumnSpec) -> Result<String, ValidationError> {
        let ty = parse_type(Dialect::Sqlite, &column.sql_type)?;
        if !column.auto_increment {
            return Ok(ty.to_string());
        }
        require_integer(&ty)?;
        if !column.primary {
            return Err(ValidationError::new(
                "SQLite only supports auto_increment on the primary key",
                "invalid_auto_increment",
            ));
        }
        // AUTOINCREMENT is only legal on exactly `INTEGER PRIMARY KEY`.
        Ok("INTEGER".to_string())
    }

    fn after_primary_key_sql(&self, column: &ColumnSpec) -> &'static str {
        if column.auto_increment {
            " AUTOINCREMENT"
        } else {
            ""
        }
    }

    fn alter_column_clauses(
        &self,
        table: &str,
        _changes: &[ColumnChange],
    ) -> TablewrightResult<Vec<String>> {
        Err(TablewrightError::UnsupportedOperation(format!(
            "SQLite cannot alter existing columns (table '{table}')"
        )))
    }

    fn alter_statements(&self, quoted_table: &str, clauses: Vec<String>) -> Vec<String> {
        clauses
            .into_iter()
            .map(|clause| format!("ALTER TABLE {quoted_table} {clause}"))
            .collect()
    }
}

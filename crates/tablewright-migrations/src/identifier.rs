//! Identifier and column type safety.
//!
//! Table names, column names, and type strings arrive from JSON requests and
//! end up inside DDL text. Nothing reaches SQL without passing through this
//! module: identifiers are checked against `[A-Za-z_][A-Za-z0-9_]*` and then
//! quoted for the target dialect, and type strings must match a small
//! allow-listed grammar before being normalised.

use once_cell::sync::Lazy;
use regex::Regex;
use tablewright_core::ValidationError;
use tablewright_db_backends::Dialect;

/// The longest identifier accepted. PostgreSQL silently truncates past 63
/// bytes, which would make two distinct names collide.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Words allowed after the first word of a multi-word type name.
const TYPE_MODIFIERS: &[&str] = &["PRECISION", "VARYING", "UNSIGNED", "WITH", "WITHOUT", "TIME", "ZONE"];

/// `NAME [NAME]* [(n[,m])] [[]]`, e.g. `VARCHAR(100)`, `DOUBLE PRECISION`,
/// `NUMERIC(10, 2)`, `TEXT[]`.
static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<base>[A-Za-z_][A-Za-z0-9_]*(?:\s+[A-Za-z_][A-Za-z0-9_]*)*)\s*(?P<args>\(\s*\d{1,5}\s*(?:,\s*\d{1,5}\s*)?\))?\s*(?P<array>\[\])?$",
    )
    .expect("valid regex")
});

/// Checks that `name` is a safe identifier.
///
/// `what` names the role of the identifier ("table", "column") in the error.
///
/// # Examples
///
/// ```
/// use tablewright_migrations::identifier::validate_identifier;
///
/// assert!(validate_identifier("order_items", "table").is_ok());
/// assert!(validate_identifier("drop table x;--", "table").is_err());
/// ```
pub fn validate_identifier(name: &str, what: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new(format!("{what} name is required"), "required"));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::new(
            format!("{what} name '{name}' exceeds {MAX_IDENTIFIER_LENGTH} characters"),
            "identifier_too_long",
        ));
    }
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new(
            format!("{what} name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"),
            "invalid_identifier",
        ));
    }
    Ok(())
}

/// Quotes an identifier for `dialect`.
///
/// Callers validate first; embedded quote characters are still doubled so
/// the output is well-formed for any input.
pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::MySql => format!("`{}`", name.replace('`', "``")),
        Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// A column type split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlType {
    /// Upper-cased base name with single spaces, e.g. `DOUBLE PRECISION`.
    pub base: String,
    /// Length/precision arguments without whitespace, e.g. `(10,2)`.
    pub args: Option<String>,
    /// Whether the type is a Postgres array (`[]`).
    pub array: bool,
}

impl SqlType {
    /// Parses and validates a raw type string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::new("type is required", "required"));
        }
        let caps = TYPE_RE.captures(raw).ok_or_else(|| {
            ValidationError::new(format!("type '{raw}' is not a valid column type"), "invalid_type")
        })?;

        let base = caps["base"]
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(word) = base
            .split(' ')
            .skip(1)
            .find(|word| !TYPE_MODIFIERS.contains(word))
        {
            return Err(ValidationError::new(
                format!("type '{raw}' contains unexpected word '{word}'"),
                "invalid_type",
            ));
        }
        let args = caps.name("args").map(|m| {
            m.as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        });

        Ok(Self {
            base,
            args,
            array: caps.name("array").is_some(),
        })
    }

    /// Rewrites the type into the spelling `dialect` expects.
    pub fn normalize(self, dialect: Dialect) -> Result<Self, ValidationError> {
        let Self { base, args, array } = self;
        let (base, args) = match dialect {
            Dialect::Postgres => match (base.as_str(), args.as_deref()) {
                ("TINYINT", Some("(1)")) => ("BOOLEAN".to_string(), None),
                ("TINYINT", _) => ("SMALLINT".to_string(), None),
                ("DATETIME", _) => ("TIMESTAMP".to_string(), args),
                ("DOUBLE", None) => ("DOUBLE PRECISION".to_string(), None),
                ("BLOB" | "LONGBLOB" | "MEDIUMBLOB", _) => ("BYTEA".to_string(), None),
                ("LONGTEXT" | "MEDIUMTEXT", _) => ("TEXT".to_string(), None),
                _ => (base, args),
            },
            Dialect::MySql => {
                if array {
                    return Err(ValidationError::new(
                        format!("array type '{base}[]' is not supported by MySQL"),
                        "unsupported_type",
                    ));
                }
                match (base.as_str(), args.as_deref()) {
                    ("BOOLEAN" | "BOOL", _) => ("TINYINT".to_string(), Some("(1)".to_string())),
                    ("JSONB", _) => ("JSON".to_string(), None),
                    ("BYTEA", _) => ("LONGBLOB".to_string(), None),
                    ("UUID", _) => ("CHAR".to_string(), Some("(36)".to_string())),
                    ("DOUBLE PRECISION", _) => ("DOUBLE".to_string(), None),
                    ("TIMESTAMPTZ", _) => ("TIMESTAMP".to_string(), args),
                    _ => (base, args),
                }
            }
            Dialect::Sqlite => match base.as_str() {
                "JSONB" => ("JSON".to_string(), None),
                _ => (base, args),
            },
        };
        Ok(Self { base, args, array })
    }

    /// Returns `true` for the integer types that can auto-increment.
    pub fn is_integer(&self) -> bool {
        !self.array
            && matches!(
                self.base.as_str(),
                "INT" | "INTEGER" | "INT4" | "BIGINT" | "INT8" | "SMALLINT" | "INT2"
            )
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(args) = &self.args {
            write!(f, "{args}")?;
        }
        if self.array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

/// Validates `raw` and returns its normalised spelling for `dialect`.
///
/// # Examples
///
/// ```
/// use tablewright_db_backends::Dialect;
/// use tablewright_migrations::identifier::normalize_type;
///
/// assert_eq!(normalize_type(Dialect::MySql, "boolean").unwrap(), "TINYINT(1)");
/// assert_eq!(normalize_type(Dialect::Postgres, "varchar( 100 )").unwrap(), "VARCHAR(100)");
/// assert!(normalize_type(Dialect::Postgres, "TEXT; DROP TABLE x").is_err());
/// ```
pub fn normalize_type(dialect: Dialect, raw: &str) -> Result<String, ValidationError> {
    Ok(SqlType::parse(raw)?.normalize(dialect)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["widgets", "_private", "Order2", "a"] {
            assert!(validate_identifier(name, "table").is_ok(), "{name}");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in ["", "2fast", "with space", "semi;colon", "quote\"d", "dash-ed", "ünï"] {
            assert!(validate_identifier(name, "column").is_err(), "{name}");
        }
    }

    #[test]
    fn test_identifier_length_limit() {
        let ok = "a".repeat(MAX_IDENTIFIER_LENGTH);
        let too_long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_identifier(&ok, "table").is_ok());
        let err = validate_identifier(&too_long, "table").unwrap_err();
        assert_eq!(err.code, "identifier_too_long");
    }

    #[test]
    fn test_empty_identifier_is_required() {
        let err = validate_identifier("", "column").unwrap_err();
        assert_eq!(err.code, "required");
        assert_eq!(err.message, "column name is required");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier(Dialect::Postgres, "widgets"), "\"widgets\"");
        assert_eq!(quote_identifier(Dialect::Sqlite, "widgets"), "\"widgets\"");
        assert_eq!(quote_identifier(Dialect::MySql, "widgets"), "`widgets`");
        assert_eq!(quote_identifier(Dialect::MySql, "a`b"), "`a``b`");
        assert_eq!(quote_identifier(Dialect::Postgres, "a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_type_parse_parts() {
        let ty = SqlType::parse("numeric ( 10 , 2 )").unwrap();
        assert_eq!(ty.base, "NUMERIC");
        assert_eq!(ty.args.as_deref(), Some("(10,2)"));
        assert!(!ty.array);

        let ty = SqlType::parse("double   precision").unwrap();
        assert_eq!(ty.to_string(), "DOUBLE PRECISION");

        let ty = SqlType::parse("timestamp with time zone").unwrap();
        assert_eq!(ty.base, "TIMESTAMP WITH TIME ZONE");

        let ty = SqlType::parse("text[]").unwrap();
        assert!(ty.array);
        assert_eq!(ty.to_string(), "TEXT[]");
    }

    #[test]
    fn test_type_rejects_injection() {
        for raw in [
            "",
            "TEXT; DROP TABLE widgets",
            "VARCHAR(100) DEFAULT 'x'",
            "INT)",
            "VARCHAR(abc)",
            "TEXT--",
            "TEXT NOT NULL",
            "INT PRIMARY KEY",
        ] {
            assert!(SqlType::parse(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_normalize_postgres() {
        assert_eq!(normalize_type(Dialect::Postgres, "datetime").unwrap(), "TIMESTAMP");
        assert_eq!(normalize_type(Dialect::Postgres, "double").unwrap(), "DOUBLE PRECISION");
        assert_eq!(normalize_type(Dialect::Postgres, "tinyint(1)").unwrap(), "BOOLEAN");
        assert_eq!(normalize_type(Dialect::Postgres, "longblob").unwrap(), "BYTEA");
        assert_eq!(normalize_type(Dialect::Postgres, "jsonb").unwrap(), "JSONB");
    }

    #[test]
    fn test_normalize_mysql() {
        assert_eq!(normalize_type(Dialect::MySql, "bool").unwrap(), "TINYINT(1)");
        assert_eq!(normalize_type(Dialect::MySql, "jsonb").unwrap(), "JSON");
        assert_eq!(normalize_type(Dialect::MySql, "bytea").unwrap(), "LONGBLOB");
        assert_eq!(normalize_type(Dialect::MySql, "uuid").unwrap(), "CHAR(36)");
        assert_eq!(
            normalize_type(Dialect::MySql, "double precision").unwrap(),
            "DOUBLE"
        );
        assert_eq!(normalize_type(Dialect::MySql, "datetime").unwrap(), "DATETIME");
        let err = normalize_type(Dialect::MySql, "integer[]").unwrap_err();
        assert_eq!(err.code, "unsupported_type");
    }

    #[test]
    fn test_normalize_sqlite_keeps_spelling() {
        assert_eq!(normalize_type(Dialect::Sqlite, "varchar(100)").unwrap(), "VARCHAR(100)");
        assert_eq!(normalize_type(Dialect::Sqlite, "boolean").unwrap(), "BOOLEAN");
    }

    #[test]
    fn test_is_integer() {
        assert!(SqlType::parse("bigint").unwrap().is_integer());
        assert!(SqlType::parse("INT").unwrap().is_integer());
        assert!(!SqlType::parse("integer[]").unwrap().is_integer());
        assert!(!SqlType::parse("numeric(10)").unwrap().is_integer());
    }
}

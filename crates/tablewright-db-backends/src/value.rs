//! Backend-agnostic values and result rows.
//!
//! The migration engine only ever reads back small bookkeeping results (the
//! ledger's `name` and `created_at` columns, `COUNT(*)` probes), so [`Value`]
//! is deliberately narrower than a general ORM value type.

use std::fmt;

use chrono::NaiveDateTime;
use tablewright_core::TablewrightError;

/// A backend-agnostic representation of a database value.
///
/// # Examples
///
/// ```
/// use tablewright_db_backends::Value;
///
/// assert_eq!(Value::from(42_i64), Value::Int(42));
/// assert_eq!(Value::from("widgets"), Value::String("widgets".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A date and time without timezone.
    DateTime(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A single result row: column names paired with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, TablewrightError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                TablewrightError::DatabaseError(format!("Column '{column}' not found in row"))
            })?;
        T::from_value(&self.values[idx])
    }

    /// Gets a typed value by column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the value cannot be
    /// converted to the requested type.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> Result<T, TablewrightError> {
        let value = self.values.get(idx).ok_or_else(|| {
            TablewrightError::DatabaseError(format!(
                "Column index {idx} out of range for row with {} columns",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }
}

/// Conversion from a [`Value`] reference into a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, TablewrightError>;
}

fn mismatch(expected: &str, value: &Value) -> TablewrightError {
    TablewrightError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        match value {
            Value::Int(i) => Ok(*i),
            // MySQL hands back COUNT(*) over the text protocol.
            Value::String(s) => s.parse().map_err(|_| mismatch("Int", value)),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => Err(mismatch("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            // SQLite and MySQL report timestamps as text.
            Value::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|e| {
                    TablewrightError::DatabaseError(format!("Invalid timestamp '{s}': {e}"))
                }),
            _ => Err(mismatch("DateTime", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TablewrightError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_row() -> Row {
        Row::new(
            vec!["name".into(), "created_at".into()],
            vec![
                Value::from("1700000000-create_table_widgets.json"),
                Value::from("2024-05-01 12:30:00"),
            ],
        )
    }

    #[test]
    fn test_row_get_by_name() {
        let row = ledger_row();
        let name: String = row.get("name").unwrap();
        assert_eq!(name, "1700000000-create_table_widgets.json");
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_get_is_case_insensitive() {
        let row = Row::new(vec!["COUNT".into()], vec![Value::Int(3)]);
        assert_eq!(row.get::<i64>("count").unwrap(), 3);
    }

    #[test]
    fn test_row_get_missing_column() {
        let err = ledger_row().get::<String>("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_row_get_by_index_out_of_range() {
        assert!(ledger_row().get_by_index::<String>(5).is_err());
    }

    #[test]
    fn test_timestamp_from_text() {
        let dt: NaiveDateTime = ledger_row().get("created_at").unwrap();
        assert_eq!(dt.to_string(), "2024-05-01 12:30:00");
    }

    #[test]
    fn test_int_from_text() {
        assert_eq!(i64::from_value(&Value::from("12")).unwrap(), 12);
        assert!(i64::from_value(&Value::from("twelve")).is_err());
    }

    #[test]
    fn test_option_from_null() {
        let v: Option<String> = FromValue::from_value(&Value::Null).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }
}

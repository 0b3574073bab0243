//! File-backed migration intent log.
//!
//! Every authored operation is written as one JSON file under
//! `<root>/<dialect>/` before its DDL runs. Files are never rewritten or
//! deleted by the engine; a record whose DDL was rejected during authoring is
//! renamed to `<name>.rejected` so replays skip it.
//!
//! ```text
//! migrations/
//!   postgres/
//!     1718000000.000001-create_table_widgets.json
//!     1718000042.513377-alter_table_widgets.json
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tablewright_core::{TablewrightError, TablewrightResult};
use tablewright_db_backends::Dialect;

use crate::definition::{MigrationKind, MigrationRecord};
use crate::identifier::validate_identifier;

/// Suffix given to intents whose DDL was rejected.
pub const REJECTED_SUFFIX: &str = ".rejected";

/// Attempts at finding a free filename before giving up.
const MAX_WRITE_ATTEMPTS: usize = 16;

/// Last stamp handed out by this process, in microseconds since the epoch.
static LAST_STAMP: Mutex<i64> = Mutex::new(0);

/// Returns a stamp strictly greater than every earlier one in this process.
fn next_stamp() -> i64 {
    let now = chrono::Utc::now().timestamp_micros();
    let mut last = LAST_STAMP.lock().unwrap_or_else(PoisonError::into_inner);
    *last = now.max(*last + 1);
    *last
}

fn format_stamp(micros: i64) -> String {
    format!(
        "{}.{:06}",
        micros.div_euclid(1_000_000),
        micros.rem_euclid(1_000_000)
    )
}

/// A parsed migration filename:
/// `<stamp>-<create_table|alter_table|delete_table>_<table>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFileName {
    /// `<secs>` (legacy) or `<secs>.<micros>`.
    pub stamp: String,
    /// The kind encoded in the tag.
    pub kind: MigrationKind,
    /// The target table.
    pub table: String,
}

impl MigrationFileName {
    /// Parses a filename, returning `None` when it does not follow the
    /// naming scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use tablewright_migrations::definition::MigrationKind;
    /// use tablewright_migrations::store::MigrationFileName;
    ///
    /// let name = MigrationFileName::parse("1700000000-alter_table_order_items.json").unwrap();
    /// assert_eq!(name.kind, MigrationKind::Alter);
    /// assert_eq!(name.table, "order_items");
    /// ```
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".json")?;
        let (stamp, rest) = stem.split_once('-')?;
        if !is_valid_stamp(stamp) {
            return None;
        }
        [MigrationKind::Create, MigrationKind::Alter, MigrationKind::Delete]
            .into_iter()
            .find_map(|kind| {
                let table = rest.strip_prefix(kind.file_tag())?.strip_prefix('_')?;
                (!table.is_empty()).then(|| Self {
                    stamp: stamp.to_string(),
                    kind,
                    table: table.to_string(),
                })
            })
    }
}

impl fmt::Display for MigrationFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}_{}.json", self.stamp, self.kind.file_tag(), self.table)
    }
}

fn is_valid_stamp(stamp: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match stamp.split_once('.') {
        Some((secs, micros)) => all_digits(secs) && micros.len() == 6 && all_digits(micros),
        None => all_digits(stamp),
    }
}

/// Reads and writes migration records on disk.
#[derive(Debug, Clone)]
pub struct MigrationFileStore {
    root: PathBuf,
}

impl MigrationFileStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding `dialect`'s records.
    pub fn directory(&self, dialect: Dialect) -> PathBuf {
        self.root.join(dialect.as_str())
    }

    /// Creates the dialect directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::IoError`] if the directory cannot be created.
    pub fn ensure_directory(&self, dialect: Dialect) -> TablewrightResult<PathBuf> {
        let dir = self.directory(dialect);
        fs::create_dir_all(&dir).map_err(|e| TablewrightError::io(&dir, e))?;
        Ok(dir)
    }

    /// Writes a new record and returns its filename.
    ///
    /// The file is opened with `create_new`, so an existing record is never
    /// overwritten; on a clash the stamp moves forward and the write is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unsafe table name, a serialization
    /// error, or an I/O error.
    pub fn write_record(
        &self,
        dialect: Dialect,
        kind: MigrationKind,
        table: &str,
        record: &MigrationRecord,
    ) -> TablewrightResult<String> {
        validate_identifier(table, "table").map_err(|e| e.with_table(table))?;
        let dir = self.ensure_directory(dialect)?;
        let body = serde_json::to_string_pretty(record)
            .map_err(|e| TablewrightError::SerializationError(e.to_string()))?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let filename = MigrationFileName {
                stamp: format_stamp(next_stamp()),
                kind,
                table: table.to_string(),
            }
            .to_string();
            let path = dir.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())
                        .and_then(|()| file.sync_all())
                        .map_err(|e| TablewrightError::io(&path, e))?;
                    tracing::debug!(file = %filename, "wrote migration record");
                    return Ok(filename);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(TablewrightError::io(&path, e)),
            }
        }
        Err(TablewrightError::io(
            &dir,
            std::io::Error::new(ErrorKind::AlreadyExists, "no free migration filename"),
        ))
    }

    /// Lists record filenames for `dialect` in replay (filename) order.
    ///
    /// Only `.json` files are returned; rejected intents and the lock file
    /// are skipped. A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::IoError`] if the directory cannot be read.
    pub fn list_records(&self, dialect: Dialect) -> TablewrightResult<Vec<String>> {
        let dir = self.directory(dialect);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| TablewrightError::io(&dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TablewrightError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::IoError`] if the file cannot be read and
    /// [`TablewrightError::ParseError`] if it is not a valid record.
    pub fn read_record(&self, dialect: Dialect, filename: &str) -> TablewrightResult<MigrationRecord> {
        let path = self.directory(dialect).join(filename);
        let content = fs::read_to_string(&path).map_err(|e| TablewrightError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| TablewrightError::ParseError {
            filename: filename.to_string(),
            message: e.to_string(),
        })
    }

    /// Renames a record to `<filename>.rejected` and returns the new name.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::IoError`] if the rename fails.
    pub fn mark_rejected(&self, dialect: Dialect, filename: &str) -> TablewrightResult<String> {
        let dir = self.directory(dialect);
        let rejected = format!("{filename}{REJECTED_SUFFIX}");
        let from = dir.join(filename);
        fs::rename(&from, dir.join(&rejected)).map_err(|e| TablewrightError::io(&from, e))?;
        tracing::warn!(file = %filename, "migration intent marked rejected");
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::definition::{ColumnSpec, TableDefinition};

    fn store() -> (tempfile::TempDir, MigrationFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationFileStore::new(dir.path().join("migrations"));
        (dir, store)
    }

    fn widgets_record() -> MigrationRecord {
        MigrationRecord::create(
            &TableDefinition::new("widgets").column(ColumnSpec::new("id", "INTEGER").primary()),
        )
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        let record = widgets_record();
        let name = store
            .write_record(Dialect::Postgres, MigrationKind::Create, "widgets", &record)
            .unwrap();
        assert!(name.ends_with("-create_table_widgets.json"));
        assert_eq!(store.read_record(Dialect::Postgres, &name).unwrap(), record);
        assert_eq!(store.list_records(Dialect::Postgres).unwrap(), vec![name]);
        assert!(store.list_records(Dialect::MySql).unwrap().is_empty());
    }

    #[test]
    fn test_rapid_writes_get_distinct_ordered_names() {
        let (_dir, store) = store();
        let record = widgets_record();
        let names: Vec<String> = (0..50)
            .map(|_| {
                store
                    .write_record(Dialect::Sqlite, MigrationKind::Create, "widgets", &record)
                    .unwrap()
            })
            .collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
        assert_eq!(store.list_records(Dialect::Sqlite).unwrap(), names);
    }

    #[test]
    fn test_list_is_in_filename_order() {
        let (_dir, store) = store();
        let dir = store.ensure_directory(Dialect::MySql).unwrap();
        for name in [
            "1700000002.000000-delete_table_c.json",
            "1700000000-create_table_a.json",
            "1700000001.500000-alter_table_b.json",
            "1700000000.000001-create_table_b.json",
        ] {
            fs::write(dir.join(name), "{}").unwrap();
        }
        assert_eq!(
            store.list_records(Dialect::MySql).unwrap(),
            vec![
                "1700000000-create_table_a.json",
                "1700000000.000001-create_table_b.json",
                "1700000001.500000-alter_table_b.json",
                "1700000002.000000-delete_table_c.json",
            ]
        );
    }

    #[test]
    fn test_write_rejects_unsafe_table() {
        let (_dir, store) = store();
        let err = store
            .write_record(Dialect::Postgres, MigrationKind::Delete, "../etc", &MigrationRecord::delete("x"))
            .unwrap_err();
        assert!(matches!(err, TablewrightError::ValidationError(_)));
    }

    #[test]
    fn test_missing_directory_lists_empty() {
        let (_dir, store) = store();
        assert!(store.list_records(Dialect::Postgres).unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_non_json() {
        let (_dir, store) = store();
        let dir = store.ensure_directory(Dialect::Postgres).unwrap();
        fs::write(dir.join(".migrate.lock"), "1").unwrap();
        fs::write(dir.join("README.txt"), "notes").unwrap();
        fs::write(dir.join("1700000000-delete_table_a.json"), "{\"table\":\"a\"}").unwrap();
        assert_eq!(
            store.list_records(Dialect::Postgres).unwrap(),
            vec!["1700000000-delete_table_a.json".to_string()]
        );
    }

    #[test]
    fn test_read_corrupt_record_is_parse_error() {
        let (_dir, store) = store();
        let dir = store.ensure_directory(Dialect::MySql).unwrap();
        fs::write(dir.join("1700000000-create_table_t.json"), "{not json").unwrap();
        match store
            .read_record(Dialect::MySql, "1700000000-create_table_t.json")
            .unwrap_err()
        {
            TablewrightError::ParseError { filename, .. } => {
                assert_eq!(filename, "1700000000-create_table_t.json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_missing_record_is_io_error() {
        let (_dir, store) = store();
        let err = store.read_record(Dialect::MySql, "nope.json").unwrap_err();
        assert!(matches!(err, TablewrightError::IoError { .. }));
    }

    #[test]
    fn test_mark_rejected_hides_record() {
        let (_dir, store) = store();
        let name = store
            .write_record(Dialect::Sqlite, MigrationKind::Create, "widgets", &widgets_record())
            .unwrap();
        let rejected = store.mark_rejected(Dialect::Sqlite, &name).unwrap();
        assert_eq!(rejected, format!("{name}.rejected"));
        assert!(store.list_records(Dialect::Sqlite).unwrap().is_empty());
        assert!(store.directory(Dialect::Sqlite).join(rejected).exists());
    }

    #[test]
    fn test_parse_filenames() {
        let name = MigrationFileName::parse("1718000000.000042-create_table_widgets.json").unwrap();
        assert_eq!(name.stamp, "1718000000.000042");
        assert_eq!(name.kind, MigrationKind::Create);
        assert_eq!(name.table, "widgets");
        assert_eq!(name.to_string(), "1718000000.000042-create_table_widgets.json");

        let legacy = MigrationFileName::parse("1700000000-delete_table_old_stuff.json").unwrap();
        assert_eq!(legacy.kind, MigrationKind::Delete);
        assert_eq!(legacy.table, "old_stuff");

        assert!(MigrationFileName::parse("1700000000-create_table_.json").is_none());
        assert!(MigrationFileName::parse("1700000000-rename_table_x.json").is_none());
        assert!(MigrationFileName::parse("17000x0000-create_table_x.json").is_none());
        assert!(MigrationFileName::parse("1700000000.42-create_table_x.json").is_none());
        assert!(MigrationFileName::parse("1700000000-create_table_x.json.rejected").is_none());
    }

    #[test]
    fn test_legacy_stamp_sorts_before_same_second_micro_stamp() {
        let mut names = vec![
            "1700000000.000001-alter_table_t.json".to_string(),
            "1700000000-create_table_t.json".to_string(),
        ];
        names.sort();
        assert_eq!(names[0], "1700000000-create_table_t.json");
    }

    #[test]
    fn test_stamps_are_monotonic() {
        let a = next_stamp();
        let b = next_stamp();
        assert!(b > a);
        assert_eq!(format_stamp(1_700_000_000_000_042), "1700000000.000042");
    }
}

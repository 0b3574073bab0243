//! Cross-process replay lock.
//!
//! A replay holds `<root>/<dialect>/.migrate.lock` for its whole run, and an
//! authored change holds it from writing its intent to recording it. The
//! file is created with `create_new`, so exactly one process wins; it holds
//! the owner's pid and acquisition time for operators. A lock left behind by
//! a crashed process must be removed by hand.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tablewright_core::{TablewrightError, TablewrightResult};
use tablewright_db_backends::Dialect;

use crate::store::MigrationFileStore;

/// Lock file name inside each dialect directory.
pub const LOCK_FILE_NAME: &str = ".migrate.lock";

/// A held replay lock. Released on drop.
#[derive(Debug)]
pub struct MigrationLock {
    path: PathBuf,
    _file: File,
}

impl MigrationLock {
    /// Takes the lock for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::MigrationLocked`] if another run holds it,
    /// or an I/O error if the directory or file cannot be created.
    pub fn acquire(store: &MigrationFileStore, dialect: Dialect) -> TablewrightResult<Self> {
        let path = store.ensure_directory(dialect)?.join(LOCK_FILE_NAME);
        let mut file = match OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(lock = %path.display(), "migration lock is held");
                return Err(TablewrightError::MigrationLocked(path));
            }
            Err(e) => return Err(TablewrightError::io(&path, e)),
        };

        let owner = format!(
            "pid={}\nacquired_at={}\n",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(e) = file.write_all(owner.as_bytes()) {
            let _ = fs::remove_file(&path);
            return Err(TablewrightError::io(&path, e));
        }
        tracing::debug!(lock = %path.display(), "acquired migration lock");
        Ok(Self { path, _file: file })
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release migration lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationFileStore::new(dir.path());

        let lock = MigrationLock::acquire(&store, Dialect::Postgres).unwrap();
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert!(contents.starts_with(&format!("pid={}", std::process::id())));

        match MigrationLock::acquire(&store, Dialect::Postgres).unwrap_err() {
            TablewrightError::MigrationLocked(path) => assert_eq!(path, lock.path()),
            other => panic!("unexpected error: {other}"),
        }

        // Each dialect has its own lock.
        let _other = MigrationLock::acquire(&store, Dialect::MySql).unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationFileStore::new(dir.path());

        let path = {
            let lock = MigrationLock::acquire(&store, Dialect::Sqlite).unwrap();
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
        assert!(MigrationLock::acquire(&store, Dialect::Sqlite).is_ok());
    }

    #[test]
    fn test_stale_lock_blocks_until_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationFileStore::new(dir.path());
        let path = store.ensure_directory(Dialect::Sqlite).unwrap().join(LOCK_FILE_NAME);
        fs::write(&path, "pid=1\n").unwrap();

        assert!(MigrationLock::acquire(&store, Dialect::Sqlite).is_err());
        fs::remove_file(&path).unwrap();
        assert!(MigrationLock::acquire(&store, Dialect::Sqlite).is_ok());
    }
}

//! Integration tests for the SQLite backend through the `DatabaseBackend`
//! trait object returned by `connect`.

use tablewright_core::{DatabaseSettings, Settings, TablewrightError};
use tablewright_db_backends::{connect, DatabaseBackend, Dialect, Value};

fn sqlite_settings(path: &std::path::Path) -> Settings {
    Settings {
        dialect: "sqlite".into(),
        database: DatabaseSettings {
            name: path.display().to_string(),
            ..DatabaseSettings::default()
        },
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_connect_selects_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let backend = connect(&sqlite_settings(&dir.path().join("db.sqlite3"))).unwrap();
    assert_eq!(backend.dialect(), Dialect::Sqlite);
    assert_eq!(backend.vendor(), "sqlite");
}

#[tokio::test]
async fn test_schema_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.sqlite3");

    {
        let backend = connect(&sqlite_settings(&path)).unwrap();
        backend
            .execute_batch(&["CREATE TABLE \"widgets\" (\"id\" INTEGER PRIMARY KEY)".to_string()])
            .await
            .unwrap();
    }

    let backend = connect(&sqlite_settings(&path)).unwrap();
    let row = backend
        .query_one(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[Value::from("widgets")],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<i64>("n").unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_statement_reports_sql() {
    let backend: Box<dyn DatabaseBackend> = connect(&Settings {
        dialect: "sqlite".into(),
        ..Settings::default()
    })
    .unwrap();

    let err = backend
        .execute_batch(&["DROP TABLE \"nope\"".to_string()])
        .await
        .unwrap_err();
    match err {
        TablewrightError::DdlExecutionError { target, sql, .. } => {
            assert!(target.is_empty());
            assert_eq!(sql, "DROP TABLE \"nope\"");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let backend = connect(&Settings {
        dialect: "sqlite".into(),
        ..Settings::default()
    })
    .unwrap();
    backend.execute_batch(&[]).await.unwrap();
}

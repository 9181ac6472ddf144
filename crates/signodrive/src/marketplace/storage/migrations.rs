//! Schema versioning for the SQLite store.
//!
//! Every migration is safe to re-run: columns are only added when `PRAGMA table_info` does not
//! list them yet, and indexes use `IF NOT EXISTS`.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use super::schema::SCHEMA_STATEMENTS;
use super::StorageError;

pub const CURRENT_VERSION: i32 = 2;

const VERSION_KEY: &str = "schema_version";

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

pub(super) fn schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(value) => value
            .parse()
            .map_err(|_| StorageError::Unavailable(format!("invalid schema version: {value}"))),
        None => Ok(0),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), StorageError> {
    let mut current = from_version;
    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
        set_schema_version(conn, current)?;
        info!(version = current, "applied storage migration");
    }
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), StorageError> {
    match version {
        // The base schema is created by SCHEMA_STATEMENTS.
        1 => Ok(()),
        2 => migrate_v2(conn),
        _ => Err(StorageError::Unavailable(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Status columns so listings can filter without decoding every body.
fn migrate_v2(conn: &Connection) -> Result<(), StorageError> {
    add_column_if_missing(conn, "jobs", "status", "TEXT NOT NULL DEFAULT 'open'")?;
    add_column_if_missing(
        conn,
        "applications",
        "status",
        "TEXT NOT NULL DEFAULT 'pending'",
    )?;
    add_column_if_missing(conn, "notifications", "is_read", "INTEGER NOT NULL DEFAULT 0")?;
    conn.execute_batch(
        "UPDATE jobs SET status = json_extract(body, '$.status');
         UPDATE applications SET status = json_extract(body, '$.status');
         UPDATE notifications SET is_read = json_extract(body, '$.read');
         CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
         CREATE INDEX IF NOT EXISTS idx_applications_job_status ON applications(job_id, status);
         CREATE INDEX IF NOT EXISTS idx_notifications_unread ON notifications(user_id, is_read);",
    )?;
    Ok(())
}

pub(super) fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    declaration: &str,
) -> Result<(), StorageError> {
    if has_column(conn, table, column)? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE {table} ADD COLUMN {column} {declaration}"),
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    #[test]
    fn initialize_schema_sets_current_version() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("schema initializes");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(has_column(&conn, "jobs", "status").unwrap());
        assert!(has_column(&conn, "notifications", "is_read").unwrap());
    }

    #[test]
    fn initialize_schema_is_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("first init");
        initialize_schema(&conn).expect("second init");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn v2_tolerates_columns_that_already_exist() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("schema initializes");
        set_schema_version(&conn, 1).unwrap();

        run_migrations(&conn, 1).expect("re-running v2 is a no-op");
        assert_eq!(schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn v2_backfills_status_from_bodies() {
        let conn = create_test_db();
        for statement in SCHEMA_STATEMENTS {
            conn.execute(statement, []).unwrap();
        }
        conn.execute(
            "INSERT INTO jobs (body) VALUES (?1)",
            [r#"{"status":"paused"}"#],
        )
        .unwrap();
        set_schema_version(&conn, 1).unwrap();

        initialize_schema(&conn).expect("migrates to v2");
        let status: String = conn
            .query_row("SELECT status FROM jobs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "paused");
    }

    #[test]
    fn unknown_migration_is_rejected() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        let err = run_migration(&conn, 999).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }
}

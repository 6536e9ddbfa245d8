// SQLite store setup and migrations
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use super::storage::StorageError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("No project is open")]
    NoActiveStore,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid import payload: {0}")]
    Format(String),
    #[error("Integrity constraint violated: {0}")]
    Integrity(String),
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                DbError::Integrity(message.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => DbError::Sqlite(error),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Fresh opaque identifier for a new row
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as an RFC 3339 UTC string with fixed microsecond precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Re-render an RFC 3339 time in the same UTC form as `timestamp()`
pub fn normalize_timestamp(value: &str) -> DbResult<String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| {
            at.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        })
        .map_err(|e| DbError::Validation(format!("invalid timestamp '{}': {}", value, e)))
}

/// Whether a row with `id` exists in `table`
pub(crate) fn row_exists(conn: &Connection, table: &str, id: &str) -> DbResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table);
    Ok(conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .is_some())
}

// Thread-safe database connection wrapper
pub struct DbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A panic mid-call cannot leave a half-applied write: transactions roll back on drop
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clone for DbConnection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Open (or create) the store file at `db_path` and bring its schema up to date
pub fn open_db(db_path: &Path) -> DbResult<DbConnection> {
    let conn = Connection::open(db_path)?;
    prepare(&conn)?;
    Ok(DbConnection::new(conn))
}

/// In-memory store, used by tests and throwaway sessions
pub fn open_in_memory() -> DbResult<DbConnection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(DbConnection::new(conn))
}

fn prepare(conn: &Connection) -> DbResult<()> {
    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    run_migrations(conn)
}

fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version < 1 {
        migration_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [1])?;
    }

    Ok(())
}

fn migration_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS case_folders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS test_cases (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            objective TEXT NOT NULL DEFAULT '',
            preconditions TEXT NOT NULL DEFAULT '',
            priority TEXT NOT NULL DEFAULT '',
            severity TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            folder_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (folder_id) REFERENCES case_folders(id) ON DELETE SET NULL
        );
        CREATE INDEX IF NOT EXISTS idx_test_cases_folder_id ON test_cases(folder_id);
        CREATE INDEX IF NOT EXISTS idx_test_cases_title ON test_cases(title);

        CREATE TABLE IF NOT EXISTS test_steps (
            id TEXT PRIMARY KEY,
            case_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            action TEXT NOT NULL DEFAULT '',
            expected TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (case_id) REFERENCES test_cases(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_test_steps_case_id ON test_steps(case_id, position);

        CREATE TABLE IF NOT EXISTS scenarios (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            objective TEXT NOT NULL DEFAULT '',
            preconditions TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scenario_cases (
            scenario_id TEXT NOT NULL,
            case_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (scenario_id, case_id),
            FOREIGN KEY (scenario_id) REFERENCES scenarios(id) ON DELETE CASCADE,
            FOREIGN KEY (case_id) REFERENCES test_cases(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS data_sets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            scope TEXT NOT NULL CHECK (scope IN ('common', 'case', 'scenario', 'run')),
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_items (
            id TEXT PRIMARY KEY,
            data_set_id TEXT NOT NULL,
            label TEXT NOT NULL DEFAULT '',
            value TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL,
            FOREIGN KEY (data_set_id) REFERENCES data_sets(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_data_items_set ON data_items(data_set_id, sort_order);

        -- entity_id is a weak reference: no foreign key, links may outlive their target
        CREATE TABLE IF NOT EXISTS data_links (
            data_set_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            PRIMARY KEY (data_set_id, entity_type, entity_id)
        );
        CREATE INDEX IF NOT EXISTS idx_data_links_entity ON data_links(entity_type, entity_id);

        CREATE TABLE IF NOT EXISTS test_runs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            environment TEXT NOT NULL DEFAULT '',
            build_version TEXT NOT NULL DEFAULT '',
            tester TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL CHECK (status IN ('draft', 'in_progress', 'completed')),
            started_at TEXT,
            finished_at TEXT,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_test_runs_created_at ON test_runs(created_at DESC);

        CREATE TABLE IF NOT EXISTS run_scenarios (
            run_id TEXT NOT NULL,
            scenario_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (run_id, scenario_id),
            FOREIGN KEY (run_id) REFERENCES test_runs(id) ON DELETE CASCADE,
            FOREIGN KEY (scenario_id) REFERENCES scenarios(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS run_cases (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            case_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('not_run', 'pass', 'fail', 'blocked', 'skip')),
            actual_result TEXT NOT NULL DEFAULT '',
            evidence_summary TEXT NOT NULL DEFAULT '',
            executed_at TEXT,
            FOREIGN KEY (run_id) REFERENCES test_runs(id) ON DELETE CASCADE,
            FOREIGN KEY (case_id) REFERENCES test_cases(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_run_cases_run_id ON run_cases(run_id);

        CREATE TABLE IF NOT EXISTS evidence (
            id TEXT PRIMARY KEY,
            run_case_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            stored_path TEXT,
            mime_type TEXT NOT NULL DEFAULT '',
            size INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (run_case_id) REFERENCES run_cases(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_evidence_run_case_id ON evidence(run_case_id);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('meta', 'case_folders', 'test_cases', 'test_steps', 'scenarios', 'scenario_cases',
                  'data_sets', 'data_items', 'data_links', 'test_runs', 'run_scenarios',
                  'run_cases', 'evidence')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 13);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(
            normalize_timestamp("2024-03-01T10:00:00+02:00").unwrap(),
            "2024-03-01T08:00:00.000000Z"
        );
        assert_eq!(
            normalize_timestamp(&normalize_timestamp("2024-03-01T08:00:00Z").unwrap()).unwrap(),
            "2024-03-01T08:00:00.000000Z"
        );
        assert!(matches!(
            normalize_timestamp("yesterday"),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_constraint_violation_maps_to_integrity() {
        let db = open_in_memory().unwrap();
        let conn = db.lock();
        let result: DbResult<usize> = conn
            .execute(
                "INSERT INTO test_steps (id, case_id, position) VALUES ('s1', 'missing', 1)",
                [],
            )
            .map_err(DbError::from);
        assert!(matches!(result, Err(DbError::Integrity(_))));
    }
}

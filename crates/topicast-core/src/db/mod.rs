//! SQLite database layer backing the checkpoint store.
//!
//! Uses rusqlite with WAL mode. All database operations are executed via
//! `tokio::task::spawn_blocking` to avoid blocking the async runtime.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::PipelineError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, PipelineError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| PipelineError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| PipelineError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, PipelineError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            PipelineError::Database(format!("Failed to open in-memory db: {}", e))
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| PipelineError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PipelineError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| PipelineError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| PipelineError::Database(format!("Task join error: {}", e)))?
    }

    /// Create all tables if they don't exist.
    fn initialize_tables(&self) -> Result<(), PipelineError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS checkpoints (
                    session_id      TEXT PRIMARY KEY,
                    topic           TEXT NOT NULL,
                    status          TEXT NOT NULL DEFAULT 'running',
                    status_detail   TEXT NOT NULL DEFAULT '{}',
                    next_node       TEXT NOT NULL,
                    state           TEXT NOT NULL DEFAULT '{}',
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_checkpoints_status ON checkpoints(status);

                CREATE TABLE IF NOT EXISTS publications (
                    id              TEXT PRIMARY KEY,
                    session_id      TEXT NOT NULL REFERENCES checkpoints(session_id) ON DELETE CASCADE,
                    channel         TEXT NOT NULL,
                    item_index      INTEGER NOT NULL,
                    platform        TEXT NOT NULL,
                    post_id         TEXT NOT NULL,
                    url             TEXT,
                    published_at    INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_publications_session ON publications(session_id);
                ",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_tables() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('checkpoints', 'publications')",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("topicast.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        drop(db);
    }
}

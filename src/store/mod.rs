pub mod messages;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Thread-safe SQLite store holding the `messages` table
#[derive(Clone)]
pub struct MessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl MessageStore {
    /// Open or create the SQLite database at the given path, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        // Run migrations on the raw connection before wrapping in Mutex.
        Self::run_migrations(&conn)?;

        info!("Message store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Cheap liveness query for the health endpoint
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let _: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .context("Database did not answer")?;
        Ok(())
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                author TEXT,
                git_commit_hash TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_messages_timestamp
                ON messages(timestamp);
            ",
        )
        .context("Failed to create messages schema")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_parent_dirs_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db").join("messages.db");

        let store = MessageStore::open(&path).unwrap();
        assert!(path.exists());
        store.ping().await.unwrap();

        let conn = store.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE name IN ('messages', 'idx_messages_timestamp')",
            )
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.db");

        let first = MessageStore::open(&path).unwrap();
        first
            .add_message("persisted", None, "2025-01-01T00:00:00.000000Z")
            .await
            .unwrap();
        drop(first);

        let second = MessageStore::open(&path).unwrap();
        assert_eq!(second.count_messages().await.unwrap(), 1);
    }
}

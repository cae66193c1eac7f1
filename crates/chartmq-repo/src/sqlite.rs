//! SQLite-backed repository store
//!
//! Features:
//! - WAL mode so the HTTP surface can read while a worker writes
//! - Upsert by unique name
//! - Blocking database work runs on the tokio blocking pool

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::entry::RepositoryEntry;
use crate::error::{RepoError, Result};
use crate::store::RepositoryStore;

/// Repository store persisted in a SQLite database
#[derive(Clone)]
pub struct SqliteRepositoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepositoryStore {
    /// Open or create the store at the default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(&path)
    }

    /// Open or create the store at a specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        tracing::debug!(path = %path.display(), "opened repository database");

        Self::init(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Get default database path
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(RepoError::NoDataDir)?;
        Ok(data_dir.join("chartmq").join("repositories.db"))
    }

    /// Initialize database schema
    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                url TEXT NOT NULL,
                username TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| RepoError::Unavailable {
                message: "database connection lock poisoned".to_string(),
            })?;
            f(&mut guard)
        })
        .await?
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepositoryEntry> {
    Ok(RepositoryEntry {
        name: row.get(0)?,
        url: row.get(1)?,
        username: row.get(2)?,
        // Non-text values read as empty so only that row fails to unseal
        password: row.get_ref(3)?.as_str().unwrap_or_default().to_string(),
    })
}

#[async_trait]
impl RepositoryStore for SqliteRepositoryStore {
    async fn upsert(&self, entry: &RepositoryEntry) -> Result<()> {
        let entry = entry.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().timestamp();
            conn.execute(
                r#"
                INSERT INTO repositories (name, url, username, password, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ON CONFLICT(name) DO UPDATE SET
                    url = excluded.url,
                    username = excluded.username,
                    password = excluded.password,
                    updated_at = excluded.updated_at
                "#,
                params![entry.name, entry.url, entry.username, entry.password, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<RepositoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, url, username, password FROM repositories ORDER BY name",
            )?;
            let entries = stmt
                .query_map([], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn get(&self, name: &str) -> Result<Option<RepositoryEntry>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let entry = conn
                .query_row(
                    "SELECT name, url, username, password FROM repositories WHERE name = ?1",
                    [&name],
                    row_to_entry,
                )
                .optional()?;
            Ok(entry)
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM repositories WHERE name = ?1", [&name])?;
            Ok(removed > 0)
        })
        .await
    }
}

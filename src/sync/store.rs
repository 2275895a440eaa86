//! Durable storage for the offline sync queue.
//!
//! `SQLite`-backed persistence so queued operations survive process restart.
//! Rows are kept in insertion order; the in-memory queue is reconstructed
//! from them at startup.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{OperationKind, QueueOperation};

/// The current schema version.
const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Base schema statements, idempotent.
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS queue_operations (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        enqueued_at TEXT NOT NULL,
        retries INTEGER NOT NULL DEFAULT 0,
        idempotency_key TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// Persistent store for queued operations.
#[derive(Debug)]
pub struct QueueStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl QueueStore {
    /// Open or create a queue database at the given path.
    ///
    /// Creates parent directories and the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening queue database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        initialize_schema(&conn)?;

        info!("Queue database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every stored operation in enqueue (FIFO) order.
    ///
    /// A row that can no longer be decoded is kept out of the result but
    /// logged loudly; it stays in the table for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load(&self) -> Result<Vec<QueueOperation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, payload, enqueued_at, retries, idempotency_key
             FROM queue_operations ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let payload: String = row.get(2)?;
            let enqueued_at: String = row.get(3)?;
            let retries: u32 = row.get(4)?;
            let idempotency_key: String = row.get(5)?;
            Ok((id, kind, payload, enqueued_at, retries, idempotency_key))
        })?;

        let mut operations = Vec::new();
        for row in rows {
            let (id, kind, payload, enqueued_at, retries, idempotency_key) = row?;

            let Some(kind) = OperationKind::from_str(&kind) else {
                warn!("Skipping queued operation {id} with unknown kind {kind}");
                continue;
            };
            let payload = match serde_json::from_str(&payload) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping queued operation {id} with undecodable payload: {e}");
                    continue;
                }
            };
            let enqueued_at = match chrono::DateTime::parse_from_rfc3339(&enqueued_at) {
                Ok(dt) => dt.with_timezone(&chrono::Utc),
                Err(e) => {
                    warn!("Skipping queued operation {id} with bad timestamp: {e}");
                    continue;
                }
            };

            operations.push(QueueOperation {
                id,
                kind,
                payload,
                enqueued_at,
                retries,
                idempotency_key,
            });
        }

        Ok(operations)
    }

    /// Append an operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn append(&self, op: &QueueOperation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO queue_operations (id, kind, payload, enqueued_at, retries, idempotency_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                op.id,
                op.kind.as_str(),
                op.payload.to_string(),
                op.enqueued_at.to_rfc3339(),
                op.retries,
                op.idempotency_key,
            ],
        )?;
        Ok(())
    }

    /// Remove a delivered operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM queue_operations WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Update the retry count of a kept operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_retries(&self, id: &str, retries: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE queue_operations SET retries = ?2 WHERE id = ?1",
            params![id, retries],
        )?;
        Ok(())
    }

    /// Count stored operations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM queue_operations", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Initialize the schema and bring it to the current version.
fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version < CURRENT_VERSION {
        set_schema_version(conn, CURRENT_VERSION)?;
    } else if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!("database schema version {version} is newer than supported"),
        });
    }

    Ok(())
}

/// Get the schema version, 0 for a fresh database.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

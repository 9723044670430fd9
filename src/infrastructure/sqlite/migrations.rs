use crate::domain::error::DomainError;
use rusqlite::{params, Connection};

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dimension INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL DEFAULT 0,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            vector BLOB NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_document ON records(collection, document_id);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

pub fn ensure_collection(conn: &Connection, name: &str) -> Result<(), DomainError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO collections (name, dimension, created_at, updated_at) VALUES (?1, NULL, ?2, ?2)",
        params![name, now],
    )
    .map_err(|e| DomainError::Database(format!("Failed to create collection {name}: {e}")))?;
    Ok(())
}

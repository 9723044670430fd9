use crate::domain::entities::document::{Metadata, Page, SearchResult, StoredRecord, VectorRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::{StoreHealth, StoreStats, VectorStore, WriteOutcome};
use crate::domain::values::dimension_policy::DimensionPolicy;
use crate::domain::values::metadata_filter::MetadataFilter;
use crate::infrastructure::sqlite::migrations::{ensure_collection, run_migrations};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

const RECORD_COLS: &str = "id, document_id, chunk_index, text, metadata, updated_at";

/// Cosine distance in `[0, 2]`, accumulated in f64.
///
/// A zero vector, a length mismatch or a non-finite product is at distance 1
/// from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }
    let (dot, aa, bb) = a.iter().zip(b).fold((0.0_f64, 0.0_f64, 0.0_f64), |(dot, aa, bb), (&x, &y)| {
        let (x, y) = (f64::from(x), f64::from(y));
        (dot + x * y, aa + x * x, bb + y * y)
    });
    let similarity = dot / (aa * bb).sqrt();
    if similarity.is_finite() {
        (1.0 - similarity).clamp(0.0, 2.0)
    } else {
        1.0
    }
}

/// Little-endian f32 blob.
fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Trailing bytes that do not form a whole f32 are ignored.
fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .filter_map(|b| b.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Exact (brute-force) cosine kNN over records held in SQLite.
///
/// One connection guarded by a mutex; every public operation runs under
/// the lock and writes run in a single transaction.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    collection: String,
    policy: DimensionPolicy,
}

impl SqliteVectorStore {
    pub fn new(conn: Connection, collection: &str, policy: DimensionPolicy) -> Result<Self, DomainError> {
        run_migrations(&conn)?;
        ensure_collection(&conn, collection)?;
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            policy,
        })
    }

    /// Open (or create) the database at `path`; `:memory:` is accepted.
    pub fn open(path: &str, collection: &str, policy: DimensionPolicy) -> Result<Self, DomainError> {
        let conn = Connection::open(path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::new(conn, collection, policy)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))
    }

    fn parse_metadata(raw: &str) -> Metadata {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<StoredRecord, rusqlite::Error> {
        let chunk_index: i64 = row.get(2)?;
        let metadata: String = row.get(4)?;
        let updated: String = row.get(5)?;
        Ok(StoredRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            chunk_index: chunk_index.max(0) as usize,
            text: row.get(3)?,
            metadata: Self::parse_metadata(&metadata),
            updated_at: Self::parse_time(&updated),
        })
    }

    /// Common dimension of a write, or `None` for an empty write.
    fn batch_dimension(records: &[VectorRecord]) -> Result<Option<usize>, DomainError> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let dim = first.vector.len();
        if dim == 0 {
            return Err(DomainError::InvalidInput(format!("record '{}' has an empty vector", first.id)));
        }
        if let Some(odd) = records.iter().find(|r| r.vector.len() != dim) {
            return Err(DomainError::InvalidInput(format!(
                "record '{}' has dimension {}, expected {dim} like the rest of the batch",
                odd.id,
                odd.vector.len()
            )));
        }
        Ok(Some(dim))
    }

    fn recorded_dimension(conn: &Connection, collection: &str) -> Result<Option<usize>, DomainError> {
        let dim: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![collection],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        Ok(dim.map(|d| d as usize))
    }

    fn record_count(conn: &Connection, collection: &str) -> Result<usize, DomainError> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Remove every record and forget the dimension.
    fn clear_collection(conn: &Connection, collection: &str) -> Result<usize, DomainError> {
        let removed = conn.execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
        conn.execute(
            "UPDATE collections SET dimension = NULL, updated_at = ?2 WHERE name = ?1",
            params![collection, Utc::now().to_rfc3339()],
        )?;
        Ok(removed)
    }

    /// Apply the dimension policy for a write of dimension `dim`.
    /// Returns whether the collection was recreated.
    fn reconcile_dimension(&self, tx: &Transaction, dim: usize) -> Result<bool, DomainError> {
        let mut recreated = false;
        if let Some(expected) = Self::recorded_dimension(tx, &self.collection)? {
            if expected != dim {
                let existing = Self::record_count(tx, &self.collection)?;
                if existing > 0 {
                    if self.policy == DimensionPolicy::Reject {
                        return Err(DomainError::DimensionMismatch { expected, actual: dim });
                    }
                    warn!(
                        collection = %self.collection,
                        expected,
                        actual = dim,
                        discarded = existing,
                        "embedding dimension changed; recreating collection"
                    );
                    Self::clear_collection(tx, &self.collection)?;
                    recreated = true;
                } else {
                    debug!(collection = %self.collection, expected, actual = dim, "empty collection adopts new dimension");
                }
            }
        }
        tx.execute(
            "UPDATE collections SET dimension = ?2 WHERE name = ?1",
            params![self.collection, dim as i64],
        )?;
        Ok(recreated)
    }

    fn insert_records(&self, tx: &Transaction, records: &[VectorRecord]) -> Result<(), DomainError> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO records (collection, id, document_id, chunk_index, text, metadata, vector, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for r in records {
            if r.id.trim().is_empty() {
                return Err(DomainError::InvalidInput("record id must not be empty".into()));
            }
            stmt.execute(params![
                self.collection,
                r.id,
                r.document_id,
                r.chunk_index as i64,
                r.text,
                serde_json::to_string(&r.metadata)?,
                encode_vector(&r.vector),
                now,
            ])
            .map_err(|e| DomainError::Database(format!("Failed to store record {}: {e}", r.id)))?;
        }
        Ok(())
    }

    fn write(&self, replace: Option<&str>, records: &[VectorRecord]) -> Result<WriteOutcome, DomainError> {
        let dim = Self::batch_dimension(records)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let recreated = match dim {
            Some(dim) => self.reconcile_dimension(&tx, dim)?,
            None => false,
        };
        if let Some(document_id) = replace {
            tx.execute(
                "DELETE FROM records WHERE collection = ?1 AND document_id = ?2",
                params![self.collection, document_id],
            )?;
        }
        self.insert_records(&tx, records)?;
        tx.execute(
            "UPDATE collections SET updated_at = ?2 WHERE name = ?1",
            params![self.collection, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(WriteOutcome {
            written: records.len(),
            recreated,
        })
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert_batch(&self, records: &[VectorRecord]) -> Result<WriteOutcome, DomainError> {
        self.write(None, records)
    }

    fn replace_document(&self, document_id: &str, records: &[VectorRecord]) -> Result<WriteOutcome, DomainError> {
        if let Some(stray) = records.iter().find(|r| r.document_id != document_id) {
            return Err(DomainError::InvalidInput(format!(
                "record '{}' belongs to '{}', not '{document_id}'",
                stray.id, stray.document_id
            )));
        }
        self.write(Some(document_id), records)
    }

    fn query_filtered(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if k == 0 {
            return Ok(vec![]);
        }
        let conn = self.lock()?;
        match Self::recorded_dimension(&conn, &self.collection)? {
            None => return Ok(vec![]),
            Some(dim) if dim != vector.len() => {
                warn!(
                    collection = %self.collection,
                    expected = dim,
                    actual = vector.len(),
                    "query dimension does not match collection; returning no results"
                );
                return Ok(vec![]);
            }
            Some(_) => {}
        }

        let mut stmt = conn.prepare(
            "SELECT id, document_id, text, metadata, vector FROM records WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![self.collection], |row| {
            let metadata: String = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, metadata, blob))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, document_id, text, metadata, blob) = row?;
            let metadata = Self::parse_metadata(&metadata);
            if filter.is_some_and(|f| !f.matches(&metadata)) {
                continue;
            }
            let distance = cosine_distance(vector, &decode_vector(&blob));
            results.push(SearchResult {
                id,
                document_id,
                text,
                metadata,
                distance,
            });
        }

        // Stable sort keeps insertion order among equal distances.
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, DomainError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {RECORD_COLS} FROM records WHERE collection = ?1 AND id = ?2");
        let record = conn
            .query_row(&sql, params![self.collection, id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn document_records(&self, document_id: &str) -> Result<Vec<StoredRecord>, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {RECORD_COLS} FROM records WHERE collection = ?1 AND document_id = ?2 ORDER BY chunk_index"
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![self.collection, document_id], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn contains_document(&self, document_id: &str) -> Result<bool, DomainError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1 AND document_id = ?2",
            params![self.collection, document_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Page<StoredRecord>, DomainError> {
        let conn = self.lock()?;
        let total = Self::record_count(&conn, &self.collection)?;
        let sql = format!("SELECT {RECORD_COLS} FROM records WHERE collection = ?1 ORDER BY id LIMIT ?2 OFFSET ?3");
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![self.collection, limit as i64, offset as i64], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    fn list_document_ids(&self, limit: usize, offset: usize) -> Result<Page<String>, DomainError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT document_id) FROM records WHERE collection = ?1",
            params![self.collection],
            |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT document_id FROM records WHERE collection = ?1 \
             ORDER BY document_id LIMIT ?2 OFFSET ?3",
        )?;
        let items = stmt
            .query_map(params![self.collection, limit as i64, offset as i64], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(Page {
            items,
            total: total as usize,
            limit,
            offset,
        })
    }

    fn delete(&self, id: &str) -> Result<bool, DomainError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![self.collection, id],
        )?;
        Ok(removed > 0)
    }

    fn delete_document(&self, document_id: &str) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND document_id = ?2",
            params![self.collection, document_id],
        )?;
        Ok(removed)
    }

    fn delete_all(&self) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        Self::clear_collection(&conn, &self.collection)
    }

    fn stats(&self) -> Result<StoreStats, DomainError> {
        let conn = self.lock()?;
        let record_count = Self::record_count(&conn, &self.collection)?;
        let document_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT document_id) FROM records WHERE collection = ?1",
            params![self.collection],
            |r| r.get(0),
        )?;
        let dimension = Self::recorded_dimension(&conn, &self.collection)?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        let last_updated: Option<String> = conn.query_row(
            "SELECT MAX(updated_at) FROM records WHERE collection = ?1",
            params![self.collection],
            |r| r.get(0),
        )?;

        let health = if record_count == 0 {
            StoreHealth::Empty
        } else {
            let expected_bytes = dimension.unwrap_or(0) as i64 * 4;
            let mismatched: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1 AND length(vector) != ?2",
                params![self.collection, expected_bytes],
                |r| r.get(0),
            )?;
            if mismatched > 0 { StoreHealth::Inconsistent } else { StoreHealth::Healthy }
        };

        Ok(StoreStats {
            document_count: document_count as usize,
            record_count,
            storage_size_bytes: (page_count.max(0) * page_size.max(0)) as u64,
            embedding_dimension: dimension,
            collection_name: self.collection.clone(),
            health,
            last_updated: last_updated.as_deref().map(Self::parse_time),
        })
    }

    fn dimension(&self) -> Result<Option<usize>, DomainError> {
        let conn = self.lock()?;
        Self::recorded_dimension(&conn, &self.collection)
    }

    fn recreate(&self) -> Result<(), DomainError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records WHERE collection = ?1", params![self.collection])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![self.collection])?;
        ensure_collection(&tx, &self.collection)?;
        tx.commit()?;
        warn!(collection = %self.collection, "collection recreated");
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

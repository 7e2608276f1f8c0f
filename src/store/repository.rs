use crate::codec::{CodecError, TelemetryCodec};
use crate::domain::QueueItem;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Payload encoding error: {0}")]
    Codec(#[from] CodecError),
}

/// One compressed record at rest. A row exists exactly as long as its
/// record has not been confirmed transmitted off this node.
#[derive(Debug, Clone)]
pub struct PersistedRow {
    pub id: i64,
    pub container_id: String,
    pub timestamp_ms: i64,
    pub payload: Vec<u8>,
    pub payload_size: i64,
}

/// Backlog summary for the stats surface.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogStats {
    pub row_count: u64,
    pub payload_bytes: u64,
}

/// Transactional storage of compressed telemetry rows. Raw records never
/// touch the database; every payload goes through the codec on the way in.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    codec: TelemetryCodec,
}

impl Repository {
    /// Opens (creating if missing) the file-backed store and its schema.
    pub async fn connect(
        path: impl AsRef<Path>,
        codec: TelemetryCodec,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repository = Self { pool, codec };
        repository.init_schema().await?;
        Ok(repository)
    }

    /// In-memory store for tests. The pool is capped at one connection;
    /// a second connection would see its own empty database.
    pub async fn in_memory(codec: TelemetryCodec) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let repository = Self { pool, codec };
        repository.init_schema().await?;
        Ok(repository)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS telemetry_rows (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                container_id  TEXT    NOT NULL CHECK (container_id <> ''),
                timestamp_ms  INTEGER NOT NULL,
                payload       BLOB    NOT NULL,
                payload_size  INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_telemetry_rows_timestamp \
             ON telemetry_rows (timestamp_ms)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts every item of the batch inside one transaction. Any failure
    /// rolls the whole batch back; partial batches are never committed.
    pub async fn batch_insert(&self, items: &[QueueItem]) -> Result<u64, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for item in items {
            let payload = self.codec.encode_one(&item.record)?;
            sqlx::query(
                r"
                INSERT INTO telemetry_rows (container_id, timestamp_ms, payload, payload_size)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(item.record.container_id())
            .bind(item.enqueued_at_ms)
            .bind(&payload)
            .bind(payload.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(items.len() as u64)
    }

    /// Full backlog, newest first. May legitimately return zero rows or a
    /// very large set; pagination is the caller's concern.
    pub async fn read_all(&self) -> Result<Vec<PersistedRow>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, container_id, timestamp_ms, payload, payload_size
            FROM telemetry_rows
            ORDER BY timestamp_ms DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(to_persisted_row).collect()
    }

    /// Rows for a single container, newest first.
    pub async fn read_container(
        &self,
        container_id: &str,
    ) -> Result<Vec<PersistedRow>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, container_id, timestamp_ms, payload, payload_size
            FROM telemetry_rows
            WHERE container_id = ?1
            ORDER BY timestamp_ms DESC, id DESC
            ",
        )
        .bind(container_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(to_persisted_row).collect()
    }

    /// Unconditional wipe. The replication cycle is the only caller, and
    /// only after the transport confirmed the bulk send.
    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM telemetry_rows")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn row_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM telemetry_rows")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    pub async fn backlog_stats(&self) -> Result<BacklogStats, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, COALESCE(SUM(payload_size), 0) AS bytes FROM telemetry_rows",
        )
        .fetch_one(&self.pool)
        .await?;

        let n: i64 = row.try_get("n")?;
        let bytes: i64 = row.try_get("bytes")?;
        Ok(BacklogStats {
            row_count: n as u64,
            payload_bytes: bytes as u64,
        })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_persisted_row(row: SqliteRow) -> Result<PersistedRow, StoreError> {
    Ok(PersistedRow {
        id: row.try_get("id")?,
        container_id: row.try_get("container_id")?,
        timestamp_ms: row.try_get("timestamp_ms")?,
        payload: row.try_get("payload")?,
        payload_size: row.try_get("payload_size")?,
    })
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use thiserror::Error;

use url_triage_util::StoreConfig;

pub mod triage;

pub use triage::{SubmissionSource, SummaryStore};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new connection pool for the configured store.
    ///
    /// The access key, when present, is applied as the `key` pragma before any
    /// other statement runs on a connection.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StorageError> {
        let mut options =
            SqliteConnectOptions::from_str(&config.uri).map_err(StorageError::Connect)?;
        if let Some(key) = &config.access_key {
            options = options.pragma("key", quote_literal(key));
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to read and write documents.
    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("failed to encode or decode document json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document timestamp {0} is out of range")]
    Timestamp(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Address of one document: database, container and id.
#[derive(Debug, Clone, Copy)]
pub struct DocumentKey<'a> {
    pub database_id: &'a str,
    pub container_id: &'a str,
    pub id: &'a str,
}

/// Stored document together with its last-modified timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

/// Repository over the `documents` table, which models containers of JSON
/// documents keyed by id.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Inserts the document or replaces the payload and timestamp of an existing one.
    pub async fn upsert(
        &self,
        key: DocumentKey<'_>,
        payload: &serde_json::Value,
        ts: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let payload_json = serde_json::to_string(payload)?;
        sqlx::query(
            "INSERT INTO documents (database_id, container_id, id, payload_json, ts) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(database_id, container_id, id) DO UPDATE \
             SET payload_json = excluded.payload_json, ts = excluded.ts",
        )
        .bind(key.database_id)
        .bind(key.container_id)
        .bind(key.id)
        .bind(payload_json)
        .bind(ts.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads a single document.
    pub async fn get(&self, key: DocumentKey<'_>) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query(
            "SELECT id, payload_json, ts FROM documents \
             WHERE database_id = ? AND container_id = ? AND id = ?",
        )
        .bind(key.database_id)
        .bind(key.container_id)
        .bind(key.id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload_json: String = row.get("payload_json");
        let ts: i64 = row.get("ts");
        Ok(Some(Document {
            id: row.get("id"),
            payload: serde_json::from_str(&payload_json)?,
            ts: DateTime::from_timestamp(ts, 0).ok_or(StorageError::Timestamp(ts))?,
        }))
    }

    /// Lists distinct document ids in a container modified strictly after `since`.
    pub async fn ids_modified_after(
        &self,
        database_id: &str,
        container_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, StorageError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT id FROM documents \
             WHERE database_id = ? AND container_id = ? AND ts > ? \
             ORDER BY id",
        )
        .bind(database_id)
        .bind(container_id)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Counts the documents stored in a container.
    pub async fn count(&self, database_id: &str, container_id: &str) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE database_id = ? AND container_id = ?",
        )
        .bind(database_id)
        .bind(container_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

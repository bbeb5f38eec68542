use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tinylink_core::store::{MappingStore, ReadMappingStore, Result};
use tinylink_core::{Mapping, MappingId, NewMapping, ShortCode, StorageError};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../ddl/mysql/url_mappings.sql");

/// MySQL implementation of the mapping store.
///
/// Rows live in `url_mappings`. `created_at` is stored as Unix epoch
/// milliseconds and the table uses a binary collation, so both short codes
/// and long URLs compare case-sensitively. The unique key on `short_code`
/// is the uniqueness constraint the engine relies on.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `url_mappings` table and its indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("MySQL schema is up to date");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn parse_created_at(millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", millis))
    })
}

/// Drops the sub-millisecond part of `ts`, matching what the column stores.
fn truncate_to_millis(ts: Timestamp) -> Result<Timestamp> {
    parse_created_at(ts.as_millisecond())
}

/// Smallest stored millisecond value not older than `cutoff`.
///
/// A row is older than `cutoff` exactly when its stored value is below this.
fn cutoff_millis(cutoff: Timestamp) -> Result<i64> {
    let millis = cutoff.as_millisecond();
    if parse_created_at(millis)? < cutoff {
        Ok(millis + 1)
    } else {
        Ok(millis)
    }
}

fn mapping_from_row(row: &MySqlRow) -> Result<Mapping> {
    let id: u64 = row.try_get("id").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(Mapping {
        id: MappingId::new(id),
        long_url,
        short_code: ShortCode::new_unchecked(short_code),
        created_at: parse_created_at(created_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadMappingStore for MySqlStore {
    async fn find_by_code(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        let row = sqlx::query(
            r#"
            SELECT id, long_url, short_code, created_at
            FROM url_mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Mapping>> {
        let row = sqlx::query(
            r#"
            SELECT id, long_url, short_code, created_at
            FROM url_mappings
            WHERE long_url = ?
            ORDER BY created_at, id
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn exists_by_code(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM url_mappings
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn count(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM url_mappings")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        u64::try_from(total)
            .map_err(|_| StorageError::InvalidData(format!("negative row count: {total}")))
    }

    async fn find_created_before(&self, cutoff: Timestamp) -> Result<Vec<Mapping>> {
        let rows = sqlx::query(
            r#"
            SELECT id, long_url, short_code, created_at
            FROM url_mappings
            WHERE created_at < ?
            ORDER BY created_at, id
            "#,
        )
        .bind(cutoff_millis(cutoff)?)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(mapping_from_row).collect()
    }
}

#[async_trait]
impl MappingStore for MySqlStore {
    async fn save(&self, mapping: NewMapping) -> Result<Mapping> {
        let created_at = truncate_to_millis(mapping.created_at.unwrap_or_else(Timestamp::now))?;

        let result = sqlx::query(
            r#"
            INSERT INTO url_mappings (long_url, short_code, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(mapping.long_url.as_str())
        .bind(mapping.short_code.as_str())
        .bind(created_at.as_millisecond())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = MappingId::new(done.last_insert_id());
                debug!(code = %mapping.short_code, id = %id, "Inserted mapping");
                Ok(mapping.with_created_at(created_at).into_mapping(id))
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(mapping.short_code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM url_mappings
            WHERE created_at < ?
            "#,
        )
        .bind(cutoff_millis(cutoff)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

//! # Local Cache Store
//!
//! Durable key-value persistence with per-entry expiry, backed by SQLite.
//!
//! Every logical key holds one JSON value wrapped with `cached_at` and an
//! optional `expires_at`. Entries are independent of each other; nothing
//! enforces consistency between, say, the machine list and the log list.
//!
//! A missing, expired or undecodable entry reads as a miss. Expired and
//! undecodable rows are deleted on the read that finds them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dieselsync::client::local_cache::{CacheKey, CacheStore};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), dieselsync::client::local_cache::CacheError> {
//! let cache = CacheStore::open("/tmp/dieselsync/cache.db".as_ref()).await?;
//! cache.set(CacheKey::Logs, &Vec::<String>::new(), Some(Duration::from_secs(3600))).await?;
//! let logs: Option<Vec<String>> = cache.get(CacheKey::Logs).await?;
//! # Ok(())
//! # }
//! ```

mod keys;

pub use keys::CacheKey;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from the local store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// A cached value with its timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// SQLite-backed key-value store
#[derive(Debug)]
pub struct CacheStore {
    pool: SqlitePool,
    /// Serializes read-modify-write cycles so optimistic updates never clobber each other
    write_lock: Mutex<()>,
}

impl CacheStore {
    /// Open or create the on-disk store
    ///
    /// Creates the parent directory and the database file if needed. Uses WAL
    /// mode so readers never wait on the writer.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Process-local store, lost on drop
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every in-memory connection is its own database: pin a single one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(include_str!("schema.sql")).execute(&pool).await?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// Read a value; misses on absent, expired or corrupt entries
    pub async fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Result<Option<T>> {
        Ok(self.entry(key).await?.map(|entry| entry.data))
    }

    /// Read a value with its timestamps
    pub async fn entry<T: DeserializeOwned>(&self, key: CacheKey) -> Result<Option<CacheEntry<T>>> {
        let row = sqlx::query("SELECT value, cached_at, expires_at FROM kv_cache WHERE key = ?")
            .bind(key.storage_key())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row.try_get("value")?;
        let cached_at: String = row.try_get("cached_at")?;
        let expires_at: Option<String> = row.try_get("expires_at")?;

        let decoded = decode_entry::<T>(&value, &cached_at, expires_at.as_deref());
        match decoded {
            Some(entry) if entry.is_expired_at(Utc::now()) => {
                tracing::debug!(key = %key, "cache entry expired, evicting");
                self.remove(key).await?;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry)),
            None => {
                tracing::warn!(key = %key, "cache entry is corrupt, treating as absent");
                self.remove(key).await?;
                Ok(None)
            }
        }
    }

    /// Store a value; `ttl` of `None` never expires
    pub async fn set<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T, ttl: Option<Duration>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(key, value, ttl).await
    }

    /// Read-modify-write under the store's write lock
    ///
    /// The closure receives the current value (or `None` on a miss) and
    /// returns the value to store plus something to hand back to the caller.
    pub async fn update<T, R, F>(&self, key: CacheKey, ttl: Option<Duration>, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> (T, R),
    {
        let _guard = self.write_lock.lock().await;
        let current = self.get::<T>(key).await?;
        let (next, out) = f(current);
        self.write(key, &next, ttl).await?;
        Ok(out)
    }

    /// Mutate an existing value in place; a miss writes nothing and returns `None`
    pub async fn modify<T, R, F>(&self, key: CacheKey, ttl: Option<Duration>, f: F) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut current) = self.get::<T>(key).await? else {
            return Ok(None);
        };
        let out = f(&mut current);
        self.write(key, &current, ttl).await?;
        Ok(Some(out))
    }

    async fn write<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T, ttl: Option<Duration>) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let now = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| (now + ttl).to_rfc3339());

        sqlx::query(
            "INSERT INTO kv_cache (key, value, cached_at, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at",
        )
        .bind(key.storage_key())
        .bind(json)
        .bind(now.to_rfc3339())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key = %key, "cache entry written");
        Ok(())
    }

    pub async fn remove(&self, key: CacheKey) -> Result<()> {
        sqlx::query("DELETE FROM kv_cache WHERE key = ?")
            .bind(key.storage_key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every expired row; returns how many went
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let rows = sqlx::query("SELECT key, expires_at FROM kv_cache WHERE expires_at IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut purged = 0;
        for row in rows {
            let key: String = row.try_get("key")?;
            let expires_at: String = row.try_get("expires_at")?;
            let expired = DateTime::parse_from_rfc3339(&expires_at)
                .map(|t| t.with_timezone(&Utc) <= now)
                .unwrap_or(true);
            if expired {
                purged += sqlx::query("DELETE FROM kv_cache WHERE key = ?")
                    .bind(key)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
            }
        }
        Ok(purged)
    }

    /// Drop everything (e.g. switching environments)
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM kv_cache").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode_entry<T: DeserializeOwned>(value: &str, cached_at: &str, expires_at: Option<&str>) -> Option<CacheEntry<T>> {
    let data = serde_json::from_str(value).ok()?;
    let cached_at = DateTime::parse_from_rfc3339(cached_at).ok()?.with_timezone(&Utc);
    let expires_at = match expires_at {
        Some(raw) => Some(DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc)),
        None => None,
    };
    Some(CacheEntry {
        data,
        cached_at,
        expires_at,
    })
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::{CacheEntry, CacheScope, LocalCacheRepository, StorageError};

use super::SqliteRepository;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl LocalCacheRepository for SqliteRepository {
    async fn put(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO local_cache (scope, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(scope, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(entry.scope.as_str())
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.updated_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get(&self, scope: &CacheScope, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT value, updated_at
            FROM local_cache
            WHERE scope = ?1 AND key = ?2
            ",
        )
        .bind(scope.as_str())
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row.try_get("value").map_err(ser)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
        Ok(Some(CacheEntry::new(scope.clone(), key, value, updated_at)))
    }

    async fn remove(&self, scope: &CacheScope, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM local_cache WHERE scope = ?1 AND key = ?2")
            .bind(scope.as_str())
            .bind(key)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn clear_scope(&self, scope: &CacheScope) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM local_cache WHERE scope = ?1")
            .bind(scope.as_str())
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(result.rows_affected())
    }
}

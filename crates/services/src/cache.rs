use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::repository::{CacheEntry, CacheScope, LocalCacheRepository};

use crate::error::CacheError;

/// A cached value and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub updated_at: DateTime<Utc>,
}

/// JSON view over the scoped local cache.
#[derive(Clone)]
pub struct LocalCache {
    repo: Arc<dyn LocalCacheRepository>,
    clock: Clock,
}

impl LocalCache {
    #[must_use]
    pub fn new(repo: Arc<dyn LocalCacheRepository>, clock: Clock) -> Self {
        Self { repo, clock }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// # Errors
    ///
    /// Returns `CacheError` if the value cannot be encoded or stored.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        scope: &CacheScope,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let entry = CacheEntry::new(scope.clone(), key, json, self.clock.now());
        self.repo.put(&entry).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CacheError` if the store fails or the cached JSON no longer
    /// matches `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        scope: &CacheScope,
        key: &str,
    ) -> Result<Option<Cached<T>>, CacheError> {
        let Some(entry) = self.repo.get(scope, key).await? else {
            return Ok(None);
        };
        Ok(Some(Cached {
            value: serde_json::from_str(&entry.value)?,
            updated_at: entry.updated_at,
        }))
    }

    /// # Errors
    ///
    /// Returns `CacheError` if the store fails.
    pub async fn remove(&self, scope: &CacheScope, key: &str) -> Result<(), CacheError> {
        Ok(self.repo.remove(scope, key).await?)
    }

    /// Drop every key under `scope`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store fails.
    pub async fn clear(&self, scope: &CacheScope) -> Result<u64, CacheError> {
        Ok(self.repo.clear_scope(scope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::fixed_clock;
    use course_core::model::{AnswerValue, Answers, QuestionId};
    use storage::repository::InMemoryRepository;

    fn cache() -> LocalCache {
        LocalCache::new(Arc::new(InMemoryRepository::new()), fixed_clock())
    }

    #[tokio::test]
    async fn answers_survive_a_round_trip_through_the_store() {
        let cache = cache();
        let scope = CacheScope::from_raw("assessment:test:9");
        let mut answers = Answers::new();
        answers.insert(QuestionId::new(1), AnswerValue::TrueFalse(true));
        answers.insert(QuestionId::new(2), AnswerValue::text("Paris"));

        cache.put(&scope, "answers", &answers).await.unwrap();
        let back: Cached<Answers> = cache.get(&scope, "answers").await.unwrap().unwrap();
        assert_eq!(back.value, answers);
        assert_eq!(back.updated_at, cache.clock().now());
    }

    #[tokio::test]
    async fn unreadable_json_is_reported() {
        let cache = cache();
        let scope = CacheScope::drafts();
        cache.put(&scope, "1", "plain text").await.unwrap();
        let err = cache.get::<Answers>(&scope, "1").await.unwrap_err();
        assert!(matches!(err, CacheError::Json(_)));
    }

    #[tokio::test]
    async fn clear_reports_removed_keys() {
        let cache = cache();
        let scope = CacheScope::from_raw("assessment:lesson:4");
        cache.put(&scope, "a", &1).await.unwrap();
        cache.put(&scope, "b", &2).await.unwrap();
        assert_eq!(cache.clear(&scope).await.unwrap(), 2);
        assert!(cache.get::<u32>(&scope, "a").await.unwrap().is_none());
    }
}

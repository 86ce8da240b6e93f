use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{AssessmentKind, SessionId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Namespace for cached values. Clearing a scope drops every key in it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheScope(String);

impl CacheScope {
    /// Per-session answers, questions and timer inputs: `assessment:<kind>:<session>`.
    #[must_use]
    pub fn assessment(kind: AssessmentKind, session: SessionId) -> Self {
        Self(format!("assessment:{kind}:{session}"))
    }

    /// Authored lesson drafts, keyed by lesson id.
    #[must_use]
    pub fn drafts() -> Self {
        Self("draft".to_owned())
    }

    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheScope({})", self.0)
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached value. `value` is an opaque (usually JSON) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub scope: CacheScope,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(
        scope: CacheScope,
        key: impl Into<String>,
        value: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scope,
            key: key.into(),
            value: value.into(),
            updated_at,
        }
    }
}

/// Repository contract for the scoped local cache.
#[async_trait]
pub trait LocalCacheRepository: Send + Sync {
    /// Insert or overwrite an entry. Last write wins per `(scope, key)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn put(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Fetch an entry, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing key is `Ok(None)`.
    async fn get(&self, scope: &CacheScope, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// Remove a single entry. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn remove(&self, scope: &CacheScope, key: &str) -> Result<(), StorageError>;

    /// Remove every entry in a scope, returning how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_scope(&self, scope: &CacheScope) -> Result<u64, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    entries: Arc<Mutex<HashMap<(CacheScope, String), CacheEntry>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalCacheRepository for InMemoryRepository {
    async fn put(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((entry.scope.clone(), entry.key.clone()), entry.clone());
        Ok(())
    }

    async fn get(&self, scope: &CacheScope, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(scope.clone(), key.to_owned())).cloned())
    }

    async fn remove(&self, scope: &CacheScope, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&(scope.clone(), key.to_owned()));
        Ok(())
    }

    async fn clear_scope(&self, scope: &CacheScope) -> Result<u64, StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|(entry_scope, _), _| entry_scope != scope);
        Ok((before - guard.len()) as u64)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub cache: Arc<dyn LocalCacheRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let cache: Arc<dyn LocalCacheRepository> = Arc::new(InMemoryRepository::new());
        Self { cache }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    fn entry(scope: &CacheScope, key: &str, value: &str) -> CacheEntry {
        CacheEntry::new(scope.clone(), key, value, fixed_now())
    }

    #[test]
    fn assessment_scopes_are_namespaced_by_kind_and_session() {
        let scope = CacheScope::assessment(AssessmentKind::Lesson, SessionId::new(12));
        assert_eq!(scope.as_str(), "assessment:lesson:12");
        assert_ne!(
            scope,
            CacheScope::assessment(AssessmentKind::Course, SessionId::new(12))
        );
    }

    #[tokio::test]
    async fn put_overwrites_and_get_reads_back() {
        let repo = InMemoryRepository::new();
        let scope = CacheScope::drafts();
        repo.put(&entry(&scope, "7", "first")).await.unwrap();
        repo.put(&entry(&scope, "7", "second")).await.unwrap();

        let got = repo.get(&scope, "7").await.unwrap().unwrap();
        assert_eq!(got.value, "second");
        assert!(repo.get(&scope, "8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_scope_leaves_other_scopes_alone() {
        let repo = InMemoryRepository::new();
        let session = CacheScope::assessment(AssessmentKind::Test, SessionId::new(1));
        let drafts = CacheScope::drafts();
        repo.put(&entry(&session, "answers", "{}")).await.unwrap();
        repo.put(&entry(&session, "questions", "[]")).await.unwrap();
        repo.put(&entry(&drafts, "1", "<p>hi</p>")).await.unwrap();

        assert_eq!(repo.clear_scope(&session).await.unwrap(), 2);
        assert!(repo.get(&session, "answers").await.unwrap().is_none());
        assert!(repo.get(&drafts, "1").await.unwrap().is_some());
        assert_eq!(repo.clear_scope(&session).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_missing_key_is_ok() {
        let storage = Storage::in_memory();
        storage
            .cache
            .remove(&CacheScope::drafts(), "nope")
            .await
            .unwrap();
    }
}

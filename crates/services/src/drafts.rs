use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{LessonContent, LessonId};
use storage::repository::CacheScope;
use tracing::{debug, info};

use crate::api::CourseApi;
use crate::cache::LocalCache;
use crate::error::DraftError;

/// An unpublished edit kept on this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDraft {
    pub lesson: LessonId,
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

/// Which copy of a lesson the author should continue editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftResolution {
    /// No newer local draft; edit the remote copy.
    Remote { content: String },
    /// The local draft is newer than the remote copy; ask which to keep.
    Conflict {
        local: LocalDraft,
        remote: String,
        remote_updated_at: Option<DateTime<Utc>>,
    },
}

/// Keeps lesson drafts in the local cache and publishes them.
#[derive(Clone)]
pub struct DraftService {
    api: Arc<dyn CourseApi>,
    cache: LocalCache,
}

impl DraftService {
    #[must_use]
    pub fn new(api: Arc<dyn CourseApi>, cache: LocalCache) -> Self {
        Self { api, cache }
    }

    /// # Errors
    ///
    /// Returns `DraftError::Cache` if the draft cannot be stored.
    pub async fn save_local(&self, lesson: LessonId, content: &str) -> Result<(), DraftError> {
        self.cache
            .put(&CacheScope::drafts(), &lesson.to_string(), content)
            .await?;
        debug!(lesson = %lesson, bytes = content.len(), "draft saved locally");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DraftError::Cache` if the store cannot be read.
    pub async fn local(&self, lesson: LessonId) -> Result<Option<LocalDraft>, DraftError> {
        let cached = self
            .cache
            .get::<String>(&CacheScope::drafts(), &lesson.to_string())
            .await?;
        Ok(cached.map(|c| LocalDraft {
            lesson,
            content: c.value,
            saved_at: c.updated_at,
        }))
    }

    /// Compare the local draft with the remote copy.
    ///
    /// A local draft wins a prompt only when it is strictly newer than the
    /// remote `updated_at` (or the remote has none) and actually differs.
    ///
    /// # Errors
    ///
    /// Returns `DraftError` if the lesson or the local draft cannot be read.
    pub async fn reconcile(&self, lesson: LessonId) -> Result<DraftResolution, DraftError> {
        let remote = self.api.lesson(lesson).await?;
        let remote_updated_at = remote.updated_at;
        let remote_text = remote_text(remote);

        let Some(local) = self.local(lesson).await? else {
            return Ok(DraftResolution::Remote {
                content: remote_text,
            });
        };

        let newer = remote_updated_at.is_none_or(|at| local.saved_at > at);
        if newer && local.content != remote_text {
            info!(lesson = %lesson, "local draft is newer than the remote copy");
            return Ok(DraftResolution::Conflict {
                local,
                remote: remote_text,
                remote_updated_at,
            });
        }
        Ok(DraftResolution::Remote {
            content: remote_text,
        })
    }

    /// # Errors
    ///
    /// Returns `DraftError::Cache` if the draft cannot be removed.
    pub async fn discard_local(&self, lesson: LessonId) -> Result<(), DraftError> {
        self.cache
            .remove(&CacheScope::drafts(), &lesson.to_string())
            .await?;
        Ok(())
    }

    /// Send the draft to the remote, then forget the local copy.
    ///
    /// # Errors
    ///
    /// Returns `DraftError::Gateway` if the remote rejects it; the local copy is kept.
    pub async fn publish(&self, lesson: LessonId, content: &str) -> Result<(), DraftError> {
        self.api.publish_draft(lesson, content).await?;
        info!(lesson = %lesson, "draft published");
        self.discard_local(lesson).await
    }
}

fn remote_text(content: LessonContent) -> String {
    if let Some(draft) = content.draft_content {
        return draft;
    }
    content.article_html().unwrap_or_default().to_owned()
}

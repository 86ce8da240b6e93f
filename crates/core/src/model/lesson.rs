use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::LessonId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("unknown lesson kind: {0}")]
    UnknownKind(String),
}

/// How a lesson delivers its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LessonKind {
    Article,
    Video,
}

impl LessonKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "ARTICLE",
            Self::Video => "VIDEO",
        }
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ARTICLE" => Ok(Self::Article),
            "VIDEO" => Ok(Self::Video),
            other => Err(LessonError::UnknownKind(other.to_owned())),
        }
    }
}

/// Renderable body of a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonBody {
    /// HTML produced by the authoring editor.
    Article(String),
    /// Location of the video file.
    Video(String),
}

/// A lesson as it appears in a course outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    order: u32,
    kind: LessonKind,
    unlocked: bool,
    has_assessment: bool,
    body: Option<LessonBody>,
    playback_offset: Option<u32>,
}

impl Lesson {
    /// Create a locked lesson with no assessment.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if the title is blank.
    pub fn new(id: LessonId, title: impl Into<String>, kind: LessonKind) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            order: 0,
            kind,
            unlocked: false,
            has_assessment: false,
            body: None,
            playback_offset: None,
        })
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_unlocked(mut self, unlocked: bool) -> Self {
        self.unlocked = unlocked;
        self
    }

    #[must_use]
    pub fn with_assessment(mut self, has_assessment: bool) -> Self {
        self.has_assessment = has_assessment;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<LessonBody>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_playback_offset(mut self, offset: Option<u32>) -> Self {
        self.playback_offset = offset;
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        self.kind
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Lessons with an assessment always route through a session before moving on.
    #[must_use]
    pub fn has_assessment(&self) -> bool {
        self.has_assessment
    }

    #[must_use]
    pub fn body(&self) -> Option<&LessonBody> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn playback_offset(&self) -> Option<u32> {
        self.playback_offset
    }
}

/// Full lesson payload fetched when the learner opens a lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonContent {
    pub id: LessonId,
    pub title: String,
    pub kind: LessonKind,
    pub body: Option<LessonBody>,
    pub draft_content: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LessonContent {
    #[must_use]
    pub fn article_html(&self) -> Option<&str> {
        match &self.body {
            Some(LessonBody::Article(html)) => Some(html),
            _ => None,
        }
    }

    #[must_use]
    pub fn video_ref(&self) -> Option<&str> {
        match &self.body {
            Some(LessonBody::Video(src)) => Some(src),
            _ => None,
        }
    }
}

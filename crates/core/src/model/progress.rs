use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::course::{Course, CourseSlug};
use crate::model::ids::{CourseId, LessonId};
use crate::model::lesson::Lesson;

/// Snapshot of a learner's enrollment in one course.
///
/// Always re-read from the remote after a progression step; never updated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    pub course_id: CourseId,
    pub course_slug: CourseSlug,
    pub course_title: String,
    /// 0..=100
    pub completion_percent: u8,
    pub completed_modules: u32,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub last_accessed: Option<DateTime<Utc>>,
    pub resume_lesson: Option<LessonId>,
}

impl EnrollmentProgress {
    /// Clamp an arbitrary remote percentage into `0..=100`.
    #[must_use]
    pub fn clamp_percent(raw: f64) -> u8 {
        if raw.is_nan() {
            return 0;
        }
        // Clamped first, so the cast cannot truncate.
        raw.round().clamp(0.0, 100.0) as u8
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion_percent >= 100
    }

    /// The lesson to reopen: the resume pointer when the course still lists it,
    /// otherwise the first unlocked lesson.
    #[must_use]
    pub fn resume_target<'a>(&self, course: &'a Course) -> Option<&'a Lesson> {
        self.resume_lesson
            .and_then(|id| course.lesson(id))
            .or_else(|| course.first_unlocked())
    }
}

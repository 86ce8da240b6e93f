use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId};
use crate::model::lesson::Lesson;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course slug cannot be empty")]
    EmptySlug,

    #[error("lesson {0} appears more than once in the course")]
    DuplicateLesson(LessonId),
}

//
// ─── SLUG ──────────────────────────────────────────────────────────────────────
//

/// URL-safe course key used by every course-scoped endpoint.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseSlug(String);

impl CourseSlug {
    /// # Errors
    ///
    /// Returns `CourseError::EmptySlug` for blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self, CourseError> {
        let raw = raw.into();
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(CourseError::EmptySlug);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CourseSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CourseSlug({})", self.0)
    }
}

impl fmt::Display for CourseSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Ordered group of lessons.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    id: ModuleId,
    title: String,
    order: u32,
    lessons: Vec<Lesson>,
}

impl Module {
    /// Lessons are kept in ascending `order`; ties keep their given position.
    #[must_use]
    pub fn new(id: ModuleId, title: impl Into<String>, order: u32, mut lessons: Vec<Lesson>) -> Self {
        lessons.sort_by_key(Lesson::order);
        Self {
            id,
            title: title.into(),
            order,
            lessons,
        }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
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
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A course outline: modules in module order, each with its lessons in lesson order.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    id: CourseId,
    slug: CourseSlug,
    title: String,
    modules: Vec<Module>,
}

impl Course {
    /// Build a course, sorting modules by `order` (stable).
    ///
    /// # Errors
    ///
    /// Returns `CourseError::DuplicateLesson` if a lesson id appears twice.
    pub fn new(
        id: CourseId,
        slug: CourseSlug,
        title: impl Into<String>,
        mut modules: Vec<Module>,
    ) -> Result<Self, CourseError> {
        modules.sort_by_key(Module::order);

        let mut seen = HashSet::new();
        for lesson in modules.iter().flat_map(|m| m.lessons.iter()) {
            if !seen.insert(lesson.id()) {
                return Err(CourseError::DuplicateLesson(lesson.id()));
            }
        }

        Ok(Self {
            id,
            slug,
            title: title.into(),
            modules,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn slug(&self) -> &CourseSlug {
        &self.slug
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// All lessons, modules first then lessons within each module.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    #[must_use]
    pub fn lesson_at(&self, index: usize) -> Option<&Lesson> {
        self.lessons().nth(index)
    }

    #[must_use]
    pub fn position_of(&self, id: LessonId) -> Option<usize> {
        self.lessons().position(|l| l.id() == id)
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons().find(|l| l.id() == id)
    }

    #[must_use]
    pub fn predecessor(&self, id: LessonId) -> Option<&Lesson> {
        let index = self.position_of(id)?;
        index.checked_sub(1).and_then(|prev| self.lesson_at(prev))
    }

    #[must_use]
    pub fn successor(&self, id: LessonId) -> Option<&Lesson> {
        let index = self.position_of(id)?;
        self.lesson_at(index + 1)
    }

    #[must_use]
    pub fn is_last(&self, id: LessonId) -> bool {
        self.position_of(id)
            .is_some_and(|index| index + 1 == self.lesson_count())
    }

    #[must_use]
    pub fn first_unlocked(&self) -> Option<&Lesson> {
        self.lessons().find(|l| l.is_unlocked())
    }
}

/// Outcome of looking up the lesson the learner is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LessonResolution<'a> {
    Ready { index: usize, lesson: &'a Lesson },
    /// The course is not loaded yet or does not (yet) list this lesson.
    NotReady,
}

/// Resolve a lesson id against a course that may still be loading.
#[must_use]
pub fn resolve_current(course: Option<&Course>, id: LessonId) -> LessonResolution<'_> {
    let Some(course) = course else {
        return LessonResolution::NotReady;
    };
    course
        .lessons()
        .enumerate()
        .find(|(_, lesson)| lesson.id() == id)
        .map_or(LessonResolution::NotReady, |(index, lesson)| {
            LessonResolution::Ready { index, lesson }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::lesson::LessonKind;

    fn lesson(id: u64, order: u32) -> Lesson {
        Lesson::new(LessonId::new(id), format!("Lesson {id}"), LessonKind::Article)
            .unwrap()
            .with_order(order)
            .with_unlocked(true)
    }

    fn course() -> Course {
        // Modules and lessons are deliberately given out of order.
        let second = Module::new(ModuleId::new(2), "Two", 2, vec![lesson(5, 2), lesson(4, 1)]);
        let first = Module::new(
            ModuleId::new(1),
            "One",
            1,
            vec![lesson(3, 3), lesson(1, 1), lesson(2, 2)],
        );
        Course::new(
            CourseId::new(10),
            CourseSlug::new("rust-101").unwrap(),
            "Rust 101",
            vec![second, first],
        )
        .unwrap()
    }

    #[test]
    fn flattening_is_module_order_then_lesson_order() {
        let ids: Vec<u64> = course().lessons().map(|l| l.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn resolve_current_returns_exactly_the_requested_lesson() {
        let course = course();
        for (expected_index, lesson) in course.lessons().enumerate() {
            match resolve_current(Some(&course), lesson.id()) {
                LessonResolution::Ready { index, lesson: found } => {
                    assert_eq!(index, expected_index);
                    assert_eq!(found.id(), lesson.id());
                }
                LessonResolution::NotReady => panic!("lesson {} not resolved", lesson.id()),
            }
        }
    }

    #[test]
    fn resolve_current_tolerates_missing_course_or_lesson() {
        assert_eq!(
            resolve_current(None, LessonId::new(1)),
            LessonResolution::NotReady
        );
        assert_eq!(
            resolve_current(Some(&course()), LessonId::new(99)),
            LessonResolution::NotReady
        );
    }

    #[test]
    fn neighbours_follow_flattened_order() {
        let course = course();
        assert_eq!(course.predecessor(LessonId::new(4)).map(Lesson::id), Some(LessonId::new(3)));
        assert_eq!(course.successor(LessonId::new(3)).map(Lesson::id), Some(LessonId::new(4)));
        assert!(course.predecessor(LessonId::new(1)).is_none());
        assert!(course.successor(LessonId::new(5)).is_none());
        assert!(course.is_last(LessonId::new(5)));
        assert!(!course.is_last(LessonId::new(4)));
    }

    #[test]
    fn duplicate_lessons_are_rejected() {
        let module = Module::new(ModuleId::new(1), "Dup", 1, vec![lesson(1, 1), lesson(1, 2)]);
        let err = Course::new(
            CourseId::new(1),
            CourseSlug::new("dup").unwrap(),
            "Dup",
            vec![module],
        )
        .unwrap_err();
        assert_eq!(err, CourseError::DuplicateLesson(LessonId::new(1)));
    }

    #[test]
    fn slug_trims_slashes_and_rejects_blank() {
        assert_eq!(CourseSlug::new("/rust-101/").unwrap().as_str(), "rust-101");
        assert_eq!(CourseSlug::new(" ").unwrap_err(), CourseError::EmptySlug);
    }
}

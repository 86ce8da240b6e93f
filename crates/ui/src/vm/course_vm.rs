use course_core::model::{Course, EnrollmentProgress, LessonId, LessonKind};
use services::ProgressSummary;

use crate::vm::time_fmt::format_datetime;

/// One row in the course outline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonRowVm {
    pub id: LessonId,
    pub title: String,
    pub kind: LessonKind,
    pub locked: bool,
    pub current: bool,
    pub has_assessment: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleVm {
    pub title: String,
    pub lessons: Vec<LessonRowVm>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseOutlineVm {
    pub title: String,
    pub percent: u8,
    pub progress_bar: String,
    pub lessons_label: String,
    pub modules: Vec<ModuleVm>,
}

const BAR_WIDTH: usize = 20;

/// Outline of `course` with `current` highlighted.
#[must_use]
pub fn course_outline_vm(
    course: &Course,
    progress: &EnrollmentProgress,
    current: Option<LessonId>,
) -> CourseOutlineVm {
    let modules = course
        .modules()
        .iter()
        .map(|module| ModuleVm {
            title: module.title().to_owned(),
            lessons: module
                .lessons()
                .iter()
                .map(|lesson| LessonRowVm {
                    id: lesson.id(),
                    title: lesson.title().to_owned(),
                    kind: lesson.kind(),
                    locked: !lesson.is_unlocked(),
                    current: Some(lesson.id()) == current,
                    has_assessment: lesson.has_assessment(),
                })
                .collect(),
        })
        .collect();

    CourseOutlineVm {
        title: course.title().to_owned(),
        percent: progress.completion_percent,
        progress_bar: progress_bar(progress.completion_percent, BAR_WIDTH),
        lessons_label: format!(
            "{} of {} lessons",
            progress.completed_lessons, progress.total_lessons
        ),
        modules,
    }
}

/// `[#####.....]`-style bar, `width` cells wide.
#[must_use]
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = percent * width / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

/// Dashboard card for one enrollment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrollmentCardVm {
    pub slug: String,
    pub title: String,
    pub title_preview: String,
    pub percent: u8,
    pub complete: bool,
    pub last_accessed_str: Option<String>,
}

impl From<&EnrollmentProgress> for EnrollmentCardVm {
    fn from(item: &EnrollmentProgress) -> Self {
        Self {
            slug: item.course_slug.as_str().to_owned(),
            title: item.course_title.clone(),
            title_preview: truncate_preview(&item.course_title, 40),
            percent: item.completion_percent,
            complete: item.is_complete(),
            last_accessed_str: item.last_accessed.map(format_datetime),
        }
    }
}

/// Most recently accessed first; never-opened courses last.
#[must_use]
pub fn map_enrollments(items: &[EnrollmentProgress]) -> Vec<EnrollmentCardVm> {
    let mut sorted: Vec<&EnrollmentProgress> = items.iter().collect();
    sorted.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
    sorted.into_iter().map(EnrollmentCardVm::from).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryVm {
    pub lessons: String,
    pub modules: String,
    pub courses: String,
}

#[must_use]
pub fn summary_vm(summary: &ProgressSummary) -> SummaryVm {
    SummaryVm {
        lessons: format!(
            "{}/{} lessons",
            summary.lessons.completed, summary.lessons.total
        ),
        modules: format!(
            "{}/{} modules",
            summary.modules.completed, summary.modules.total
        ),
        courses: format!(
            "{}/{} courses",
            summary.courses.completed, summary.courses.total
        ),
    }
}

fn truncate_preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let first_line = trimmed.lines().next().unwrap_or("");
    let has_more_lines = trimmed.lines().nth(1).is_some();

    let mut out: String = first_line.chars().take(max_chars).collect();
    if has_more_lines || first_line.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

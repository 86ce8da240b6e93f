//! Wire shapes and their conversion into domain types.
//!
//! The remote is loose about optional fields, so most are defaulted here and
//! validated on conversion.

use chrono::{DateTime, Utc};
use course_core::model::{
    AssessmentId, Course, CourseId, CourseSlug, EnrollmentProgress, Lesson, LessonBody,
    LessonContent, LessonId, LessonKind, McqOption, Module, ModuleId, OptionId, Question,
    QuestionId, QuestionKind, QuestionType, SessionId, SessionTiming,
};
use serde::Deserialize;

use super::{CourseSnapshot, NextStep, SessionPayload, StartedTest, SubmitVerdict};
use crate::error::GatewayError;

fn invalid(what: &str, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Decode(format!("{what}: {err}"))
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressDto {
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub lesson: u32,
    #[serde(default)]
    pub module: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonDto {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub is_unlocked: bool,
    #[serde(default)]
    pub has_assessment: bool,
    #[serde(rename = "type")]
    pub kind: LessonKind,
    pub video_file: Option<String>,
    pub content: Option<String>,
    pub draft_content: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LessonDto {
    fn body(&self) -> Option<LessonBody> {
        match self.kind {
            LessonKind::Article => self.content.clone().map(LessonBody::Article),
            LessonKind::Video => self.video_file.clone().map(LessonBody::Video),
        }
    }

    fn into_lesson(self) -> Result<Lesson, GatewayError> {
        let body = self.body();
        Ok(Lesson::new(LessonId::new(self.id), self.title, self.kind)
            .map_err(|e| invalid("lesson", e))?
            .with_order(self.order)
            .with_unlocked(self.is_unlocked)
            .with_assessment(self.has_assessment)
            .with_body(body))
    }

    pub fn into_content(self) -> LessonContent {
        let body = self.body();
        LessonContent {
            id: LessonId::new(self.id),
            title: self.title,
            kind: self.kind,
            body,
            draft_content: self.draft_content,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModuleDto {
    pub id: u64,
    pub order: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<LessonDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseDto {
    pub id: u64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub modules: Vec<ModuleDto>,
    pub resume_lesson_id: Option<u64>,
    pub progress: Option<ProgressDto>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl CourseDto {
    pub fn into_snapshot(self) -> Result<CourseSnapshot, GatewayError> {
        let slug = CourseSlug::new(self.slug).map_err(|e| invalid("course", e))?;

        let mut modules = Vec::with_capacity(self.modules.len());
        for (position, module) in self.modules.into_iter().enumerate() {
            // Modules without an explicit order keep their listed position.
            let order = module
                .order
                .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
            let lessons = module
                .lessons
                .into_iter()
                .map(LessonDto::into_lesson)
                .collect::<Result<Vec<_>, _>>()?;
            modules.push(Module::new(ModuleId::new(module.id), module.title, order, lessons));
        }

        let course = Course::new(CourseId::new(self.id), slug.clone(), self.title, modules)
            .map_err(|e| invalid("course", e))?;
        let total_lessons = u32::try_from(course.lesson_count()).unwrap_or(u32::MAX);
        let progress = self.progress.unwrap_or(ProgressDto {
            percentage: 0.0,
            lesson: 0,
            module: 0,
        });

        let progress = EnrollmentProgress {
            course_id: course.id(),
            course_slug: slug,
            course_title: course.title().to_owned(),
            completion_percent: EnrollmentProgress::clamp_percent(progress.percentage),
            completed_modules: progress.module,
            completed_lessons: progress.lesson,
            total_lessons,
            last_accessed: self.last_accessed_at,
            resume_lesson: self.resume_lesson_id.map(LessonId::new),
        };
        Ok(CourseSnapshot { course, progress })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrolledCourseInfoDto {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub lesson_count: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrolledCourseDto {
    pub course: EnrolledCourseInfoDto,
    pub progress: Option<ProgressDto>,
    pub resume_lesson_id: Option<u64>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl EnrolledCourseDto {
    pub fn into_progress(self) -> Result<EnrollmentProgress, GatewayError> {
        let progress = self.progress.unwrap_or(ProgressDto {
            percentage: 0.0,
            lesson: 0,
            module: 0,
        });
        Ok(EnrollmentProgress {
            course_id: CourseId::new(self.course.id),
            course_slug: CourseSlug::new(self.course.slug).map_err(|e| invalid("enrollment", e))?,
            course_title: self.course.title,
            completion_percent: EnrollmentProgress::clamp_percent(progress.percentage),
            completed_modules: progress.module,
            completed_lessons: progress.lesson,
            total_lessons: self.course.lesson_count,
            last_accessed: self.last_accessed_at,
            resume_lesson: self.resume_lesson_id.map(LessonId::new),
        })
    }
}

//
// ─── NAVIGATION ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct NextStepDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
}

impl NextStepDto {
    pub fn into_step(self) -> Result<NextStep, GatewayError> {
        let url = || {
            self.url
                .clone()
                .ok_or_else(|| invalid("next step", format!("{} without url", self.kind)))
        };
        match self.kind.as_str() {
            "lesson" => Ok(NextStep::Lesson { url: url()? }),
            "assessment" => Ok(NextStep::Assessment { url: url()? }),
            "end" => Ok(NextStep::End),
            other => Err(invalid("next step", format!("unknown type {other:?}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitDto {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl SubmitDto {
    pub fn into_verdict(self) -> Result<SubmitVerdict, GatewayError> {
        let url = |kind: &str| {
            self.url
                .clone()
                .ok_or_else(|| invalid("submit", format!("{kind} without url")))
        };
        match self.kind.as_deref() {
            Some("retry_lesson") => Ok(SubmitVerdict::RetryLesson {
                url: url("retry_lesson")?,
            }),
            Some("lesson") => Ok(SubmitVerdict::Lesson { url: url("lesson")? }),
            Some("end") => Ok(SubmitVerdict::End),
            None => Ok(SubmitVerdict::Recorded),
            Some(other) => Err(invalid("submit", format!("unknown type {other:?}"))),
        }
    }
}

//
// ─── ASSESSMENTS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct StartSessionDto {
    #[serde(alias = "assessmentSessionId")]
    pub assessment_session_id: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OptionDto {
    pub id: Option<u64>,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DetailsDto {
    #[serde(default)]
    pub options: Vec<OptionDto>,
    pub is_true: Option<bool>,
    pub correct_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionDto {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub order: Option<u32>,
    #[serde(default)]
    pub details: DetailsDto,
}

impl QuestionDto {
    fn into_question(self) -> Result<Question, GatewayError> {
        let kind = match self.kind.parse::<QuestionType>() {
            Ok(QuestionType::MultipleChoice) => QuestionKind::MultipleChoice {
                options: self
                    .details
                    .options
                    .into_iter()
                    .map(|o| McqOption {
                        id: o.id.map(OptionId::new),
                        text: o.text,
                        is_correct: o.is_correct,
                    })
                    .collect(),
            },
            Ok(QuestionType::TrueFalse) => QuestionKind::TrueFalse {
                expected: self.details.is_true.unwrap_or_default(),
            },
            Ok(QuestionType::FillInBlank) => QuestionKind::FillInBlank {
                expected: self.details.correct_answer.unwrap_or_default(),
            },
            Err(e) => return Err(invalid("question", e)),
        };
        Question::new(QuestionId::new(self.id), self.text, kind).map_err(|e| invalid("question", e))
    }
}

/// Questions arrive either flat or wrapped as `{order, question: {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum QuestionEnvelope {
    Wrapped { order: Option<u32>, question: QuestionDto },
    Flat(QuestionDto),
}

impl QuestionEnvelope {
    fn order(&self) -> Option<u32> {
        match self {
            Self::Wrapped { order, question } => order.or(question.order),
            Self::Flat(question) => question.order,
        }
    }

    fn into_question(self) -> Result<Question, GatewayError> {
        match self {
            Self::Wrapped { question, .. } | Self::Flat(question) => question.into_question(),
        }
    }
}

/// Stable sort by `order` when present, then convert.
pub(crate) fn questions_from(
    mut envelopes: Vec<QuestionEnvelope>,
) -> Result<Vec<Question>, GatewayError> {
    envelopes.sort_by_key(|e| e.order().unwrap_or(u32::MAX));
    envelopes
        .into_iter()
        .map(QuestionEnvelope::into_question)
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    #[serde(alias = "assessment_id", rename = "assessmentId")]
    pub assessment_id: Option<u64>,
    #[serde(alias = "course_slug", rename = "courseSlug")]
    pub course_slug: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub questions: Vec<QuestionEnvelope>,
}

impl SessionDto {
    pub fn into_payload(self) -> Result<SessionPayload, GatewayError> {
        let course_slug = self
            .course_slug
            .map(CourseSlug::new)
            .transpose()
            .map_err(|e| invalid("session", e))?;
        let timing = match (self.started_at, self.duration_minutes) {
            (Some(started_at), Some(duration_minutes)) => Some(SessionTiming {
                started_at,
                duration_minutes,
            }),
            _ => None,
        };
        Ok(SessionPayload {
            assessment_id: self.assessment_id.map(AssessmentId::new),
            course_slug,
            questions: questions_from(self.questions)?,
            timing,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartTestDto {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: u64,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub questions: Vec<QuestionEnvelope>,
}

impl StartTestDto {
    pub fn into_started(self) -> Result<StartedTest, GatewayError> {
        Ok(StartedTest {
            session: SessionId::new(self.session_id),
            timing: SessionTiming {
                started_at: self.started_at,
                duration_minutes: self.duration_minutes,
            },
            questions: questions_from(self.questions)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonProgressDto {
    #[serde(default, alias = "current_time")]
    pub progress: f64,
}

impl LessonProgressDto {
    /// Floored whole seconds; negative or missing positions read as zero.
    pub fn seconds(&self) -> u64 {
        if self.progress.is_finite() && self.progress > 0.0 {
            self.progress.floor() as u64
        } else {
            0
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::answer::{AnswerValue, Answers};
use crate::model::course::CourseSlug;
use crate::model::ids::{AssessmentId, CategoryId, LessonId, QuestionId, SessionId};
use crate::model::question::{Question, QuestionType};

/// Score below which a lesson assessment is usually failed.
///
/// Informational only: the remote verdict decides routing.
pub const INFORMATIONAL_PASS_PERCENT: u8 = 50;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("assessment session has no questions")]
    NoQuestions,

    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),

    #[error("a choice answer is only accepted while a multiple-choice question is shown")]
    ChoiceRejected,

    #[error("no answers recorded")]
    NoAnswers,

    #[error("assessment session is already closed")]
    Closed,

    #[error("unknown assessment kind: {0}")]
    UnknownKind(String),
}

//
// ─── KIND & OWNER ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Lesson,
    Course,
    Test,
}

impl AssessmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Course => "course",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lesson" => Ok(Self::Lesson),
            "course" => Ok(Self::Course),
            "test" => Ok(Self::Test),
            other => Err(SessionStateError::UnknownKind(other.to_owned())),
        }
    }
}

/// What an assessment session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SessionOwner {
    Lesson(LessonId),
    Course(CourseSlug),
    Test(CategoryId),
}

impl SessionOwner {
    #[must_use]
    pub fn kind(&self) -> AssessmentKind {
        match self {
            Self::Lesson(_) => AssessmentKind::Lesson,
            Self::Course(_) => AssessmentKind::Course,
            Self::Test(_) => AssessmentKind::Test,
        }
    }
}

//
// ─── TIMING ────────────────────────────────────────────────────────────────────
//

/// Wall-clock bounds of a timed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl SessionTiming {
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// `deadline - now`, clamped at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline() - now).max(Duration::zero())
    }
}

/// Result of observing the deadline once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineTick {
    Running(Duration),
    /// The deadline was reached on this tick. Reported once.
    Expired,
    /// Already expired on an earlier tick.
    Idle,
}

/// Tracks remaining time so it never increases and expiry fires at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineWatch {
    timing: SessionTiming,
    last_remaining: Option<Duration>,
    fired: bool,
}

impl DeadlineWatch {
    #[must_use]
    pub fn new(timing: SessionTiming) -> Self {
        Self {
            timing,
            last_remaining: None,
            fired: false,
        }
    }

    #[must_use]
    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Remaining time as last observed (or full duration before the first tick).
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.last_remaining
            .unwrap_or_else(|| Duration::minutes(i64::from(self.timing.duration_minutes)))
    }

    pub fn observe(&mut self, now: DateTime<Utc>) -> DeadlineTick {
        if self.fired {
            return DeadlineTick::Idle;
        }
        let computed = self.timing.remaining(now);
        let remaining = match self.last_remaining {
            Some(previous) => computed.min(previous),
            None => computed,
        };
        self.last_remaining = Some(remaining);

        if remaining <= Duration::zero() {
            self.fired = true;
            DeadlineTick::Expired
        } else {
            DeadlineTick::Running(remaining)
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Submitted,
    Expired,
}

/// One attempt at an assessment: question set, cursor, and buffered answers.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSession {
    id: SessionId,
    owner: SessionOwner,
    assessment_id: Option<AssessmentId>,
    course_slug: Option<CourseSlug>,
    questions: Vec<Question>,
    answers: Answers,
    current: usize,
    timing: Option<SessionTiming>,
    state: SessionState,
}

impl AssessmentSession {
    /// # Errors
    ///
    /// Returns `SessionStateError::NoQuestions` if the question set is empty.
    pub fn new(
        id: SessionId,
        owner: SessionOwner,
        questions: Vec<Question>,
    ) -> Result<Self, SessionStateError> {
        if questions.is_empty() {
            return Err(SessionStateError::NoQuestions);
        }
        Ok(Self {
            id,
            owner,
            assessment_id: None,
            course_slug: None,
            questions,
            answers: Answers::new(),
            current: 0,
            timing: None,
            state: SessionState::InProgress,
        })
    }

    #[must_use]
    pub fn with_assessment(mut self, assessment_id: AssessmentId, course_slug: Option<CourseSlug>) -> Self {
        self.assessment_id = Some(assessment_id);
        self.course_slug = course_slug;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: SessionTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Restore previously buffered answers, dropping any for unknown questions.
    #[must_use]
    pub fn with_answers(mut self, mut answers: Answers) -> Self {
        answers.retain(|id, _| self.questions.iter().any(|q| q.id() == id));
        self.answers = answers;
        self
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> &SessionOwner {
        &self.owner
    }

    #[must_use]
    pub fn kind(&self) -> AssessmentKind {
        self.owner.kind()
    }

    #[must_use]
    pub fn assessment_id(&self) -> Option<AssessmentId> {
        self.assessment_id
    }

    #[must_use]
    pub fn course_slug(&self) -> Option<&CourseSlug> {
        self.course_slug.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Indexed lookup. Out-of-range indexes yield `None`; callers clamp.
    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.question_at(self.current)
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    #[must_use]
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(question)
    }

    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total().saturating_sub(self.answers.len())
    }

    #[must_use]
    pub fn timing(&self) -> Option<SessionTiming> {
        self.timing
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == SessionState::InProgress
    }

    /// Record an answer locally.
    ///
    /// # Errors
    ///
    /// Returns `Closed` once submitted or expired, `UnknownQuestion` for ids outside the
    /// session, and `ChoiceRejected` for a choice while the shown question is not MCQ.
    pub fn record_answer(
        &mut self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), SessionStateError> {
        if !self.is_open() {
            return Err(SessionStateError::Closed);
        }
        if !self.questions.iter().any(|q| q.id() == question) {
            return Err(SessionStateError::UnknownQuestion(question));
        }
        if matches!(value, AnswerValue::Choice(_)) {
            let shown = self.current_question().map(Question::question_type);
            if shown != Some(QuestionType::MultipleChoice) {
                return Err(SessionStateError::ChoiceRejected);
            }
        }
        self.answers.insert(question, value);
        Ok(())
    }

    /// Move forward one question, clamped to the last index.
    pub fn next(&mut self) -> usize {
        let last = self.questions.len().saturating_sub(1);
        self.current = (self.current + 1).min(last);
        self.current
    }

    /// Move back one question, clamped at zero.
    pub fn prev(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// # Errors
    ///
    /// Returns `Closed` if the session is no longer in progress and
    /// `NoAnswers` if nothing has been answered.
    pub fn ensure_submittable(&self) -> Result<(), SessionStateError> {
        if !self.is_open() {
            return Err(SessionStateError::Closed);
        }
        if self.answers.is_empty() {
            return Err(SessionStateError::NoAnswers);
        }
        Ok(())
    }

    pub fn mark_submitted(&mut self) {
        self.state = SessionState::Submitted;
    }

    pub fn mark_expired(&mut self) {
        self.state = SessionState::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::OptionId;
    use crate::model::question::{McqOption, QuestionKind};
    use crate::time::fixed_now;

    fn questions() -> Vec<Question> {
        vec![
            Question::new(
                QuestionId::new(1),
                "Pick",
                QuestionKind::MultipleChoice {
                    options: vec![
                        McqOption::new(Some(OptionId::new(10)), "a"),
                        McqOption::new(Some(OptionId::new(11)), "b"),
                    ],
                },
            )
            .unwrap(),
            Question::new(QuestionId::new(2), "True?", QuestionKind::TrueFalse { expected: true })
                .unwrap(),
            Question::new(
                QuestionId::new(3),
                "Fill ______ in",
                QuestionKind::FillInBlank {
                    expected: "this".into(),
                },
            )
            .unwrap(),
        ]
    }

    fn session() -> AssessmentSession {
        AssessmentSession::new(
            SessionId::new(5),
            SessionOwner::Lesson(LessonId::new(9)),
            questions(),
        )
        .unwrap()
    }

    #[test]
    fn empty_question_set_is_rejected() {
        let err = AssessmentSession::new(
            SessionId::new(1),
            SessionOwner::Test(CategoryId::new(1)),
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::NoQuestions);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut s = session();
        assert_eq!(s.prev(), 0);
        assert_eq!(s.next(), 1);
        assert_eq!(s.next(), 2);
        assert_eq!(s.next(), 2);
        assert!(s.is_last());
        assert_eq!(s.prev(), 1);
    }

    #[test]
    fn question_at_does_not_clamp() {
        let s = session();
        assert!(s.question_at(3).is_none());
        assert_eq!(s.question_at(2).map(Question::id), Some(QuestionId::new(3)));
    }

    #[test]
    fn choice_answers_need_a_multiple_choice_question_on_screen() {
        let mut s = session();
        s.record_answer(QuestionId::new(1), AnswerValue::Choice(OptionId::new(10)))
            .unwrap();
        s.next();
        let err = s
            .record_answer(QuestionId::new(1), AnswerValue::Choice(OptionId::new(11)))
            .unwrap_err();
        assert_eq!(err, SessionStateError::ChoiceRejected);
        assert_eq!(
            s.answer_for(QuestionId::new(1)),
            Some(&AnswerValue::Choice(OptionId::new(10)))
        );
    }

    #[test]
    fn text_and_bool_answers_record_by_id_regardless_of_cursor() {
        let mut s = session();
        s.record_answer(QuestionId::new(3), AnswerValue::text("this")).unwrap();
        s.record_answer(QuestionId::new(2), AnswerValue::TrueFalse(false)).unwrap();
        assert_eq!(s.answers().len(), 2);
        assert_eq!(s.unanswered(), 1);
    }

    #[test]
    fn repeated_answers_never_grow_past_question_count() {
        let mut s = session();
        for round in 0..10 {
            s.record_answer(QuestionId::new(3), AnswerValue::text(format!("v{round}")))
                .unwrap();
            s.record_answer(QuestionId::new(2), AnswerValue::TrueFalse(round % 2 == 0))
                .unwrap();
        }
        assert!(s.answers().len() <= s.total());
        assert_eq!(s.answer_for(QuestionId::new(3)), Some(&AnswerValue::text("v9")));
        assert_eq!(
            s.record_answer(QuestionId::new(42), AnswerValue::text("x")),
            Err(SessionStateError::UnknownQuestion(QuestionId::new(42)))
        );
    }

    #[test]
    fn submit_requires_answers_and_open_state() {
        let mut s = session();
        assert_eq!(s.ensure_submittable(), Err(SessionStateError::NoAnswers));
        s.record_answer(QuestionId::new(2), AnswerValue::TrueFalse(true)).unwrap();
        assert_eq!(s.ensure_submittable(), Ok(()));
        s.mark_submitted();
        assert_eq!(s.ensure_submittable(), Err(SessionStateError::Closed));
        assert_eq!(
            s.record_answer(QuestionId::new(2), AnswerValue::TrueFalse(false)),
            Err(SessionStateError::Closed)
        );
    }

    #[test]
    fn restored_answers_are_filtered_to_known_questions() {
        let mut restored = Answers::new();
        restored.insert(QuestionId::new(2), AnswerValue::TrueFalse(true));
        restored.insert(QuestionId::new(77), AnswerValue::text("stale"));
        let s = session().with_answers(restored);
        assert_eq!(s.answers().len(), 1);
    }

    #[test]
    fn deadline_is_monotonic_and_fires_once() {
        let start = fixed_now();
        let timing = SessionTiming {
            started_at: start,
            duration_minutes: 1,
        };
        let mut watch = DeadlineWatch::new(timing);

        assert_eq!(
            watch.observe(start + Duration::seconds(10)),
            DeadlineTick::Running(Duration::seconds(50))
        );
        // A clock that steps backwards must not grow the remaining time.
        assert_eq!(
            watch.observe(start + Duration::seconds(5)),
            DeadlineTick::Running(Duration::seconds(50))
        );
        assert_eq!(watch.observe(start + Duration::seconds(60)), DeadlineTick::Expired);
        assert_eq!(watch.observe(start + Duration::seconds(61)), DeadlineTick::Idle);
        assert_eq!(watch.observe(start + Duration::seconds(90)), DeadlineTick::Idle);
        assert!(watch.has_fired());
        assert_eq!(watch.remaining(), Duration::zero());
    }

    #[test]
    fn remaining_is_clamped_at_zero() {
        let timing = SessionTiming {
            started_at: fixed_now(),
            duration_minutes: 15,
        };
        assert_eq!(
            timing.remaining(fixed_now() + Duration::hours(2)),
            Duration::zero()
        );
        assert_eq!(timing.remaining(fixed_now()), Duration::minutes(15));
    }

    #[test]
    fn kind_parses_from_route_segment() {
        assert_eq!("Lesson".parse::<AssessmentKind>().unwrap(), AssessmentKind::Lesson);
        assert!("module".parse::<AssessmentKind>().is_err());
    }
}

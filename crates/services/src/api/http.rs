use async_trait::async_trait;
use course_core::model::{
    AnswerValue, AssessmentKind, CategoryId, CourseSlug, EnrollmentProgress, LessonContent,
    LessonId, QuestionId, SessionId,
};
use serde_json::json;

use super::dto::{
    CourseDto, EnrolledCourseDto, LessonDto, LessonProgressDto, NextStepDto, SessionDto,
    StartSessionDto, StartTestDto, SubmitDto,
};
use super::{
    CourseApi, CourseSnapshot, Difficulty, NextStep, ProgressSummary, SessionPayload, StartedTest,
    SubmitVerdict, Submission,
};
use crate::error::GatewayError;
use crate::gateway::Gateway;

/// `CourseApi` over the shared [`Gateway`].
#[derive(Clone)]
pub struct HttpCourseApi {
    gateway: Gateway,
}

impl HttpCourseApi {
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}

#[async_trait]
impl CourseApi for HttpCourseApi {
    async fn course(&self, slug: &CourseSlug) -> Result<CourseSnapshot, GatewayError> {
        let dto: CourseDto = self.gateway.get_json(&format!("courses/{slug}/")).await?;
        dto.into_snapshot()
    }

    async fn enrolled_courses(&self) -> Result<Vec<EnrollmentProgress>, GatewayError> {
        let dtos: Vec<EnrolledCourseDto> = self.gateway.get_json("enrollments/my/").await?;
        dtos.into_iter().map(EnrolledCourseDto::into_progress).collect()
    }

    async fn progress_summary(&self) -> Result<ProgressSummary, GatewayError> {
        self.gateway.get_json("courses/progress/summary/").await
    }

    async fn lesson(&self, lesson: LessonId) -> Result<LessonContent, GatewayError> {
        let dto: LessonDto = self.gateway.get_json(&format!("lessons/{lesson}/")).await?;
        Ok(dto.into_content())
    }

    async fn complete_lesson(&self, lesson: LessonId) -> Result<(), GatewayError> {
        self.gateway
            .patch_unit::<()>(&format!("lessons/{lesson}/complete/"), None)
            .await
    }

    async fn lesson_accessed(&self, lesson: LessonId) -> Result<(), GatewayError> {
        self.gateway
            .post_unit::<()>(&format!("lessons/{lesson}/accessed/"), None)
            .await
    }

    async fn next_step(&self, slug: &CourseSlug, current: LessonId) -> Result<NextStep, GatewayError> {
        let dto: NextStepDto = self
            .gateway
            .get_json(&format!("courses/{slug}/next-step/?current_lesson={current}"))
            .await?;
        dto.into_step()
    }

    async fn start_lesson_assessment(&self, lesson: LessonId) -> Result<SessionId, GatewayError> {
        let dto: StartSessionDto = self
            .gateway
            .post_json(
                &format!("assessments/lessons/{lesson}/start/"),
                &json!({ "lesson_id": lesson.value() }),
            )
            .await?;
        Ok(SessionId::new(dto.assessment_session_id))
    }

    async fn start_course_assessment(&self, slug: &CourseSlug) -> Result<SessionId, GatewayError> {
        let dto: StartSessionDto = self
            .gateway
            .post_json(
                &format!("assessments/courses/{slug}/start/"),
                &json!({ "course_slug": slug.as_str() }),
            )
            .await?;
        Ok(SessionId::new(dto.assessment_session_id))
    }

    async fn start_test(
        &self,
        category: CategoryId,
        difficulty: Difficulty,
    ) -> Result<StartedTest, GatewayError> {
        let dto: StartTestDto = self
            .gateway
            .post_json(
                &format!("assessments/{category}/test/start/"),
                &json!({ "category": category.to_string(), "difficulty": difficulty }),
            )
            .await?;
        dto.into_started()
    }

    async fn session(
        &self,
        kind: AssessmentKind,
        session: SessionId,
    ) -> Result<SessionPayload, GatewayError> {
        let dto: SessionDto = self
            .gateway
            .get_json(&format!("sessions/{session}/{kind}/"))
            .await?;
        dto.into_payload()
    }

    async fn save_answer(
        &self,
        kind: AssessmentKind,
        session: SessionId,
        question: QuestionId,
        answer: &AnswerValue,
    ) -> Result<(), GatewayError> {
        let (path, body) = match kind {
            AssessmentKind::Test => (
                format!("assessments/{session}/save-answer/"),
                json!({
                    "question_id": question.value(),
                    "test_session_id": session.value(),
                    "answer": answer.wire(),
                }),
            ),
            AssessmentKind::Lesson | AssessmentKind::Course => (
                format!("assessments/lesson/{session}/save-answer/"),
                json!({
                    "question_id": question.value(),
                    "session_id": session.value(),
                    "answer": answer.wire(),
                    "assessment_type": kind.as_str(),
                }),
            ),
        };
        self.gateway.post_unit(&path, Some(&body)).await
    }

    async fn submit(&self, submission: Submission<'_>) -> Result<SubmitVerdict, GatewayError> {
        let session = submission.session;
        let (path, body) = match (submission.kind, submission.assessment) {
            (AssessmentKind::Test, _) => (
                format!("assessments/{session}/test/submit/"),
                json!({
                    "test_session_id": session.value(),
                    "answers": submission.answers.wire(),
                }),
            ),
            (kind, Some(assessment)) => (
                format!("assessments/{kind}/{assessment}/submit/{session}/"),
                json!({ "answers": submission.answers.wire() }),
            ),
            (kind, None) => {
                return Err(GatewayError::InvalidEndpoint(format!(
                    "{kind} session {session} has no assessment id"
                )));
            }
        };
        let dto: SubmitDto = self.gateway.post_json(&path, &body).await?;
        dto.into_verdict()
    }

    async fn lesson_progress(&self, lesson: LessonId) -> Result<u64, GatewayError> {
        let dto: LessonProgressDto = self
            .gateway
            .get_json(&format!("lessons/{lesson}/progress/"))
            .await?;
        Ok(dto.seconds())
    }

    async fn update_lesson_progress(
        &self,
        lesson: LessonId,
        current_time: u64,
    ) -> Result<(), GatewayError> {
        self.gateway
            .post_unit(
                &format!("lessons/{lesson}/progress/update/"),
                Some(&json!({ "current_time": current_time })),
            )
            .await
    }

    async fn publish_draft(&self, lesson: LessonId, content: &str) -> Result<(), GatewayError> {
        self.gateway
            .patch_unit(
                &format!("lessons/{lesson}/"),
                Some(&json!({ "draft_content": content })),
            )
            .await
    }
}

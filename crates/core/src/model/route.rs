use std::fmt;
use thiserror::Error;
use url::Url;

use crate::model::assessment::AssessmentKind;
use crate::model::course::CourseSlug;
use crate::model::ids::{LessonId, SessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("invalid route url: {0}")]
    InvalidUrl(String),

    #[error("unrecognised route: {0}")]
    Unrecognised(String),
}

/// A navigation target inside the learner client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Lesson {
        course: CourseSlug,
        lesson: LessonId,
    },
    CourseOverview(CourseSlug),
    CourseAssessment(CourseSlug),
    Assessment {
        kind: AssessmentKind,
        model_id: u64,
        session: SessionId,
    },
    Test(SessionId),
    TestsList,
    Home,
    /// Anything on another origin.
    External(Url),
}

impl Route {
    /// Parse a location handed back by the remote.
    ///
    /// Relative paths are joined against `base`. Absolute URLs on a different
    /// origin become [`Route::External`].
    ///
    /// # Errors
    ///
    /// `InvalidUrl` when the input cannot be joined, `Unrecognised` when the path
    /// matches no known screen.
    pub fn parse(raw: &str, base: &Url) -> Result<Self, RouteError> {
        let url = base
            .join(raw.trim())
            .map_err(|e| RouteError::InvalidUrl(format!("{raw}: {e}")))?;

        if url.origin() != base.origin() {
            return Ok(Self::External(url));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let unrecognised = || RouteError::Unrecognised(url.path().to_owned());
        let slug = |raw: &str| CourseSlug::new(raw).map_err(|_| unrecognised());

        match segments.as_slice() {
            [] => Ok(Self::Home),
            ["tests"] => Ok(Self::TestsList),
            ["take-test", id] => Ok(Self::Test(id.parse().map_err(|_| unrecognised())?)),
            ["courses", course, "lessons", lesson] => Ok(Self::Lesson {
                course: slug(*course)?,
                lesson: lesson.parse().map_err(|_| unrecognised())?,
            }),
            ["courses", course, "assessment"] => Ok(Self::CourseAssessment(slug(*course)?)),
            ["dashboard", "courses", course] | ["courses", course] => {
                Ok(Self::CourseOverview(slug(*course)?))
            }
            ["take-assessment", kind, model, "sessions", session] => Ok(Self::Assessment {
                kind: kind.parse().map_err(|_| unrecognised())?,
                model_id: model.parse().map_err(|_| unrecognised())?,
                session: session.parse().map_err(|_| unrecognised())?,
            }),
            _ => Err(unrecognised()),
        }
    }

    /// Client-side path for this route. External routes yield the full URL.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Lesson { course, lesson } => format!("/courses/{course}/lessons/{lesson}"),
            Self::CourseOverview(course) => format!("/dashboard/courses/{course}/"),
            Self::CourseAssessment(course) => format!("/courses/{course}/assessment/"),
            Self::Assessment {
                kind,
                model_id,
                session,
            } => format!("/take-assessment/{kind}/{model_id}/sessions/{session}/"),
            Self::Test(session) => format!("/take-test/{session}"),
            Self::TestsList => "/tests".to_owned(),
            Self::Home => "/".to_owned(),
            Self::External(url) => url.to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://learn.example.com/").unwrap()
    }

    #[test]
    fn parses_lesson_paths() {
        let route = Route::parse("/courses/rust-101/lessons/4", &base()).unwrap();
        assert_eq!(
            route,
            Route::Lesson {
                course: CourseSlug::new("rust-101").unwrap(),
                lesson: LessonId::new(4),
            }
        );
    }

    #[test]
    fn absolute_same_origin_urls_are_internal() {
        let route = Route::parse(
            "https://learn.example.com/take-assessment/lesson/12/sessions/99/",
            &base(),
        )
        .unwrap();
        assert_eq!(
            route,
            Route::Assessment {
                kind: AssessmentKind::Lesson,
                model_id: 12,
                session: SessionId::new(99),
            }
        );
    }

    #[test]
    fn other_origins_are_external() {
        let route = Route::parse("https://elsewhere.example.org/x", &base()).unwrap();
        assert!(matches!(route, Route::External(_)));
    }

    #[test]
    fn paths_render_back() {
        for raw in [
            "/courses/rust/lessons/3",
            "/dashboard/courses/rust/",
            "/courses/rust/assessment/",
            "/take-assessment/course/1/sessions/2/",
            "/take-test/8",
            "/tests",
            "/",
        ] {
            assert_eq!(Route::parse(raw, &base()).unwrap().path(), raw);
        }
    }

    #[test]
    fn unknown_paths_are_rejected() {
        assert!(matches!(
            Route::parse("/settings/profile", &base()),
            Err(RouteError::Unrecognised(_))
        ));
        assert!(matches!(
            Route::parse("/courses/rust/lessons/abc", &base()),
            Err(RouteError::Unrecognised(_))
        ));
    }
}

use std::fmt;

use course_core::model::{AssessmentKind, CategoryId, CourseSlug, LessonId, SessionId};
use services::Difficulty;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    Invalid { what: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::Invalid { what, raw } => write!(f, "invalid {what}: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dashboard,
    Learn {
        slug: CourseSlug,
        lesson: Option<LessonId>,
    },
    Test {
        category: CategoryId,
        difficulty: Difficulty,
    },
    Resume {
        kind: AssessmentKind,
        session: SessionId,
    },
    Draft {
        lesson: LessonId,
        publish: Option<String>,
    },
    Help,
}

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,services=info";

fn usage() -> String {
    format!(
        "Usage:
  app dashboard
  app learn  <course-slug> [--lesson <id>]
  app test   <category-id> <easy|normal|hard>
  app resume <lesson|course|test> <session-id>
  app draft  <lesson-id> [--publish <file>]

Environment (a .env file is read if present):
  COURSE_API_BASE_URL      required, e.g. https://learn.example/api/
  COURSE_ACCESS_TOKEN, COURSE_REFRESH_TOKEN
  COURSE_CACHE_DB          default sqlite://course-cache.sqlite3
  RUST_LOG                 default {DEFAULT_LOG_FILTER}
"
    )
}

pub fn print_usage() {
    eprint!("{}", usage());
}

fn require(
    args: &mut impl Iterator<Item = String>,
    what: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { what })
}

fn parse_as<T: std::str::FromStr>(raw: String, what: &'static str) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::Invalid { what, raw })
}

impl Command {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let Some(cmd) = args.next() else {
            return Ok(Self::Dashboard);
        };

        let command = match cmd.as_str() {
            "--help" | "-h" | "help" => return Ok(Self::Help),
            "dashboard" => Self::Dashboard,
            "learn" => {
                let raw = require(&mut args, "course slug")?;
                let slug = CourseSlug::new(raw.clone())
                    .map_err(|_| ArgsError::Invalid { what: "course slug", raw })?;
                let mut lesson = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--lesson" => {
                            let raw = require(&mut args, "--lesson value")?;
                            lesson = Some(parse_as(raw, "lesson id")?);
                        }
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                return Ok(Self::Learn { slug, lesson });
            }
            "test" => Self::Test {
                category: parse_as(require(&mut args, "category id")?, "category id")?,
                difficulty: parse_as(require(&mut args, "difficulty")?, "difficulty")?,
            },
            "resume" => Self::Resume {
                kind: parse_as(require(&mut args, "assessment kind")?, "assessment kind")?,
                session: parse_as(require(&mut args, "session id")?, "session id")?,
            },
            "draft" => {
                let lesson = parse_as(require(&mut args, "lesson id")?, "lesson id")?;
                let mut publish = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--publish" => publish = Some(require(&mut args, "--publish file")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                return Ok(Self::Draft { lesson, publish });
            }
            _ => return Err(ArgsError::UnknownCommand(cmd)),
        };

        match args.next() {
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
            None => Ok(command),
        }
    }
}

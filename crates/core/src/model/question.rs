use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

/// Marker for the blank in a fill-in-the-blank prompt: six underscores.
pub const BLANK_MARKER: &str = "______";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("multiple-choice question has no options")]
    NoOptions,

    #[error("unknown question type: {0}")]
    UnknownType(String),
}

/// Type tag of a question. Always derived from `QuestionKind`, never stored apart from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillInBlank,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "MCQ",
            Self::TrueFalse => "TF",
            Self::FillInBlank => "FIB",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MCQ" => Ok(Self::MultipleChoice),
            "TF" => Ok(Self::TrueFalse),
            "FIB" => Ok(Self::FillInBlank),
            other => Err(QuestionError::UnknownType(other.to_owned())),
        }
    }
}

/// One option of a multiple-choice question.
///
/// `is_correct` is authoring input. The taking flow never reads it; grading happens remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOption {
    pub id: Option<OptionId>,
    pub text: String,
    pub is_correct: bool,
}

impl McqOption {
    #[must_use]
    pub fn new(id: Option<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            is_correct: false,
        }
    }

    #[must_use]
    pub fn correct(mut self) -> Self {
        self.is_correct = true;
        self
    }
}

/// Type-specific payload. The variant is the type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice { options: Vec<McqOption> },
    TrueFalse { expected: bool },
    FillInBlank { expected: String },
}

impl QuestionKind {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::MultipleChoice { .. } => QuestionType::MultipleChoice,
            Self::TrueFalse { .. } => QuestionType::TrueFalse,
            Self::FillInBlank { .. } => QuestionType::FillInBlank,
        }
    }
}

/// Cached copies are re-validated on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
}

#[derive(Deserialize)]
struct QuestionRecord {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        Self::new(record.id, record.prompt, record.kind)
    }
}

impl Question {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyPrompt` for a blank prompt and
    /// `QuestionError::NoOptions` for a multiple-choice question without options.
    pub fn new(id: QuestionId, prompt: impl Into<String>, kind: QuestionKind) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if matches!(&kind, QuestionKind::MultipleChoice { options } if options.is_empty()) {
            return Err(QuestionError::NoOptions);
        }
        Ok(Self { id, prompt, kind })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// Options are only reachable through a multiple-choice question.
    #[must_use]
    pub fn options(&self) -> Option<&[McqOption]> {
        match &self.kind {
            QuestionKind::MultipleChoice { options } => Some(options),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options()
            .is_some_and(|opts| opts.iter().any(|o| o.id == Some(option)))
    }

    #[must_use]
    pub fn blank_prompt(&self) -> BlankPrompt<'_> {
        split_blank(&self.prompt)
    }
}

/// A fill-in-the-blank prompt split around its blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankPrompt<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub has_blank: bool,
}

/// Split on the first run of six underscores.
///
/// Prompts without a blank come back whole in `prefix`; any later runs stay in `suffix`.
#[must_use]
pub fn split_blank(prompt: &str) -> BlankPrompt<'_> {
    match prompt.split_once(BLANK_MARKER) {
        Some((prefix, suffix)) => BlankPrompt {
            prefix,
            suffix,
            has_blank: true,
        },
        None => BlankPrompt {
            prefix: prompt,
            suffix: "",
            has_blank: false,
        },
    }
}

use course_core::model::{
    AnswerValue, AssessmentSession, OptionId, Question, QuestionKind, split_blank,
};

/// One multiple-choice option as shown to the learner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionVm {
    /// 1-based position, used as the terminal shortcut.
    pub number: usize,
    pub id: Option<OptionId>,
    pub label: String,
    pub selected: bool,
    /// Options the remote sent without an id cannot be chosen.
    pub selectable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionBodyVm {
    Choice {
        options: Vec<OptionVm>,
    },
    TrueFalse {
        selected: Option<bool>,
    },
    FillInBlank {
        prefix: String,
        suffix: String,
        value: String,
    },
}

/// A question card: header, prompt, and the current answer woven in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionVm {
    pub position: String,
    pub prompt: String,
    pub body: QuestionBodyVm,
    pub answered: bool,
    pub is_last: bool,
}

/// Card for the session's current question.
#[must_use]
pub fn current_question_vm(session: &AssessmentSession) -> Option<QuestionVm> {
    let index = session.current_index();
    let question = session.question_at(index)?;
    let answer = session.answer_for(question.id());
    Some(QuestionVm {
        position: format!("Question {} of {}", index + 1, session.total()),
        prompt: question.prompt().to_owned(),
        body: body_vm(question, answer),
        answered: answer.is_some(),
        is_last: session.is_last(),
    })
}

fn body_vm(question: &Question, answer: Option<&AnswerValue>) -> QuestionBodyVm {
    match question.kind() {
        QuestionKind::MultipleChoice { options } => {
            let chosen = match answer {
                Some(AnswerValue::Choice(id)) => Some(*id),
                _ => None,
            };
            QuestionBodyVm::Choice {
                options: options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| OptionVm {
                        number: i + 1,
                        id: option.id,
                        label: option.text.clone(),
                        selected: option.id.is_some() && option.id == chosen,
                        selectable: option.id.is_some(),
                    })
                    .collect(),
            }
        }
        QuestionKind::TrueFalse { .. } => QuestionBodyVm::TrueFalse {
            selected: match answer {
                Some(AnswerValue::TrueFalse(value)) => Some(*value),
                _ => None,
            },
        },
        QuestionKind::FillInBlank { .. } => {
            let parts = split_blank(question.prompt());
            QuestionBodyVm::FillInBlank {
                prefix: parts.prefix.to_owned(),
                suffix: parts.suffix.to_owned(),
                value: match answer {
                    Some(AnswerValue::Text(text)) => text.clone(),
                    _ => String::new(),
                },
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerInputError {
    Empty,
    NotAnOption,
    OptionUnavailable,
    NotTrueOrFalse,
}

impl AnswerInputError {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Empty => "Type an answer first.",
            Self::NotAnOption => "Pick one of the listed option numbers.",
            Self::OptionUnavailable => "That option cannot be selected.",
            Self::NotTrueOrFalse => "Answer true or false.",
        }
    }
}

/// Turn typed input into an answer for `question`.
///
/// # Errors
///
/// Returns `AnswerInputError` when the input does not fit the question type.
pub fn parse_answer(question: &Question, input: &str) -> Result<AnswerValue, AnswerInputError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AnswerInputError::Empty);
    }
    match question.kind() {
        QuestionKind::MultipleChoice { options } => {
            let number: usize = input.parse().map_err(|_| AnswerInputError::NotAnOption)?;
            let option = number
                .checked_sub(1)
                .and_then(|i| options.get(i))
                .ok_or(AnswerInputError::NotAnOption)?;
            option
                .id
                .map(AnswerValue::Choice)
                .ok_or(AnswerInputError::OptionUnavailable)
        }
        QuestionKind::TrueFalse { .. } => match input.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" => Ok(AnswerValue::TrueFalse(true)),
            "f" | "false" | "n" | "no" => Ok(AnswerValue::TrueFalse(false)),
            _ => Err(AnswerInputError::NotTrueOrFalse),
        },
        QuestionKind::FillInBlank { .. } => Ok(AnswerValue::text(input)),
    }
}

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::model::ids::{OptionId, QuestionId};
use crate::model::question::QuestionType;

/// A learner's answer to one question.
///
/// The serde form is tagged so cached answers rehydrate into the same variant.
/// Use [`AnswerValue::wire`] for the shape the remote expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(OptionId),
    TrueFalse(bool),
    Text(String),
}

impl AnswerValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The question type this answer shape belongs to.
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Choice(_) => QuestionType::MultipleChoice,
            Self::TrueFalse(_) => QuestionType::TrueFalse,
            Self::Text(_) => QuestionType::FillInBlank,
        }
    }

    #[must_use]
    pub fn wire(&self) -> WireAnswer<'_> {
        WireAnswer(self)
    }
}

/// Remote encoding: option id as a number, `"true"`/`"false"`, or the raw text.
#[derive(Debug, Clone, Copy)]
pub struct WireAnswer<'a>(&'a AnswerValue);

impl Serialize for WireAnswer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            AnswerValue::Choice(id) => serializer.serialize_u64(id.value()),
            AnswerValue::TrueFalse(true) => serializer.serialize_str("true"),
            AnswerValue::TrueFalse(false) => serializer.serialize_str("false"),
            AnswerValue::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// Answers keyed by question id. Partial by construction; last write wins per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<QuestionId, AnswerValue>);

impl Answers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous answer for the question, if any.
    pub fn insert(&mut self, question: QuestionId, value: AnswerValue) -> Option<AnswerValue> {
        self.0.insert(question, value)
    }

    #[must_use]
    pub fn get(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.0.get(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &AnswerValue)> {
        self.0.iter().map(|(id, value)| (*id, value))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(QuestionId, &AnswerValue) -> bool) {
        self.0.retain(|id, value| keep(*id, value));
    }

    #[must_use]
    pub fn wire(&self) -> WireAnswers<'_> {
        WireAnswers(self)
    }
}

/// `{ "<question id>": <wire answer>, ... }`
#[derive(Debug, Clone, Copy)]
pub struct WireAnswers<'a>(&'a Answers);

impl Serialize for WireAnswers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, value) in self.0.iter() {
            map.serialize_entry(&id.to_string(), &value.wire())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_matches_remote_shapes() {
        let mut answers = Answers::new();
        answers.insert(QuestionId::new(1), AnswerValue::Choice(OptionId::new(7)));
        answers.insert(QuestionId::new(2), AnswerValue::TrueFalse(true));
        answers.insert(QuestionId::new(3), AnswerValue::text("Paris"));

        let json = serde_json::to_value(answers.wire()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "1": 7, "2": "true", "3": "Paris" })
        );
    }

    #[test]
    fn cached_form_keeps_variants() {
        let mut answers = Answers::new();
        answers.insert(QuestionId::new(4), AnswerValue::text("true"));
        answers.insert(QuestionId::new(5), AnswerValue::TrueFalse(true));

        let json = serde_json::to_string(&answers).unwrap();
        let back: Answers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answers);
        assert_eq!(back.get(QuestionId::new(4)), Some(&AnswerValue::text("true")));
    }

    #[test]
    fn last_write_wins() {
        let mut answers = Answers::new();
        answers.insert(QuestionId::new(1), AnswerValue::text("a"));
        let previous = answers.insert(QuestionId::new(1), AnswerValue::text("b"));
        assert_eq!(previous, Some(AnswerValue::text("a")));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(QuestionId::new(1)), Some(&AnswerValue::text("b")));
    }
}

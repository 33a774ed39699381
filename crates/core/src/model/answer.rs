use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not part of this lesson")]
    UnknownQuestion(QuestionId),

    #[error("question {question_id} expects a {expected:?} answer, got {found:?}")]
    ShapeMismatch {
        question_id: QuestionId,
        expected: AnswerShape,
        found: AnswerShape,
    },

    #[error("question {question_id} has no blank at position {position}")]
    InvalidBlank { question_id: QuestionId, position: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerShape {
    Simple,
    Blanks,
    Pairs,
}

/// A learner's value for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Single text or selected option key.
    Simple(String),
    /// Fill-blank values keyed by 1-based blank position.
    Blanks(BTreeMap<u32, String>),
    /// Matching values keyed by left-hand item.
    Pairs(BTreeMap<String, String>),
}

impl Answer {
    #[must_use]
    pub fn shape(&self) -> AnswerShape {
        match self {
            Answer::Simple(_) => AnswerShape::Simple,
            Answer::Blanks(_) => AnswerShape::Blanks,
            Answer::Pairs(_) => AnswerShape::Pairs,
        }
    }

    /// Composite answers count as answered once any sub-field is non-blank.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Simple(value) => !value.trim().is_empty(),
            Answer::Blanks(values) => values.values().any(|v| !v.trim().is_empty()),
            Answer::Pairs(values) => values.values().any(|v| !v.trim().is_empty()),
        }
    }

    /// JSON form used in submission payloads.
    ///
    /// Blanks become an object keyed by position (`{"1": "cat"}`), pairs an object keyed
    /// by left item. Values are trimmed.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Answer::Simple(value) => Value::String(value.trim().to_string()),
            Answer::Blanks(values) => Value::Object(
                values
                    .iter()
                    .map(|(pos, v)| (pos.to_string(), Value::String(v.trim().to_string())))
                    .collect::<Map<_, _>>(),
            ),
            Answer::Pairs(values) => Value::Object(
                values
                    .iter()
                    .map(|(left, v)| (left.clone(), Value::String(v.trim().to_string())))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Text form: the simple value itself, or the JSON text of a composite value.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Answer::Simple(value) => value.trim().to_string(),
            Answer::Blanks(_) | Answer::Pairs(_) => self.to_json().to_string(),
        }
    }
}

/// Per-attempt answer store. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    values: BTreeMap<QuestionId, Answer>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was stored for `question_id`.
    pub fn set(&mut self, question_id: QuestionId, value: Answer) {
        self.values.insert(question_id, value);
    }

    /// Writes one blank of a fill-blank answer, creating the answer if needed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::ShapeMismatch` if a non-blanks answer is already stored.
    pub fn set_blank(
        &mut self,
        question_id: QuestionId,
        position: u32,
        text: impl Into<String>,
    ) -> Result<(), AnswerError> {
        let entry = self
            .values
            .entry(question_id)
            .or_insert_with(|| Answer::Blanks(BTreeMap::new()));
        match entry {
            Answer::Blanks(values) => {
                values.insert(position, text.into());
                Ok(())
            }
            other => Err(AnswerError::ShapeMismatch {
                question_id,
                expected: AnswerShape::Blanks,
                found: other.shape(),
            }),
        }
    }

    /// Writes one pair of a matching answer, creating the answer if needed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::ShapeMismatch` if a non-pairs answer is already stored.
    pub fn set_pair(
        &mut self,
        question_id: QuestionId,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Result<(), AnswerError> {
        let entry = self
            .values
            .entry(question_id)
            .or_insert_with(|| Answer::Pairs(BTreeMap::new()));
        match entry {
            Answer::Pairs(values) => {
                values.insert(left.into(), right.into());
                Ok(())
            }
            other => Err(AnswerError::ShapeMismatch {
                question_id,
                expected: AnswerShape::Pairs,
                found: other.shape(),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&Answer> {
        self.values.get(&question_id)
    }

    pub fn clear(&mut self, question_id: QuestionId) -> Option<Answer> {
        self.values.remove(&question_id)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.values.get(&question_id).is_some_and(Answer::is_answered)
    }

    /// Number of questions holding a non-empty value.
    #[must_use]
    pub fn count_answered(&self) -> usize {
        self.values.values().filter(|a| a.is_answered()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &Answer)> {
        self.values.iter().map(|(id, answer)| (*id, answer))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

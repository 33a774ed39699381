use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::answer::AnswerShape;
use crate::model::ids::QuestionId;
use crate::model::question::Question;

/// Per-question verdict returned by the remote judge.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub points: f64,
    /// Raw correct-answer payload: JSON value, JSON text, or plain string.
    pub correct_answer: Option<Value>,
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub is_passed: bool,
    pub score_percentage: f64,
    pub results: Vec<QuestionResult>,
}

impl SubmissionOutcome {
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct).count()
    }
}

/// Canonical answer shaped for display against the question it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorrectAnswer {
    /// Missing or unparseable payload; displays as nothing.
    #[default]
    Empty,
    Text(String),
    Blanks(BTreeMap<u32, String>),
    Pairs(BTreeMap<String, String>),
}

impl CorrectAnswer {
    /// Shapes a raw payload for `question`. Never fails: anything that cannot be
    /// read for the question's shape becomes `Empty`.
    #[must_use]
    pub fn parse(raw: Option<&Value>, question: &Question) -> Self {
        let Some(raw) = raw else {
            return CorrectAnswer::Empty;
        };
        match question.kind.answer_shape() {
            AnswerShape::Simple => scalar_text(raw).map_or(CorrectAnswer::Empty, CorrectAnswer::Text),
            AnswerShape::Blanks => parse_blanks(raw, question.blank_count),
            AnswerShape::Pairs => parse_pairs(raw),
        }
    }

    /// Correct text for one blank; empty when unknown.
    #[must_use]
    pub fn for_blank(&self, position: u32) -> &str {
        match self {
            CorrectAnswer::Blanks(values) => values.get(&position).map_or("", String::as_str),
            CorrectAnswer::Text(text) if position == 1 => text.as_str(),
            _ => "",
        }
    }

    /// Correct right-hand value for one matching item; empty when unknown.
    #[must_use]
    pub fn for_pair(&self, left: &str) -> &str {
        match self {
            CorrectAnswer::Pairs(values) => values.get(left).map_or("", String::as_str),
            _ => "",
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, CorrectAnswer::Empty)
    }
}

/// Review data merged onto a question after submission.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReview {
    pub is_correct: bool,
    pub points: f64,
    pub correct: CorrectAnswer,
}

impl QuestionReview {
    #[must_use]
    pub fn from_result(result: &QuestionResult, question: &Question) -> Self {
        Self {
            is_correct: result.is_correct,
            points: result.points,
            correct: CorrectAnswer::parse(result.correct_answer.as_ref(), question),
        }
    }
}

/// What happened while merging a result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub merged: usize,
    /// Result ids with no matching question; ignored.
    pub unknown: Vec<QuestionId>,
}

/// Writes each result onto the question with the same id.
///
/// Overwrites instead of accumulating, so merging the same results again leaves the
/// questions unchanged.
pub fn merge_results(questions: &mut [Question], results: &[QuestionResult]) -> MergeReport {
    let mut report = MergeReport::default();
    for result in results {
        match questions.iter_mut().find(|q| q.id == result.question_id) {
            Some(question) => {
                question.review = Some(QuestionReview::from_result(result, question));
                report.merged += 1;
            }
            None => report.unknown.push(result.question_id),
        }
    }
    report
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" / "))
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// JSON text inside a string is decoded; plain strings stay as they are.
fn decode_embedded(value: &Value) -> Value {
    if let Value::String(text) = value {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(decoded) = serde_json::from_str::<Value>(trimmed) {
                return decoded;
            }
        }
    }
    value.clone()
}

fn parse_blanks(raw: &Value, blank_count: u32) -> CorrectAnswer {
    let mut values = BTreeMap::new();
    match decode_embedded(raw) {
        Value::Object(map) => {
            for (key, value) in &map {
                let digits: String = key.chars().filter(char::is_ascii_digit).collect();
                let (Ok(position), Some(text)) = (digits.parse::<u32>(), scalar_text(value)) else {
                    continue;
                };
                values.insert(position, text);
            }
        }
        Value::Array(items) => {
            for (idx, value) in items.iter().enumerate() {
                let (Ok(position), Some(text)) = (u32::try_from(idx + 1), scalar_text(value)) else {
                    continue;
                };
                values.insert(position, text);
            }
        }
        Value::String(text) if blank_count <= 1 && !text.trim().is_empty() => {
            values.insert(1, text.trim().to_string());
        }
        _ => {}
    }

    if values.is_empty() {
        return CorrectAnswer::Empty;
    }
    for position in 1..=blank_count {
        values.entry(position).or_default();
    }
    CorrectAnswer::Blanks(values)
}

fn parse_pairs(raw: &Value) -> CorrectAnswer {
    let Value::Object(map) = decode_embedded(raw) else {
        return CorrectAnswer::Empty;
    };
    let values: BTreeMap<String, String> = map
        .iter()
        .filter_map(|(left, right)| scalar_text(right).map(|text| (left.clone(), text)))
        .collect();
    if values.is_empty() {
        CorrectAnswer::Empty
    } else {
        CorrectAnswer::Pairs(values)
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::{Answer, AnswerShape};
use crate::model::ids::QuestionId;
use crate::model::result::QuestionReview;

/// Upper bound on blanks per fill-in question.
pub const MAX_BLANKS: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown question type: {raw:?}")]
pub struct QuestionKindParseError {
    raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    FillBlank,
    Matching,
    Essay,
}

impl QuestionKind {
    /// The answer variant this kind of question collects.
    #[must_use]
    pub fn answer_shape(self) -> AnswerShape {
        match self {
            QuestionKind::MultipleChoice
            | QuestionKind::TrueFalse
            | QuestionKind::ShortAnswer
            | QuestionKind::Essay => AnswerShape::Simple,
            QuestionKind::FillBlank => AnswerShape::Blanks,
            QuestionKind::Matching => AnswerShape::Pairs,
        }
    }

    /// Choice questions are answered by picking one of the offered options.
    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionKind::MultipleChoice | QuestionKind::TrueFalse)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionKind::TrueFalse => "TRUE_FALSE",
            QuestionKind::ShortAnswer => "SHORT_ANSWER",
            QuestionKind::FillBlank => "FILL_BLANK",
            QuestionKind::Matching => "MATCHING",
            QuestionKind::Essay => "ESSAY",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = QuestionKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "MULTIPLE_CHOICE" | "SINGLE_CHOICE" => Ok(QuestionKind::MultipleChoice),
            "TRUE_FALSE" => Ok(QuestionKind::TrueFalse),
            "SHORT_ANSWER" | "TEXT" => Ok(QuestionKind::ShortAnswer),
            "FILL_BLANK" | "FILL_IN_BLANK" | "FILL_IN_THE_BLANK" => Ok(QuestionKind::FillBlank),
            "MATCHING" => Ok(QuestionKind::Matching),
            "ESSAY" => Ok(QuestionKind::Essay),
            _ => Err(QuestionKindParseError { raw: s.to_string() }),
        }
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Value sent back when selected (e.g. "A").
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub content: String,
    pub options: Vec<ChoiceOption>,
    /// Number of blanks for fill-blank questions.
    pub blank_count: u32,
    /// Left-hand items of a matching question.
    pub match_left: Vec<String>,
    /// Right-hand candidates of a matching question.
    pub match_right: Vec<String>,
    pub points: u32,
    pub order_index: u32,
    /// Populated after submission.
    pub review: Option<QuestionReview>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, kind: QuestionKind, content: impl Into<String>) -> Self {
        let content = content.into();
        let blank_count = if kind == QuestionKind::FillBlank {
            count_blank_markers(&content).clamp(1, MAX_BLANKS)
        } else {
            0
        };
        Self {
            id,
            kind,
            content,
            options: Vec::new(),
            blank_count,
            match_left: Vec::new(),
            match_right: Vec::new(),
            points: 1,
            order_index: 0,
            review: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<ChoiceOption>) -> Self {
        self.options = options;
        self
    }

    /// Clamped to `MAX_BLANKS`.
    #[must_use]
    pub fn with_blank_count(mut self, blank_count: u32) -> Self {
        self.blank_count = blank_count.min(MAX_BLANKS);
        self
    }

    #[must_use]
    pub fn with_matching(mut self, left: Vec<String>, right: Vec<String>) -> Self {
        self.match_left = left;
        self.match_right = right;
        self
    }

    #[must_use]
    pub fn with_order_index(mut self, order_index: u32) -> Self {
        self.order_index = order_index;
        self
    }

    /// Blank positions, 1-based.
    pub fn blank_positions(&self) -> impl Iterator<Item = u32> {
        1..=self.blank_count
    }

    /// An unanswered value of the right shape for this question.
    #[must_use]
    pub fn empty_answer(&self) -> Answer {
        match self.kind.answer_shape() {
            AnswerShape::Simple => Answer::Simple(String::new()),
            AnswerShape::Blanks => Answer::Blanks(
                self.blank_positions()
                    .map(|pos| (pos, String::new()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            AnswerShape::Pairs => Answer::Pairs(
                self.match_left
                    .iter()
                    .map(|left| (left.clone(), String::new()))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn is_reviewed(&self) -> bool {
        self.review.is_some()
    }
}

/// Counts `___` style blank markers (three or more underscores) in question text.
#[must_use]
pub fn count_blank_markers(content: &str) -> u32 {
    let mut count = 0_u32;
    let mut run = 0_usize;
    for ch in content.chars().chain(std::iter::once(' ')) {
        if ch == '_' {
            run += 1;
        } else {
            if run >= 3 {
                count = count.saturating_add(1);
            }
            run = 0;
        }
    }
    count
}

/// Questions sharing one instruction (a "task").
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionGroup {
    pub id: u64,
    pub instruction: String,
    pub order_index: u32,
    pub questions: Vec<Question>,
}

/// Server-side grouping of a lesson's questions into tasks plus standalone questions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupedQuestions {
    pub tasks: Vec<QuestionGroup>,
    pub standalone: Vec<Question>,
}

impl GroupedQuestions {
    /// Task questions in task order, then standalone questions, each by `order_index`.
    #[must_use]
    pub fn flatten(&self) -> Vec<Question> {
        let mut tasks: Vec<&QuestionGroup> = self.tasks.iter().collect();
        tasks.sort_by_key(|task| (task.order_index, task.id));

        let mut out = Vec::new();
        for task in tasks {
            let mut questions = task.questions.clone();
            questions.sort_by_key(|q| (q.order_index, q.id));
            out.extend(questions);
        }
        let mut standalone = self.standalone.clone();
        standalone.sort_by_key(|q| (q.order_index, q.id));
        out.extend(standalone);
        out
    }

    /// Instruction of the task owning `question_id`, if it belongs to one.
    #[must_use]
    pub fn instruction_for(&self, question_id: QuestionId) -> Option<&str> {
        self.tasks
            .iter()
            .find(|task| task.questions.iter().any(|q| q.id == question_id))
            .map(|task| task.instruction.as_str())
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.tasks.iter().map(|t| t.questions.len()).sum::<usize>() + self.standalone.len()
    }
}

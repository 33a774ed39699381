//! Per-module mapping from answers to submission entries.
//!
//! The three skill modules share one player; they differ only in which body field
//! their backend endpoints read each answer from.

use lesson_core::model::{Answer, Question, SkillModule};

use crate::api::SubmissionEntry;

pub trait SubmissionAdapter: Send + Sync {
    fn entry(&self, question: &Question, answer: &Answer) -> SubmissionEntry;
}

fn blank_entry(question: &Question) -> SubmissionEntry {
    SubmissionEntry {
        question_id: question.id,
        answer: None,
        selected_options: None,
        text_answer: None,
    }
}

fn selected(answer: &Answer) -> Vec<String> {
    match answer {
        Answer::Simple(value) if !value.trim().is_empty() => vec![value.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Grammar sends every answer in `answer`: a string, or an object for composite answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrammarAdapter;

impl SubmissionAdapter for GrammarAdapter {
    fn entry(&self, question: &Question, answer: &Answer) -> SubmissionEntry {
        SubmissionEntry {
            answer: Some(answer.to_json()),
            ..blank_entry(question)
        }
    }
}

/// Reading sends choices as `selectedOptions` and everything else as `textAnswer`
/// (composite answers as JSON text).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingAdapter;

impl SubmissionAdapter for ReadingAdapter {
    fn entry(&self, question: &Question, answer: &Answer) -> SubmissionEntry {
        if question.kind.is_choice() {
            return SubmissionEntry {
                selected_options: Some(selected(answer)),
                ..blank_entry(question)
            };
        }
        SubmissionEntry {
            text_answer: Some(answer.to_text()),
            ..blank_entry(question)
        }
    }
}

/// Listening sends choices as `selectedOptions`, free text as `textAnswer`, and
/// composite answers as an `answer` object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListeningAdapter;

impl SubmissionAdapter for ListeningAdapter {
    fn entry(&self, question: &Question, answer: &Answer) -> SubmissionEntry {
        match answer {
            _ if question.kind.is_choice() => SubmissionEntry {
                selected_options: Some(selected(answer)),
                ..blank_entry(question)
            },
            Answer::Simple(text) => SubmissionEntry {
                text_answer: Some(text.trim().to_string()),
                ..blank_entry(question)
            },
            Answer::Blanks(_) | Answer::Pairs(_) => SubmissionEntry {
                answer: Some(answer.to_json()),
                ..blank_entry(question)
            },
        }
    }
}

#[must_use]
pub fn adapter_for(module: SkillModule) -> Box<dyn SubmissionAdapter> {
    match module {
        SkillModule::Grammar => Box::new(GrammarAdapter),
        SkillModule::Reading => Box::new(ReadingAdapter),
        SkillModule::Listening => Box::new(ListeningAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{QuestionId, QuestionKind};
    use serde_json::json;

    fn choice() -> Question {
        Question::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Pick")
    }

    fn fill() -> Question {
        Question::new(QuestionId::new(2), QuestionKind::FillBlank, "I ___ it").with_blank_count(1)
    }

    fn blanks() -> Answer {
        Answer::Blanks([(1, "did".to_string())].into_iter().collect())
    }

    #[test]
    fn grammar_uses_answer_field() {
        let entry = GrammarAdapter.entry(&fill(), &blanks());
        let body = serde_json::to_value(&entry).unwrap();
        assert_eq!(body, json!({"questionId": 2, "answer": {"1": "did"}}));
    }

    #[test]
    fn reading_splits_choice_and_text() {
        let entry = ReadingAdapter.entry(&choice(), &Answer::Simple("B".into()));
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"questionId": 1, "selectedOptions": ["B"]})
        );

        let entry = ReadingAdapter.entry(&fill(), &blanks());
        assert_eq!(entry.text_answer.as_deref(), Some(r#"{"1":"did"}"#));
    }

    #[test]
    fn listening_keeps_composites_structured() {
        let entry = adapter_for(SkillModule::Listening).entry(&fill(), &blanks());
        assert_eq!(entry.answer, Some(json!({"1": "did"})));

        let unanswered = ListeningAdapter.entry(&choice(), &Answer::Simple(String::new()));
        assert_eq!(unanswered.selected_options, Some(Vec::new()));
    }
}

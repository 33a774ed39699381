//! Post-submission review rows: what the learner gave next to what was expected.

use lesson_core::model::{
    Answer, AnswerShape, AnswerSheet, CorrectAnswer, Question, QuestionId, QuestionKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankReview {
    pub position: u32,
    pub given: String,
    pub correct: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReview {
    pub left: String,
    pub given: String,
    pub correct: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub question_id: QuestionId,
    /// 1-based display number.
    pub number: usize,
    pub content: String,
    pub kind: QuestionKind,
    pub your_answer: String,
    /// `None` until results are merged.
    pub is_correct: Option<bool>,
    pub points: Option<f64>,
    pub correct_display: String,
    pub blanks: Vec<BlankReview>,
    pub pairs: Vec<PairReview>,
}

fn display_answer(answer: Option<&Answer>) -> String {
    match answer {
        None => String::new(),
        Some(Answer::Simple(value)) => value.trim().to_string(),
        Some(Answer::Blanks(values)) => values
            .iter()
            .map(|(pos, v)| format!("{pos}: {}", v.trim()))
            .collect::<Vec<_>>()
            .join(", "),
        Some(Answer::Pairs(values)) => values
            .iter()
            .map(|(left, v)| format!("{left} -> {}", v.trim()))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn given_blank(answer: Option<&Answer>, position: u32) -> String {
    match answer {
        Some(Answer::Blanks(values)) => values.get(&position).map(|v| v.trim().to_string()),
        Some(Answer::Simple(value)) if position == 1 => Some(value.trim().to_string()),
        _ => None,
    }
    .unwrap_or_default()
}

fn given_pair(answer: Option<&Answer>, left: &str) -> String {
    match answer {
        Some(Answer::Pairs(values)) => values.get(left).map(|v| v.trim().to_string()),
        _ => None,
    }
    .unwrap_or_default()
}

/// Builds one row per question, in question order.
///
/// Fill-blank rows list every blank position (missing values shown empty); matching
/// rows list every left item.
#[must_use]
pub fn review_items(questions: &[Question], answers: &AnswerSheet) -> Vec<ReviewItem> {
    questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let answer = answers.get(question.id);
            let review = question.review.as_ref();

            let blanks = if question.kind.answer_shape() == AnswerShape::Blanks {
                question
                    .blank_positions()
                    .map(|position| BlankReview {
                        position,
                        given: given_blank(answer, position),
                        correct: review
                            .map(|r| r.correct.for_blank(position).to_string())
                            .unwrap_or_default(),
                    })
                    .collect()
            } else {
                Vec::new()
            };

            let pairs = if question.kind.answer_shape() == AnswerShape::Pairs {
                question
                    .match_left
                    .iter()
                    .map(|left| PairReview {
                        left: left.clone(),
                        given: given_pair(answer, left),
                        correct: review
                            .map(|r| r.correct.for_pair(left).to_string())
                            .unwrap_or_default(),
                    })
                    .collect()
            } else {
                Vec::new()
            };

            let correct_display = review
                .map(|r| correct_display(question, &r.correct))
                .unwrap_or_default();

            ReviewItem {
                question_id: question.id,
                number: idx + 1,
                content: question.content.clone(),
                kind: question.kind,
                your_answer: display_answer(answer),
                is_correct: review.map(|r| r.is_correct),
                points: review.map(|r| r.points),
                correct_display,
                blanks,
                pairs,
            }
        })
        .collect()
}

fn correct_display(question: &Question, correct: &CorrectAnswer) -> String {
    match correct {
        CorrectAnswer::Empty => String::new(),
        CorrectAnswer::Text(text) => {
            // Choice answers come back as option keys; show the option text too.
            match question.options.iter().find(|o| o.key == *text) {
                Some(option) => format!("{}. {}", option.key, option.text),
                None => text.clone(),
            }
        }
        CorrectAnswer::Blanks(values) => values
            .iter()
            .map(|(pos, v)| format!("{pos}: {v}"))
            .collect::<Vec<_>>()
            .join(", "),
        CorrectAnswer::Pairs(values) => values
            .iter()
            .map(|(left, v)| format!("{left} -> {v}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{ChoiceOption, QuestionResult, merge_results};
    use serde_json::json;

    fn questions() -> Vec<Question> {
        vec![
            Question::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Pick one").with_options(
                vec![
                    ChoiceOption {
                        key: "A".into(),
                        text: "went".into(),
                    },
                    ChoiceOption {
                        key: "B".into(),
                        text: "goed".into(),
                    },
                ],
            ),
            Question::new(QuestionId::new(2), QuestionKind::FillBlank, "I ___ a ___"),
            Question::new(QuestionId::new(3), QuestionKind::Matching, "Match").with_matching(
                vec!["cat".into(), "dog".into()],
                vec!["meow".into(), "woof".into()],
            ),
        ]
    }

    #[test]
    fn rows_before_merge_have_no_verdict() {
        let questions = questions();
        let mut answers = AnswerSheet::new();
        answers.set(QuestionId::new(1), Answer::Simple("B".into()));

        let items = review_items(&questions, &answers);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].number, 1);
        assert_eq!(items[0].your_answer, "B");
        assert_eq!(items[0].is_correct, None);
        assert!(items[0].correct_display.is_empty());
        assert_eq!(items[1].blanks.len(), 2);
        assert!(items[1].blanks.iter().all(|b| b.given.is_empty()));
        assert_eq!(items[2].pairs.len(), 2);
    }

    #[test]
    fn merged_rows_show_expected_values() {
        let mut questions = questions();
        let mut answers = AnswerSheet::new();
        answers.set(QuestionId::new(1), Answer::Simple("B".into()));
        answers.set_blank(QuestionId::new(2), 1, "have").unwrap();
        answers.set_pair(QuestionId::new(3), "cat", "meow").unwrap();

        merge_results(
            &mut questions,
            &[
                QuestionResult {
                    question_id: QuestionId::new(1),
                    is_correct: false,
                    points: 0.0,
                    correct_answer: Some(json!("A")),
                },
                QuestionResult {
                    question_id: QuestionId::new(2),
                    is_correct: false,
                    points: 0.5,
                    correct_answer: Some(json!(["have", "dog"])),
                },
                QuestionResult {
                    question_id: QuestionId::new(3),
                    is_correct: true,
                    points: 1.0,
                    correct_answer: Some(json!({"cat": "meow", "dog": "woof"})),
                },
            ],
        );

        let items = review_items(&questions, &answers);
        assert_eq!(items[0].is_correct, Some(false));
        assert_eq!(items[0].correct_display, "A. went");

        assert_eq!(
            items[1].blanks,
            vec![
                BlankReview {
                    position: 1,
                    given: "have".into(),
                    correct: "have".into()
                },
                BlankReview {
                    position: 2,
                    given: String::new(),
                    correct: "dog".into()
                },
            ]
        );
        assert_eq!(items[1].points, Some(0.5));

        assert_eq!(items[2].pairs[1].left, "dog");
        assert_eq!(items[2].pairs[1].given, "");
        assert_eq!(items[2].pairs[1].correct, "woof");
        assert_eq!(items[2].your_answer, "cat -> meow");
    }
}

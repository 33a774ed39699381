//! Interactive lesson loop over stdin.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use lesson_core::model::{Answer, AnswerShape, Question};
use services::{AttemptError, AttemptEvent, LessonAttempt, SubmitPrompt};

use crate::view;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Answer { number: usize, value: AnswerValue },
    Submit,
    Questions,
    Quit,
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Text(String),
    Blanks(Vec<(u32, String)>),
    Pairs(Vec<(String, String)>),
}

/// Parses `<n> <text>`, `<n> 1=have 2=cat`, `<n> cat=meow dog=woof` or a command word.
///
/// `questions` is needed to tell composite answers from text containing `=`.
pub fn parse_input(line: &str, questions: &[Question]) -> Result<Input, String> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "submit" | "s" => return Ok(Input::Submit),
        "questions" | "q?" | "list" => return Ok(Input::Questions),
        "quit" | "exit" => return Ok(Input::Quit),
        "y" | "yes" => return Ok(Input::Yes),
        "n" | "no" => return Ok(Input::No),
        _ => {}
    }

    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let number: usize = head
        .parse()
        .map_err(|_| format!("unrecognized input: {line}"))?;
    let question = number
        .checked_sub(1)
        .and_then(|idx| questions.get(idx))
        .ok_or_else(|| format!("no question {number}"))?;
    let rest = rest.trim();

    let value = match question.kind.answer_shape() {
        AnswerShape::Simple => AnswerValue::Text(rest.to_string()),
        AnswerShape::Blanks if question.blank_count == 1 && !rest.contains('=') => {
            AnswerValue::Blanks(vec![(1, rest.to_string())])
        }
        AnswerShape::Blanks => {
            let mut blanks = Vec::new();
            for part in rest.split_whitespace() {
                let (pos, text) = part
                    .split_once('=')
                    .ok_or_else(|| format!("expected position=text, got {part}"))?;
                let pos: u32 = pos
                    .parse()
                    .map_err(|_| format!("blank position must be a number, got {pos}"))?;
                blanks.push((pos, text.replace('_', " ")));
            }
            AnswerValue::Blanks(blanks)
        }
        AnswerShape::Pairs => {
            let mut pairs = Vec::new();
            for part in rest.split_whitespace() {
                let (left, right) = part
                    .split_once('=')
                    .ok_or_else(|| format!("expected left=right, got {part}"))?;
                pairs.push((left.replace('_', " "), right.replace('_', " ")));
            }
            AnswerValue::Pairs(pairs)
        }
    };
    Ok(Input::Answer { number, value })
}

fn apply(attempt: &LessonAttempt, question: &Question, value: AnswerValue) -> Result<(), AttemptError> {
    match value {
        AnswerValue::Text(text) => attempt.set_answer(question.id, Answer::Simple(text)),
        AnswerValue::Blanks(blanks) => {
            for (position, text) in blanks {
                attempt.set_blank(question.id, position, text)?;
            }
            Ok(())
        }
        AnswerValue::Pairs(pairs) => {
            for (left, right) in pairs {
                attempt.set_pair(question.id, left, right)?;
            }
            Ok(())
        }
    }
}

fn print_questions(attempt: &LessonAttempt) {
    match attempt.with_player(view::lesson_sheet) {
        Ok(sheet) => print!("{sheet}"),
        Err(err) => warn!(error = %err, "cannot render questions"),
    }
}

fn print_review(attempt: &LessonAttempt) {
    let review = attempt.with_player(|player| {
        player
            .outcome()
            .map(|outcome| view::review(&player.review(), outcome, player.is_time_up()))
    });
    match review {
        Ok(Some(text)) => println!("{text}"),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "cannot render review"),
    }
}

/// Runs until the lesson is submitted or the learner quits.
pub async fn run(
    attempt: LessonAttempt,
    mut events: UnboundedReceiver<AttemptEvent>,
) -> Result<(), AttemptError> {
    print_questions(&attempt);
    if let Some(secs) = attempt.remaining_secs() {
        println!("Time limit: {}", view::format_remaining(secs));
    }
    println!("Type `<n> <answer>`, `submit`, `questions` or `quit`.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirming = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(AttemptEvent::Tick { remaining_secs }) => {
                    if remaining_secs > 0 && (remaining_secs % 60 == 0 || remaining_secs <= 10) {
                        println!("[{} left]", view::format_remaining(remaining_secs));
                    }
                }
                Some(AttemptEvent::TimedOut) => {
                    println!("Time's up! Submitting your answers.");
                }
                Some(AttemptEvent::Submitted { .. }) => {
                    print_review(&attempt);
                    return Ok(());
                }
                Some(AttemptEvent::SubmitFailed { message, retryable, .. }) => {
                    println!("Submission failed: {message}");
                    if retryable {
                        println!("Type `submit` to try again.");
                    }
                }
                None => return Ok(()),
            },
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    attempt.leave();
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let questions = attempt.with_player(|p| p.questions().to_vec())?;
                let input = match parse_input(&line, &questions) {
                    Ok(input) => input,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };

                match input {
                    Input::Quit => {
                        attempt.leave();
                        println!("Left the lesson; nothing was submitted.");
                        return Ok(());
                    }
                    Input::Questions => print_questions(&attempt),
                    Input::Answer { number, value } => {
                        confirming = false;
                        let question = &questions[number - 1];
                        match apply(&attempt, question, value) {
                            Ok(()) => {
                                let answered = attempt.with_player(|p| p.answered_count())?;
                                println!("saved ({answered}/{} answered)", questions.len());
                            }
                            Err(err) => println!("{err}"),
                        }
                    }
                    Input::Submit => match attempt.request_submit() {
                        Ok(SubmitPrompt::Proceed) => submit(&attempt).await,
                        Ok(SubmitPrompt::ConfirmUnanswered { answered, total }) => {
                            confirming = true;
                            println!("Only {answered} of {total} questions answered. Submit anyway? (y/n)");
                        }
                        Err(err) => println!("{err}"),
                    },
                    Input::Yes if confirming => {
                        confirming = false;
                        submit(&attempt).await;
                    }
                    Input::No if confirming => {
                        confirming = false;
                        println!("Keep going.");
                    }
                    Input::Yes | Input::No => println!("Nothing to confirm."),
                }
            }
        }
    }
}

async fn submit(attempt: &LessonAttempt) {
    // API outcomes arrive as events.
    if let Err(err) = attempt.submit().await {
        if !matches!(err, AttemptError::Api(_)) {
            println!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{QuestionId, QuestionKind};

    fn questions() -> Vec<Question> {
        vec![
            Question::new(QuestionId::new(1), QuestionKind::ShortAnswer, "Say"),
            Question::new(QuestionId::new(2), QuestionKind::FillBlank, "I ___ a ___"),
            Question::new(QuestionId::new(3), QuestionKind::Matching, "Match")
                .with_matching(vec!["ice cream".into()], vec!["cold".into()]),
            Question::new(QuestionId::new(4), QuestionKind::FillBlank, "A ___ day"),
        ]
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_input(" SUBMIT ", &questions()), Ok(Input::Submit));
        assert_eq!(parse_input("quit", &questions()), Ok(Input::Quit));
        assert_eq!(parse_input("y", &questions()), Ok(Input::Yes));
    }

    #[test]
    fn answers_follow_question_shape() {
        let qs = questions();
        assert_eq!(
            parse_input("1 a = b", &qs),
            Ok(Input::Answer {
                number: 1,
                value: AnswerValue::Text("a = b".into())
            })
        );
        assert_eq!(
            parse_input("2 1=have 2=big_cat", &qs),
            Ok(Input::Answer {
                number: 2,
                value: AnswerValue::Blanks(vec![(1, "have".into()), (2, "big cat".into())])
            })
        );
        assert_eq!(
            parse_input("3 ice_cream=cold", &qs),
            Ok(Input::Answer {
                number: 3,
                value: AnswerValue::Pairs(vec![("ice cream".into(), "cold".into())])
            })
        );
    }

    #[test]
    fn single_blank_accepts_bare_text() {
        assert_eq!(
            parse_input("4 sunny", &questions()),
            Ok(Input::Answer {
                number: 4,
                value: AnswerValue::Blanks(vec![(1, "sunny".into())])
            })
        );
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert!(parse_input("9 x", &questions()).is_err());
        assert!(parse_input("0 x", &questions()).is_err());
        assert!(parse_input("hello", &questions()).is_err());
        assert!(parse_input("2 have", &questions()).is_err());
    }
}

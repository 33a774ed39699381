//! Plain-text rendering for the terminal.

use std::fmt::Write as _;

use lesson_core::model::{AnswerShape, Page, Question, SubmissionOutcome, Topic, UserProfile};
use services::{LessonAccess, LessonPlayer, ReviewItem};

/// `mm:ss`, minutes not capped at 59.
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn profile_line(profile: &UserProfile) -> String {
    let level = profile.level.map_or("no level", |l| l.as_str());
    format!("{} (#{}, {level})", profile.name, profile.id)
}

pub fn topic_page(page: &Page<Topic>) -> String {
    let mut out = String::new();
    for topic in &page.items {
        let level = topic.required_level.map_or("any", |l| l.as_str());
        let draft = if topic.is_active { "" } else { " [draft]" };
        let _ = writeln!(out, "{:>4}  {} (level {level}){draft}", topic.id, topic.name);
    }
    if page.items.is_empty() {
        out.push_str("  no topics\n");
    }
    let _ = write!(
        out,
        "page {} of {} ({} topics)",
        page.page,
        page.total_pages.max(1),
        page.total_items
    );
    out
}

pub fn lesson_row(row: &LessonAccess) -> String {
    let marker = if row.completed {
        "done"
    } else if row.decision.accessible {
        "open"
    } else {
        "locked"
    };
    let mut line = format!(
        "{:>4}  {:<6} {}. {}",
        row.lesson.id, marker, row.lesson.order_index, row.lesson.title
    );
    if let Some(limit) = row.lesson.time_limit_secs {
        let _ = write!(line, " ({})", format_remaining(limit));
    }
    if !row.decision.accessible {
        let _ = write!(line, " - {}", row.decision.message());
    }
    line
}

/// Title, then every question numbered in play order, with a task's instruction
/// printed above its first question.
pub fn lesson_sheet(player: &LessonPlayer) -> String {
    let mut out = format!("== {} ==\n", player.title());
    let mut current_task: Option<&str> = None;
    for (idx, q) in player.questions().iter().enumerate() {
        let instruction = player.instruction_for(q.id);
        if let Some(text) = instruction {
            if current_task != Some(text) {
                let _ = writeln!(out, "-- {text} --");
            }
        }
        current_task = instruction;
        let _ = writeln!(out, "{}", question(idx + 1, q));
    }
    out
}

pub fn question(number: usize, question: &Question) -> String {
    let mut out = format!("{number}. {}\n", question.content);
    for option in &question.options {
        let _ = writeln!(out, "     {}) {}", option.key, option.text);
    }
    let hint = match question.kind.answer_shape() {
        AnswerShape::Simple if question.kind.is_choice() => "answer with an option key".to_string(),
        AnswerShape::Simple => "answer with text".to_string(),
        AnswerShape::Blanks => {
            let positions: Vec<String> = question
                .blank_positions()
                .map(|p| format!("{p}=..."))
                .collect();
            format!("fill blanks: {}", positions.join(" "))
        }
        AnswerShape::Pairs => {
            let _ = writeln!(out, "     right side: {}", question.match_right.join(", "));
            let pairs: Vec<String> = question
                .match_left
                .iter()
                .map(|left| format!("{left}=..."))
                .collect();
            format!("match: {}", pairs.join(" "))
        }
    };
    let _ = write!(out, "     ({hint})");
    out
}

pub fn review(items: &[ReviewItem], outcome: &SubmissionOutcome, time_up: bool) -> String {
    let mut out = String::new();
    if time_up {
        out.push_str("Time's up! Your answers were submitted automatically.\n");
    }
    let verdict = if outcome.is_passed { "passed" } else { "not passed" };
    let _ = writeln!(
        out,
        "Score: {:.1}% ({verdict}), {} of {} correct",
        outcome.score_percentage,
        outcome.correct_count(),
        items.len()
    );

    for item in items {
        let mark = match item.is_correct {
            Some(true) => "+",
            Some(false) => "x",
            None => "?",
        };
        let _ = writeln!(out, "{mark} {}. {}", item.number, item.content);
        if !item.blanks.is_empty() {
            for blank in &item.blanks {
                let _ = writeln!(
                    out,
                    "     blank {}: {} (expected {})",
                    blank.position,
                    or_dash(&blank.given),
                    or_dash(&blank.correct)
                );
            }
        } else if !item.pairs.is_empty() {
            for pair in &item.pairs {
                let _ = writeln!(
                    out,
                    "     {} -> {} (expected {})",
                    pair.left,
                    or_dash(&pair.given),
                    or_dash(&pair.correct)
                );
            }
        } else {
            let _ = writeln!(out, "     your answer: {}", or_dash(&item.your_answer));
            if item.is_correct == Some(false) && !item.correct_display.is_empty() {
                let _ = writeln!(out, "     correct: {}", item.correct_display);
            }
        }
    }
    out
}

fn or_dash(text: &str) -> &str {
    if text.trim().is_empty() { "-" } else { text }
}

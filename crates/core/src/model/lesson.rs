use crate::model::ids::{LessonId, TopicId};
use crate::model::level::ProficiencyLevel;
use crate::model::question::Question;

/// Catalog entry for a lesson: what the access evaluator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub topic_id: TopicId,
    pub title: String,
    pub order_index: u32,
    pub required_level: Option<ProficiencyLevel>,
    pub is_active: bool,
    pub time_limit_secs: Option<u32>,
}

/// A lesson as loaded for play: its questions plus the time limit.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonContent {
    pub id: LessonId,
    pub title: String,
    pub time_limit_secs: Option<u32>,
    pub questions: Vec<Question>,
}

impl LessonContent {
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }
}

/// Lessons sorted by `order_index`, ties broken by id.
#[must_use]
pub fn ordered(lessons: &[Lesson]) -> Vec<&Lesson> {
    let mut sorted: Vec<&Lesson> = lessons.iter().collect();
    sorted.sort_by_key(|lesson| (lesson.order_index, lesson.id));
    sorted
}

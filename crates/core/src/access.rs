//! Lesson access evaluation: inactive, level gating, then sequential unlocking.
//!
//! Checks run in a fixed order and the first failure wins. Level gating comes before
//! sequential gating, so an under-leveled learner sees the level message even when the
//! previous lesson is also incomplete.

use std::fmt;

use crate::model::{Lesson, LessonId, ProficiencyLevel, Role, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessReason {
    Ok,
    TopicLevel,
    LessonLevel,
    Sequential,
    Inactive,
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccessReason::Ok => "ok",
            AccessReason::TopicLevel => "topic level",
            AccessReason::LessonLevel => "lesson level",
            AccessReason::Sequential => "sequential",
            AccessReason::Inactive => "inactive",
        };
        f.write_str(text)
    }
}

/// Outcome of an access check. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub accessible: bool,
    pub reason: AccessReason,
    /// The level that was not met, for `TopicLevel` / `LessonLevel`.
    pub required_level: Option<ProficiencyLevel>,
    /// The lesson that must be completed first, for `Sequential`.
    pub blocked_by: Option<LessonId>,
}

impl AccessDecision {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            accessible: true,
            reason: AccessReason::Ok,
            required_level: None,
            blocked_by: None,
        }
    }

    #[must_use]
    pub fn denied(reason: AccessReason) -> Self {
        Self {
            accessible: false,
            reason,
            required_level: None,
            blocked_by: None,
        }
    }

    /// Learner-facing explanation.
    #[must_use]
    pub fn message(&self) -> String {
        match (self.reason, self.required_level, self.blocked_by) {
            (AccessReason::Ok, _, _) => "Available".to_string(),
            (AccessReason::Inactive, _, _) => "This lesson is not available yet".to_string(),
            (AccessReason::TopicLevel, Some(level), _) => {
                format!("This topic requires level {level} or higher")
            }
            (AccessReason::LessonLevel, Some(level), _) => {
                format!("This lesson requires level {level} or higher")
            }
            (AccessReason::TopicLevel | AccessReason::LessonLevel, None, _) => {
                "Your level is too low for this content".to_string()
            }
            (AccessReason::Sequential, _, _) => {
                "Complete the previous lesson to unlock this one".to_string()
            }
        }
    }
}

/// Decides whether a learner may open `lesson`.
///
/// `lessons_in_topic` is every lesson of the topic (it may include `lesson` itself);
/// `is_completed` reports the backend's completion flag.
///
/// The sequential gate looks at the nearest *active* lesson with a lower order index;
/// deactivated lessons are skipped, so a retired lesson never blocks the ones after it.
pub fn evaluate(
    lesson: &Lesson,
    topic: &Topic,
    user_level: Option<ProficiencyLevel>,
    lessons_in_topic: &[Lesson],
    is_completed: impl Fn(LessonId) -> bool,
) -> AccessDecision {
    if !lesson.is_active {
        return AccessDecision::denied(AccessReason::Inactive);
    }

    if !ProficiencyLevel::satisfies(user_level, topic.required_level) {
        return AccessDecision {
            required_level: topic.required_level,
            ..AccessDecision::denied(AccessReason::TopicLevel)
        };
    }

    if lesson.required_level != topic.required_level
        && !ProficiencyLevel::satisfies(user_level, lesson.required_level)
    {
        return AccessDecision {
            required_level: lesson.required_level,
            ..AccessDecision::denied(AccessReason::LessonLevel)
        };
    }

    if let Some(previous) = preceding_lesson(lesson, lessons_in_topic) {
        if !is_completed(previous.id) {
            return AccessDecision {
                blocked_by: Some(previous.id),
                ..AccessDecision::denied(AccessReason::Sequential)
            };
        }
    }

    AccessDecision::ok()
}

/// Same as [`evaluate`], except staff roles preview every lesson.
pub fn evaluate_for_role(
    role: Role,
    lesson: &Lesson,
    topic: &Topic,
    user_level: Option<ProficiencyLevel>,
    lessons_in_topic: &[Lesson],
    is_completed: impl Fn(LessonId) -> bool,
) -> AccessDecision {
    if role.is_staff() {
        return AccessDecision::ok();
    }
    evaluate(lesson, topic, user_level, lessons_in_topic, is_completed)
}

/// The active lesson with the greatest order index below `lesson`'s.
///
/// Lessons at order index 1 (or lower) are always first.
fn preceding_lesson<'a>(lesson: &Lesson, lessons_in_topic: &'a [Lesson]) -> Option<&'a Lesson> {
    if lesson.order_index <= 1 {
        return None;
    }
    lessons_in_topic
        .iter()
        .filter(|other| other.id != lesson.id && other.is_active)
        .filter(|other| other.order_index < lesson.order_index)
        .max_by_key(|other| (other.order_index, other.id))
}

use chrono::{DateTime, Utc};

use crate::model::ids::LessonId;

/// Bookkeeping for one attempt at one lesson.
///
/// Lives only as long as the attempt; a retry starts a new `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    lesson_id: LessonId,
    started_at: DateTime<Utc>,
    /// `None` for untimed lessons.
    remaining_secs: Option<u32>,
    is_submitted: bool,
}

impl Session {
    #[must_use]
    pub fn new(lesson_id: LessonId, started_at: DateTime<Utc>, time_limit_secs: Option<u32>) -> Self {
        Self {
            lesson_id,
            started_at,
            remaining_secs: time_limit_secs,
            is_submitted: false,
        }
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.remaining_secs.is_some()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_secs == Some(0)
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.is_submitted
    }

    /// Records the countdown value reported by the timer. Never increases the
    /// remaining time.
    pub fn sync_remaining(&mut self, remaining_secs: u32) {
        if let Some(current) = self.remaining_secs.as_mut() {
            *current = (*current).min(remaining_secs);
        }
    }

    /// Irreversible; a retry builds a fresh session.
    pub fn mark_submitted(&mut self) {
        self.is_submitted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn remaining_only_goes_down() {
        let mut session = Session::new(LessonId::new(1), fixed_now(), Some(60));
        session.sync_remaining(59);
        session.sync_remaining(70);
        assert_eq!(session.remaining_secs(), Some(59));
        session.sync_remaining(0);
        assert!(session.is_expired());
    }

    #[test]
    fn untimed_session_never_expires() {
        let mut session = Session::new(LessonId::new(1), fixed_now(), None);
        session.sync_remaining(0);
        assert!(!session.is_expired());
        assert!(!session.is_timed());
    }
}

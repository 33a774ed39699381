use std::collections::HashMap;
use std::fmt;

use lesson_core::Clock;
use lesson_core::model::{
    Answer, AnswerError, AnswerShape, AnswerSheet, GroupedQuestions, LessonContent, LessonId,
    MergeReport, Question, QuestionId, Session, SkillModule, SubmissionOutcome, merge_results,
};

use super::adapter::{SubmissionAdapter, adapter_for};
use super::review::{ReviewItem, review_items};
use crate::api::Submission;
use crate::error::PlayerError;

/// Lifecycle of one lesson attempt. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Loading,
    InProgress,
    Submitting,
    Submitted,
}

/// Why a submission started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    /// The countdown reached zero ("time's up").
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPrompt {
    Proceed,
    /// Manual submit with unanswered questions: ask before sending.
    ConfirmUnanswered { answered: usize, total: usize },
}

/// Single generic lesson player shared by every skill module.
///
/// Holds the session, the answer store, and the question list; results are merged
/// back into the questions after submission.
pub struct LessonPlayer {
    lesson_id: LessonId,
    module: SkillModule,
    adapter: Box<dyn SubmissionAdapter>,
    clock: Clock,
    state: AttemptState,
    title: String,
    session: Option<Session>,
    questions: Vec<Question>,
    instructions: HashMap<QuestionId, String>,
    answers: AnswerSheet,
    trigger: Option<SubmitTrigger>,
    outcome: Option<SubmissionOutcome>,
    last_error: Option<String>,
}

impl LessonPlayer {
    #[must_use]
    pub fn new(lesson_id: LessonId, module: SkillModule, clock: Clock) -> Self {
        Self {
            lesson_id,
            module,
            adapter: adapter_for(module),
            clock,
            state: AttemptState::Loading,
            title: String::new(),
            session: None,
            questions: Vec::new(),
            instructions: HashMap::new(),
            answers: AnswerSheet::new(),
            trigger: None,
            outcome: None,
            last_error: None,
        }
    }

    /// Swap in a custom payload adapter.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Box<dyn SubmissionAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Install the fetched lesson and start the session clock.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::AlreadyLoaded` outside `Loading`, and
    /// `PlayerError::NoQuestions` for an empty lesson.
    pub fn load(&mut self, content: LessonContent) -> Result<(), PlayerError> {
        let mut content = content;
        content.questions.sort_by_key(|q| (q.order_index, q.id));
        self.install(content)
    }

    /// Like [`LessonPlayer::load`], but questions come from the task grouping: task
    /// questions first in task order, each remembering its task instruction.
    /// An empty grouping falls back to the lesson's own question list.
    ///
    /// # Errors
    ///
    /// Same as [`LessonPlayer::load`].
    pub fn load_grouped(
        &mut self,
        content: LessonContent,
        grouped: &GroupedQuestions,
    ) -> Result<(), PlayerError> {
        if grouped.total_questions() == 0 {
            return self.load(content);
        }
        let questions = grouped.flatten();
        self.install(LessonContent {
            questions,
            ..content
        })?;
        self.instructions = grouped
            .tasks
            .iter()
            .filter(|task| !task.instruction.trim().is_empty())
            .flat_map(|task| {
                task.questions
                    .iter()
                    .map(|q| (q.id, task.instruction.clone()))
            })
            .collect();
        Ok(())
    }

    fn install(&mut self, content: LessonContent) -> Result<(), PlayerError> {
        if self.state != AttemptState::Loading {
            return Err(PlayerError::AlreadyLoaded);
        }
        if content.questions.is_empty() {
            return Err(PlayerError::NoQuestions);
        }

        self.title = content.title;
        self.session = Some(Session::new(
            self.lesson_id,
            self.clock.now(),
            content.time_limit_secs,
        ));
        self.questions = content.questions;
        self.state = AttemptState::InProgress;
        Ok(())
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn module(&self) -> SkillModule {
        self.module
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Instruction of the task `question_id` belongs to.
    #[must_use]
    pub fn instruction_for(&self, question_id: QuestionId) -> Option<&str> {
        self.instructions.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn trigger(&self) -> Option<SubmitTrigger> {
        self.trigger
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        self.outcome.as_ref()
    }

    /// Message of the most recent failed submission, cleared on the next attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The countdown reached zero, or a timeout submission has started.
    #[must_use]
    pub fn is_time_up(&self) -> bool {
        self.trigger == Some(SubmitTrigger::Timeout)
            || self.session.as_ref().is_some_and(Session::is_expired)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Answered questions of this lesson (values for unknown ids are never stored).
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.count_answered()
    }

    fn ensure_editable(&self) -> Result<(), PlayerError> {
        match self.state {
            AttemptState::InProgress => Ok(()),
            AttemptState::Loading => Err(PlayerError::NotLoaded),
            AttemptState::Submitting => Err(PlayerError::AlreadySubmitting),
            AttemptState::Submitted => Err(PlayerError::AlreadySubmitted),
        }
    }

    fn ensure_answerable(&self) -> Result<(), PlayerError> {
        if self.state != AttemptState::Loading && self.is_time_up() {
            return Err(PlayerError::TimeUp);
        }
        self.ensure_editable()
    }

    fn known_question(&self, question_id: QuestionId) -> Result<&Question, PlayerError> {
        self.question(question_id)
            .ok_or(PlayerError::Answer(AnswerError::UnknownQuestion(question_id)))
    }

    /// Store a whole answer (last write wins).
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` if the attempt is not in progress or time is up, the question
    /// is unknown, or the answer shape does not fit the question.
    pub fn set_answer(&mut self, question_id: QuestionId, answer: Answer) -> Result<(), PlayerError> {
        self.ensure_answerable()?;
        let expected = self.known_question(question_id)?.kind.answer_shape();
        if answer.shape() != expected {
            return Err(AnswerError::ShapeMismatch {
                question_id,
                expected,
                found: answer.shape(),
            }
            .into());
        }
        self.answers.set(question_id, answer);
        Ok(())
    }

    /// Fill one blank of a fill-blank question.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` for a closed attempt, an unknown question, or a position
    /// outside the question's blanks.
    pub fn set_blank(
        &mut self,
        question_id: QuestionId,
        position: u32,
        text: impl Into<String>,
    ) -> Result<(), PlayerError> {
        self.ensure_answerable()?;
        let question = self.known_question(question_id)?;
        if !question.blank_positions().any(|p| p == position) {
            return Err(AnswerError::InvalidBlank {
                question_id,
                position,
            }
            .into());
        }
        self.answers.set_blank(question_id, position, text)?;
        Ok(())
    }

    /// Choose the right-hand value for one left-hand item of a matching question.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` for a closed attempt, an unknown question, a non-matching
    /// question, or a left item the question does not list.
    pub fn set_pair(
        &mut self,
        question_id: QuestionId,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Result<(), PlayerError> {
        self.ensure_answerable()?;
        let question = self.known_question(question_id)?;
        let expected = question.kind.answer_shape();
        if expected != AnswerShape::Pairs {
            return Err(AnswerError::ShapeMismatch {
                question_id,
                expected,
                found: AnswerShape::Pairs,
            }
            .into());
        }
        let left = left.into();
        if !question.match_left.is_empty() && !question.match_left.contains(&left) {
            return Err(PlayerError::UnknownMatchItem(left));
        }
        self.answers.set_pair(question_id, left, right)?;
        Ok(())
    }

    /// Record the countdown value reported by the session timer.
    pub fn sync_remaining(&mut self, remaining_secs: u32) {
        if let Some(session) = self.session.as_mut() {
            session.sync_remaining(remaining_secs);
        }
    }

    /// Whether the submit should go ahead or ask the learner first.
    ///
    /// Only manual submits with unanswered questions ask; once time is up, whatever
    /// has been answered is sent.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` if the attempt is not in progress.
    pub fn request_submit(&self, trigger: SubmitTrigger) -> Result<SubmitPrompt, PlayerError> {
        self.ensure_editable()?;
        let answered = self.answered_count();
        let total = self.total_questions();
        if trigger == SubmitTrigger::Manual && !self.is_time_up() && answered < total {
            return Ok(SubmitPrompt::ConfirmUnanswered { answered, total });
        }
        Ok(SubmitPrompt::Proceed)
    }

    /// Enter `Submitting` and build the request body. Acts as the in-flight flag:
    /// a second call fails until `complete_submit` or `fail_submit` runs.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::AlreadySubmitting` / `AlreadySubmitted` for duplicate submits.
    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> Result<Submission, PlayerError> {
        self.ensure_editable()?;

        let entries = self
            .questions
            .iter()
            .map(|question| {
                let empty;
                let answer = match self.answers.get(question.id) {
                    Some(answer) => answer,
                    None => {
                        empty = question.empty_answer();
                        &empty
                    }
                };
                self.adapter.entry(question, answer)
            })
            .collect();

        self.state = AttemptState::Submitting;
        self.trigger = Some(trigger);
        self.last_error = None;
        Ok(Submission {
            lesson_id: self.lesson_id,
            entries,
        })
    }

    /// Merge the judge's results and close the attempt.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::InvalidState` unless a submission is in flight.
    pub fn complete_submit(&mut self, outcome: SubmissionOutcome) -> Result<MergeReport, PlayerError> {
        if self.state != AttemptState::Submitting {
            return Err(PlayerError::InvalidState(self.state));
        }
        let report = merge_results(&mut self.questions, &outcome.results);
        if let Some(session) = self.session.as_mut() {
            session.mark_submitted();
        }
        self.outcome = Some(outcome);
        self.state = AttemptState::Submitted;
        Ok(report)
    }

    /// Release the in-flight flag after a failed request so the learner can retry.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::InvalidState` unless a submission is in flight.
    pub fn fail_submit(&mut self, message: impl Into<String>) -> Result<(), PlayerError> {
        if self.state != AttemptState::Submitting {
            return Err(PlayerError::InvalidState(self.state));
        }
        self.state = AttemptState::InProgress;
        self.last_error = Some(message.into());
        Ok(())
    }

    /// Re-merge a result set (e.g. after re-fetching). Idempotent.
    pub fn merge(&mut self, outcome: &SubmissionOutcome) -> MergeReport {
        merge_results(&mut self.questions, &outcome.results)
    }

    /// Review rows for the current questions and answers.
    #[must_use]
    pub fn review(&self) -> Vec<ReviewItem> {
        review_items(&self.questions, &self.answers)
    }
}

impl fmt::Debug for LessonPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LessonPlayer")
            .field("lesson_id", &self.lesson_id)
            .field("module", &self.module)
            .field("state", &self.state)
            .field("questions_len", &self.questions.len())
            .field("answered", &self.answers.count_answered())
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

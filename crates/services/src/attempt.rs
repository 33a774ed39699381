//! One running lesson attempt: player + API + countdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lesson_core::Clock;
use lesson_core::model::{
    Answer, GroupedQuestions, LessonId, QuestionId, SkillModule, SubmissionOutcome,
};

use crate::api::LessonApi;
use crate::error::{ApiError, AttemptError};
use crate::player::{LessonPlayer, SubmitPrompt, SubmitTrigger};
use crate::timer::SessionTimer;

/// Notifications for whoever renders the attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    Tick {
        remaining_secs: u32,
    },
    /// The countdown hit zero; an automatic submission follows.
    TimedOut,
    Submitted {
        trigger: SubmitTrigger,
        outcome: SubmissionOutcome,
    },
    SubmitFailed {
        trigger: SubmitTrigger,
        message: String,
        retryable: bool,
    },
}

struct Shared {
    api: Arc<dyn LessonApi>,
    player: Mutex<LessonPlayer>,
    timer: Mutex<SessionTimer>,
    timeout_task: Mutex<Option<JoinHandle<()>>>,
    alive: AtomicBool,
    events: UnboundedSender<AttemptEvent>,
}

impl Shared {
    fn player(&self) -> Result<MutexGuard<'_, LessonPlayer>, AttemptError> {
        self.player.lock().map_err(|_| AttemptError::StateUnavailable)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn emit(&self, event: AttemptEvent) {
        // The receiver may already be gone; events are advisory.
        let _ = self.events.send(event);
    }

    fn stop_timer(&self) {
        if let Ok(mut timer) = self.timer.lock() {
            timer.stop();
        }
    }
}

/// A lesson being taken. Dropping it (or calling [`LessonAttempt::leave`]) stops the
/// countdown, cancels a pending automatic submit, and discards any response still in
/// flight.
pub struct LessonAttempt {
    shared: Arc<Shared>,
}

impl LessonAttempt {
    /// Fetch the lesson and its task grouping, start the session and its countdown.
    ///
    /// Does not check access; callers gate through the catalog first.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the lesson cannot be fetched or has no questions.
    pub async fn open(
        api: Arc<dyn LessonApi>,
        lesson_id: LessonId,
        module: SkillModule,
        clock: Clock,
    ) -> Result<(Self, UnboundedReceiver<AttemptEvent>), AttemptError> {
        let content = api.get_lesson(lesson_id).await?;
        let time_limit = content.time_limit_secs;
        let grouped = match api.grouped_questions(lesson_id).await {
            Ok(grouped) => grouped,
            Err(ApiError::Server { status: 404, .. }) => {
                debug!(%lesson_id, "no task grouping for lesson");
                GroupedQuestions::default()
            }
            Err(err) => return Err(err.into()),
        };

        let mut player = LessonPlayer::new(lesson_id, module, clock);
        player.load_grouped(content, &grouped)?;
        info!(
            %lesson_id,
            %module,
            questions = player.total_questions(),
            time_limit_secs = ?time_limit,
            "lesson attempt opened"
        );

        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            api,
            player: Mutex::new(player),
            timer: Mutex::new(SessionTimer::new()),
            timeout_task: Mutex::new(None),
            alive: AtomicBool::new(true),
            events,
        });

        if let Some(limit) = time_limit {
            start_countdown(&shared, limit)?;
        }

        Ok((Self { shared }, receiver))
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Remaining seconds, `None` for untimed lessons.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.with_player(|p| p.session().and_then(|s| s.remaining_secs()))
            .ok()
            .flatten()
    }

    /// Read access to the player under its lock.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::StateUnavailable` if the lock is poisoned.
    pub fn with_player<R>(&self, f: impl FnOnce(&LessonPlayer) -> R) -> Result<R, AttemptError> {
        let player = self.shared.player()?;
        Ok(f(&player))
    }

    /// # Errors
    ///
    /// Returns `AttemptError` if the attempt is closed or the answer is rejected.
    pub fn set_answer(&self, question_id: QuestionId, answer: Answer) -> Result<(), AttemptError> {
        self.ensure_alive()?;
        self.shared.player()?.set_answer(question_id, answer)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AttemptError` if the attempt is closed or the blank is rejected.
    pub fn set_blank(
        &self,
        question_id: QuestionId,
        position: u32,
        text: impl Into<String>,
    ) -> Result<(), AttemptError> {
        self.ensure_alive()?;
        self.shared.player()?.set_blank(question_id, position, text)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AttemptError` if the attempt is closed or the pair is rejected.
    pub fn set_pair(
        &self,
        question_id: QuestionId,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Result<(), AttemptError> {
        self.ensure_alive()?;
        self.shared.player()?.set_pair(question_id, left, right)?;
        Ok(())
    }

    /// Ask whether a manual submit can go ahead without confirmation.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the attempt is closed or not in progress.
    pub fn request_submit(&self) -> Result<SubmitPrompt, AttemptError> {
        self.ensure_alive()?;
        Ok(self.shared.player()?.request_submit(SubmitTrigger::Manual)?)
    }

    /// Submit now (the learner confirmed, or nothing was unanswered).
    ///
    /// Also used to retry after a failed submission.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` for duplicate submits, closed attempts, or API failures.
    pub async fn submit(&self) -> Result<SubmissionOutcome, AttemptError> {
        run_submit(&self.shared, SubmitTrigger::Manual).await
    }

    /// Stop everything. Idempotent.
    pub fn leave(&self) {
        if !self.shared.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.stop_timer();
        if let Ok(mut slot) = self.shared.timeout_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        if let Ok(player) = self.shared.player() {
            info!(lesson_id = %player.lesson_id(), state = ?player.state(), "lesson attempt left");
        }
    }

    fn ensure_alive(&self) -> Result<(), AttemptError> {
        if self.shared.is_alive() {
            Ok(())
        } else {
            Err(AttemptError::Closed)
        }
    }
}

impl Drop for LessonAttempt {
    fn drop(&mut self) {
        self.leave();
    }
}

fn start_countdown(shared: &Arc<Shared>, limit: u32) -> Result<(), AttemptError> {
    let on_tick = {
        let weak = Arc::downgrade(shared);
        move |remaining_secs: u32| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Ok(mut player) = shared.player() {
                player.sync_remaining(remaining_secs);
            }
            debug!(remaining_secs, "attempt tick");
            shared.emit(AttemptEvent::Tick { remaining_secs });
        }
    };
    let on_timeout = {
        let weak = Arc::downgrade(shared);
        move || on_timeout(&weak)
    };

    let mut timer = shared
        .timer
        .lock()
        .map_err(|_| AttemptError::StateUnavailable)?;
    timer.start_with_ticks(limit, on_tick, on_timeout);
    Ok(())
}

fn on_timeout(weak: &Weak<Shared>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    if !shared.is_alive() {
        return;
    }
    if let Ok(mut player) = shared.player() {
        player.sync_remaining(0);
    }
    info!("attempt timed out; submitting");
    shared.emit(AttemptEvent::TimedOut);
    spawn_timeout_submit(&shared);
}

/// If a manual submit is still in flight the timeout submit finds it busy and
/// stops; `run_submit` re-queues it should that manual submit fail.
fn spawn_timeout_submit(shared: &Arc<Shared>) {
    let task_shared = Arc::clone(shared);
    let task = tokio::spawn(async move {
        // Outcome is reported through events.
        let _ = run_submit(&task_shared, SubmitTrigger::Timeout).await;
    });
    if let Ok(mut slot) = shared.timeout_task.lock() {
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }
}

async fn run_submit(
    shared: &Arc<Shared>,
    trigger: SubmitTrigger,
) -> Result<SubmissionOutcome, AttemptError> {
    if !shared.is_alive() {
        return Err(AttemptError::Closed);
    }
    let submission = shared.player()?.begin_submit(trigger)?;
    info!(
        lesson_id = %submission.lesson_id,
        ?trigger,
        entries = submission.entries.len(),
        "submitting lesson"
    );

    let result = shared.api.submit_lesson(&submission).await;

    if !shared.is_alive() {
        warn!(lesson_id = %submission.lesson_id, "attempt left; discarding submit response");
        if let Ok(mut player) = shared.player() {
            let _ = player.fail_submit("attempt closed");
        }
        return Err(AttemptError::Closed);
    }

    match result {
        Ok(outcome) => {
            let report = shared.player()?.complete_submit(outcome.clone())?;
            if !report.unknown.is_empty() {
                debug!(unknown = ?report.unknown, "results for unknown questions ignored");
            }
            shared.stop_timer();
            info!(
                score = outcome.score_percentage,
                passed = outcome.is_passed,
                ?trigger,
                "lesson submitted"
            );
            shared.emit(AttemptEvent::Submitted {
                trigger,
                outcome: outcome.clone(),
            });
            Ok(outcome)
        }
        Err(err) => {
            let message = err.to_string();
            let time_up = {
                let mut player = shared.player()?;
                player.fail_submit(message.clone())?;
                player.is_time_up()
            };
            warn!(error = %message, ?trigger, "lesson submit failed");
            shared.emit(AttemptEvent::SubmitFailed {
                trigger,
                message,
                retryable: err.is_retryable(),
            });
            if trigger == SubmitTrigger::Manual && time_up {
                info!("time ran out during a failed manual submit; submitting on timeout");
                spawn_timeout_submit(shared);
            }
            Err(err.into())
        }
    }
}

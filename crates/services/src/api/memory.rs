//! In-process backend used for offline runs and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use lesson_core::model::{
    ChoiceOption, GroupedQuestions, Lesson, LessonContent, LessonId, Page, PageRequest,
    ProficiencyLevel, Question, QuestionId, QuestionKind, QuestionResult, Role, SkillModule,
    SubmissionOutcome, Topic, TopicId, UserId, UserProfile,
};

use super::{Credentials, LessonApi, LoginGrant, Submission, SubmissionEntry};
use crate::auth::SessionTokens;
use crate::error::ApiError;

/// Score (percent) needed to pass a lesson.
pub const DEFAULT_PASS_MARK: f64 = 70.0;

struct Account {
    email: String,
    password: String,
    role: Role,
    profile: UserProfile,
}

struct State {
    accounts: Vec<Account>,
    issued: HashMap<String, (Role, UserId)>,
    next_token: u64,
    topics: BTreeMap<TopicId, Topic>,
    lessons: BTreeMap<LessonId, Lesson>,
    contents: HashMap<LessonId, LessonContent>,
    groups: HashMap<LessonId, GroupedQuestions>,
    keys: HashMap<QuestionId, Value>,
    completed: HashMap<UserId, BTreeSet<LessonId>>,
    submissions: Vec<Submission>,
    pass_mark: f64,
    fail_next_submit: Option<u16>,
    submit_delay: Option<Duration>,
}

impl State {
    fn new() -> Self {
        Self {
            accounts: Vec::new(),
            issued: HashMap::new(),
            next_token: 1,
            topics: BTreeMap::new(),
            lessons: BTreeMap::new(),
            contents: HashMap::new(),
            groups: HashMap::new(),
            keys: HashMap::new(),
            completed: HashMap::new(),
            submissions: Vec::new(),
            pass_mark: DEFAULT_PASS_MARK,
            fail_next_submit: None,
            submit_delay: None,
        }
    }
}

/// `LessonApi` over shared in-memory state.
///
/// Issues its own tokens on login and checks the caller's token (read from the shared
/// [`SessionTokens`]) on every other call, so session expiry behaves like the real
/// backend.
#[derive(Clone)]
pub struct InMemoryLessonApi {
    role: Role,
    tokens: Arc<SessionTokens>,
    state: Arc<Mutex<State>>,
}

impl InMemoryLessonApi {
    #[must_use]
    pub fn new(role: Role, tokens: Arc<SessionTokens>) -> Self {
        Self {
            role,
            tokens,
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Same backend state, acting under another role.
    #[must_use]
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_account(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
        role: Role,
        profile: UserProfile,
    ) {
        self.lock().accounts.push(Account {
            email: email.into(),
            password: password.into(),
            role,
            profile,
        });
    }

    pub fn add_topic(&self, topic: Topic) {
        self.lock().topics.insert(topic.id, topic);
    }

    /// Registers a lesson and the questions served for it.
    pub fn add_lesson(&self, lesson: Lesson, questions: Vec<Question>) {
        let content = LessonContent {
            id: lesson.id,
            title: lesson.title.clone(),
            time_limit_secs: lesson.time_limit_secs,
            questions,
        };
        let mut state = self.lock();
        state.contents.insert(lesson.id, content);
        state.lessons.insert(lesson.id, lesson);
    }

    pub fn set_groups(&self, lesson_id: LessonId, groups: GroupedQuestions) {
        self.lock().groups.insert(lesson_id, groups);
    }

    /// Expected answer: a string, or an object keyed by blank position / left item.
    pub fn set_answer_key(&self, question_id: QuestionId, key: Value) {
        self.lock().keys.insert(question_id, key);
    }

    pub fn mark_completed(&self, user_id: UserId, lesson_id: LessonId) {
        self.lock()
            .completed
            .entry(user_id)
            .or_default()
            .insert(lesson_id);
    }

    pub fn set_pass_mark(&self, pass_mark: f64) {
        self.lock().pass_mark = pass_mark;
    }

    /// The next submit fails with this HTTP status.
    pub fn fail_next_submit(&self, status: u16) {
        self.lock().fail_next_submit = Some(status);
    }

    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.lock().submit_delay = delay;
    }

    /// Invalidates every issued token.
    pub fn expire_sessions(&self) {
        self.lock().issued.clear();
    }

    /// Submissions received so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    fn caller(&self) -> Result<UserProfile, ApiError> {
        let token = self
            .tokens
            .token(self.role)
            .ok_or(ApiError::MissingToken { role: self.role })?;
        let state = self.lock();
        let Some((role, user_id)) = state.issued.get(&token).copied() else {
            return Err(ApiError::Unauthorized { role: self.role });
        };
        if role != self.role {
            return Err(ApiError::Forbidden {
                message: format!("{role} token used for {} endpoint", self.role),
            });
        }
        state
            .accounts
            .iter()
            .find(|a| a.profile.id == user_id)
            .map(|a| a.profile.clone())
            .ok_or(ApiError::Unauthorized { role: self.role })
    }
}

#[async_trait]
impl LessonApi for InMemoryLessonApi {
    fn role(&self) -> Role {
        self.role
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        let mut state = self.lock();
        let Some(profile) = state
            .accounts
            .iter()
            .find(|a| {
                a.email.eq_ignore_ascii_case(credentials.email.trim())
                    && a.password == credentials.password
                    && a.role == self.role
            })
            .map(|a| a.profile.clone())
        else {
            return Err(ApiError::LoginRejected {
                message: "invalid email or password".into(),
            });
        };

        let token = format!("mem-{}-{}", self.role.segment(), state.next_token);
        state.next_token += 1;
        state.issued.insert(token.clone(), (self.role, profile.id));
        info!(role = %self.role, user_id = %profile.id, "offline login");
        Ok(LoginGrant {
            token,
            user: profile,
        })
    }

    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.caller()
    }

    async fn list_topics(
        &self,
        module: SkillModule,
        page: PageRequest,
    ) -> Result<Page<Topic>, ApiError> {
        self.caller()?;
        let state = self.lock();
        let matching: Vec<Topic> = state
            .topics
            .values()
            .filter(|t| t.module == module)
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let size = page.size() as usize;
        let items = matching
            .into_iter()
            .skip(page.zero_based() as usize * size)
            .take(size)
            .collect();
        Ok(Page::from_zero_based(items, page.zero_based(), page.size(), total))
    }

    async fn get_topic(&self, topic_id: TopicId) -> Result<Topic, ApiError> {
        self.caller()?;
        self.lock()
            .topics
            .get(&topic_id)
            .cloned()
            .ok_or_else(|| not_found("topic", topic_id))
    }

    async fn list_lessons(&self, topic_id: TopicId) -> Result<Vec<Lesson>, ApiError> {
        self.caller()?;
        let state = self.lock();
        if !state.topics.contains_key(&topic_id) {
            return Err(not_found("topic", topic_id));
        }
        let mut lessons: Vec<Lesson> = state
            .lessons
            .values()
            .filter(|l| l.topic_id == topic_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order_index, l.id));
        Ok(lessons)
    }

    async fn completed_lessons(&self, topic_id: TopicId) -> Result<Vec<LessonId>, ApiError> {
        let user = self.caller()?;
        let state = self.lock();
        let Some(done) = state.completed.get(&user.id) else {
            return Ok(Vec::new());
        };
        Ok(done
            .iter()
            .copied()
            .filter(|id| state.lessons.get(id).is_some_and(|l| l.topic_id == topic_id))
            .collect())
    }

    async fn get_lesson(&self, lesson_id: LessonId) -> Result<LessonContent, ApiError> {
        self.caller()?;
        self.lock()
            .contents
            .get(&lesson_id)
            .cloned()
            .ok_or_else(|| not_found("lesson", lesson_id))
    }

    async fn grouped_questions(&self, lesson_id: LessonId) -> Result<GroupedQuestions, ApiError> {
        self.caller()?;
        let state = self.lock();
        if let Some(groups) = state.groups.get(&lesson_id) {
            return Ok(groups.clone());
        }
        let content = state
            .contents
            .get(&lesson_id)
            .ok_or_else(|| not_found("lesson", lesson_id))?;
        Ok(GroupedQuestions {
            tasks: Vec::new(),
            standalone: content.questions.clone(),
        })
    }

    async fn submit_lesson(&self, submission: &Submission) -> Result<SubmissionOutcome, ApiError> {
        let user = self.caller()?;

        let delay = self.lock().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(status) = state.fail_next_submit.take() {
            debug!(status, "offline submit failure injected");
            return Err(ApiError::Server {
                status,
                message: "injected failure".into(),
            });
        }
        let content = state
            .contents
            .get(&submission.lesson_id)
            .ok_or_else(|| not_found("lesson", submission.lesson_id))?;

        let outcome = grade(content, &submission.entries, &state.keys, state.pass_mark);
        if outcome.is_passed {
            state
                .completed
                .entry(user.id)
                .or_default()
                .insert(submission.lesson_id);
        }
        state.submissions.push(submission.clone());
        info!(
            lesson_id = %submission.lesson_id,
            score = outcome.score_percentage,
            passed = outcome.is_passed,
            "offline submission graded"
        );
        Ok(outcome)
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> ApiError {
    ApiError::Server {
        status: 404,
        message: format!("{what} {id} not found"),
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// What the learner sent, in whichever field the module's adapter used.
fn given_value(entry: &SubmissionEntry) -> Value {
    if let Some(answer) = &entry.answer {
        return answer.clone();
    }
    if let Some(selected) = &entry.selected_options {
        return selected
            .first()
            .map_or(Value::Null, |s| Value::String(s.clone()));
    }
    match &entry.text_answer {
        Some(text) if text.trim_start().starts_with('{') => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Some(text) => Value::String(text.clone()),
        None => Value::Null,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        Value::Null => String::new(),
        other => normalize(&other.to_string()),
    }
}

/// Fraction of the key matched by `given`, in `0.0..=1.0`.
fn match_ratio(key: &Value, given: &Value) -> f64 {
    match key {
        Value::Object(expected) if !expected.is_empty() => {
            let hits = expected
                .iter()
                .filter(|(k, v)| {
                    given
                        .get(k.as_str())
                        .is_some_and(|g| !text_of(g).is_empty() && text_of(g) == text_of(v))
                })
                .count();
            hits as f64 / expected.len() as f64
        }
        _ => {
            let expected = text_of(key);
            if !expected.is_empty() && expected == text_of(given) {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn grade(
    content: &LessonContent,
    entries: &[SubmissionEntry],
    keys: &HashMap<QuestionId, Value>,
    pass_mark: f64,
) -> SubmissionOutcome {
    let mut earned = 0.0;
    let mut possible = 0.0;
    let mut results = Vec::with_capacity(content.questions.len());

    for question in &content.questions {
        let points = f64::from(question.points);
        possible += points;

        let given = entries
            .iter()
            .find(|e| e.question_id == question.id)
            .map_or(Value::Null, given_value);
        let key = keys.get(&question.id);
        let ratio = key.map_or(0.0, |k| match_ratio(k, &given));
        let scored = points * ratio;
        earned += scored;

        // Composite keys go back as JSON text, the way the backend stores them.
        let correct_answer = key.map(|k| match k {
            Value::Object(_) => Value::String(k.to_string()),
            other => other.clone(),
        });
        results.push(QuestionResult {
            question_id: question.id,
            is_correct: (ratio - 1.0).abs() < f64::EPSILON,
            points: scored,
            correct_answer,
        });
    }

    let score_percentage = if possible > 0.0 {
        (earned / possible * 10_000.0).round() / 100.0
    } else {
        0.0
    };
    SubmissionOutcome {
        is_passed: score_percentage >= pass_mark,
        score_percentage,
        results,
    }
}

impl InMemoryLessonApi {
    /// A small seeded catalog for `--offline` runs.
    ///
    /// Accounts: `learner@example.com` / `learner` (user, A2), `teacher@example.com` /
    /// `teacher`, `admin@example.com` / `admin`.
    #[must_use]
    pub fn demo(role: Role, tokens: Arc<SessionTokens>) -> Self {
        let api = Self::new(role, tokens);
        api.add_account(
            "learner@example.com",
            "learner",
            Role::User,
            profile(1, "Lena Learner", Some(ProficiencyLevel::A2)),
        );
        api.add_account(
            "teacher@example.com",
            "teacher",
            Role::Teacher,
            profile(2, "Tom Teacher", Some(ProficiencyLevel::C1)),
        );
        api.add_account(
            "admin@example.com",
            "admin",
            Role::Admin,
            profile(3, "Ada Admin", None),
        );

        api.add_topic(topic(1, SkillModule::Grammar, "Past simple", None, true));
        api.add_topic(topic(
            2,
            SkillModule::Grammar,
            "Conditionals",
            Some(ProficiencyLevel::B1),
            true,
        ));
        api.add_topic(topic(3, SkillModule::Reading, "Short stories", None, true));
        api.add_topic(topic(
            4,
            SkillModule::Listening,
            "Everyday dialogues",
            Some(ProficiencyLevel::A2),
            true,
        ));
        api.add_topic(topic(5, SkillModule::Grammar, "Draft: modal verbs", None, false));

        api.add_lesson(
            lesson(1, 1, "Regular verbs", 1, None, Some(300)),
            vec![
                choice(101, "Yesterday I ___ to the park.", &["go", "went", "gone"], 1),
                Question::new(
                    QuestionId::new(102),
                    QuestionKind::FillBlank,
                    "She ___ (play) tennis and ___ (watch) a film.",
                )
                .with_order_index(2),
                Question::new(
                    QuestionId::new(103),
                    QuestionKind::ShortAnswer,
                    "Past simple of \"stop\"?",
                )
                .with_order_index(3),
            ],
        );
        api.set_answer_key(QuestionId::new(101), Value::String("B".into()));
        api.set_answer_key(
            QuestionId::new(102),
            serde_json::json!({"1": "played", "2": "watched"}),
        );
        api.set_answer_key(QuestionId::new(103), Value::String("stopped".into()));

        api.add_lesson(
            lesson(2, 1, "Irregular verbs", 2, None, Some(240)),
            vec![
                Question::new(
                    QuestionId::new(201),
                    QuestionKind::Matching,
                    "Match each verb with its past form.",
                )
                .with_matching(
                    vec!["eat".into(), "see".into(), "take".into()],
                    vec!["took".into(), "ate".into(), "saw".into()],
                )
                .with_order_index(1),
                Question::new(
                    QuestionId::new(202),
                    QuestionKind::TrueFalse,
                    "\"Buyed\" is the past of \"buy\".",
                )
                .with_options(true_false())
                .with_order_index(2),
            ],
        );
        api.set_answer_key(
            QuestionId::new(201),
            serde_json::json!({"eat": "ate", "see": "saw", "take": "took"}),
        );
        api.set_answer_key(QuestionId::new(202), Value::String("FALSE".into()));

        api.add_lesson(
            lesson(3, 2, "Second conditional", 1, Some(ProficiencyLevel::B2), None),
            vec![choice(
                301,
                "If I ___ rich, I would travel.",
                &["am", "were", "will be"],
                1,
            )],
        );
        api.set_answer_key(QuestionId::new(301), Value::String("B".into()));

        api.add_lesson(
            lesson(4, 3, "The lost key", 1, None, Some(600)),
            vec![
                choice(
                    401,
                    "Where did Sam find the key?",
                    &["In the car", "Under the mat", "In his pocket"],
                    1,
                ),
                Question::new(
                    QuestionId::new(402),
                    QuestionKind::ShortAnswer,
                    "Who lost the key?",
                )
                .with_order_index(2),
            ],
        );
        api.set_answer_key(QuestionId::new(401), Value::String("B".into()));
        api.set_answer_key(QuestionId::new(402), Value::String("Sam".into()));

        api.add_lesson(
            lesson(5, 4, "At the cafe", 1, None, Some(180)),
            vec![
                Question::new(
                    QuestionId::new(501),
                    QuestionKind::FillBlank,
                    "I'd like a ___ of tea and a ___, please.",
                )
                .with_order_index(1),
            ],
        );
        api.set_answer_key(
            QuestionId::new(501),
            serde_json::json!({"1": "cup", "2": "sandwich"}),
        );

        api
    }
}

/// Sign-in for the seeded account of `role`.
#[must_use]
pub fn demo_credentials(role: Role) -> Credentials {
    let name = match role {
        Role::Admin => "admin",
        Role::Teacher => "teacher",
        Role::User => "learner",
    };
    Credentials::new(format!("{name}@example.com"), name)
}

fn profile(id: u64, name: &str, level: Option<ProficiencyLevel>) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        name: name.to_string(),
        level,
    }
}

fn topic(
    id: u64,
    module: SkillModule,
    name: &str,
    required_level: Option<ProficiencyLevel>,
    is_active: bool,
) -> Topic {
    Topic {
        id: TopicId::new(id),
        module,
        name: name.to_string(),
        description: None,
        required_level,
        is_active,
        owner_id: Some(UserId::new(2)),
    }
}

fn lesson(
    id: u64,
    topic_id: u64,
    title: &str,
    order_index: u32,
    required_level: Option<ProficiencyLevel>,
    time_limit_secs: Option<u32>,
) -> Lesson {
    Lesson {
        id: LessonId::new(id),
        topic_id: TopicId::new(topic_id),
        title: title.to_string(),
        order_index,
        required_level,
        is_active: true,
        time_limit_secs,
    }
}

fn choice(id: u64, content: &str, options: &[&str], order_index: u32) -> Question {
    let options = options
        .iter()
        .zip(['A', 'B', 'C', 'D', 'E'])
        .map(|(text, key)| ChoiceOption {
            key: key.to_string(),
            text: (*text).to_string(),
        })
        .collect();
    Question::new(QuestionId::new(id), QuestionKind::MultipleChoice, content)
        .with_options(options)
        .with_order_index(order_index)
}

fn true_false() -> Vec<ChoiceOption> {
    vec![
        ChoiceOption {
            key: "TRUE".into(),
            text: "True".into(),
        },
        ChoiceOption {
            key: "FALSE".into(),
            text: "False".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: u64, answer: Value) -> SubmissionEntry {
        SubmissionEntry {
            question_id: QuestionId::new(id),
            answer: Some(answer),
            selected_options: None,
            text_answer: None,
        }
    }

    fn content() -> LessonContent {
        LessonContent {
            id: LessonId::new(1),
            title: "t".into(),
            time_limit_secs: None,
            questions: vec![
                Question::new(QuestionId::new(1), QuestionKind::ShortAnswer, "a"),
                Question::new(QuestionId::new(2), QuestionKind::FillBlank, "___ and ___"),
            ],
        }
    }

    fn keys() -> HashMap<QuestionId, Value> {
        HashMap::from([
            (QuestionId::new(1), json!("Went")),
            (QuestionId::new(2), json!({"1": "cat", "2": "dog"})),
        ])
    }

    #[test]
    fn grading_normalizes_and_gives_partial_credit() {
        let outcome = grade(
            &content(),
            &[entry(1, json!("  went ")), entry(2, json!({"1": "CAT", "2": ""}))],
            &keys(),
            DEFAULT_PASS_MARK,
        );
        assert_eq!(outcome.score_percentage, 75.0);
        assert!(outcome.is_passed);
        assert!(outcome.results[0].is_correct);
        assert!(!outcome.results[1].is_correct);
        assert_eq!(outcome.results[1].points, 0.5);
        assert_eq!(
            outcome.results[1].correct_answer,
            Some(Value::String(json!({"1": "cat", "2": "dog"}).to_string()))
        );
    }

    #[test]
    fn text_answers_and_selected_options_are_read() {
        let text = SubmissionEntry {
            question_id: QuestionId::new(2),
            answer: None,
            selected_options: None,
            text_answer: Some(r#"{"1":"cat","2":"dog"}"#.into()),
        };
        let selected = SubmissionEntry {
            question_id: QuestionId::new(1),
            answer: None,
            selected_options: Some(vec!["went".into()]),
            text_answer: None,
        };
        let outcome = grade(&content(), &[selected, text], &keys(), DEFAULT_PASS_MARK);
        assert_eq!(outcome.score_percentage, 100.0);
        assert_eq!(outcome.correct_count(), 2);
    }

    #[test]
    fn empty_submission_fails() {
        let outcome = grade(&content(), &[], &keys(), DEFAULT_PASS_MARK);
        assert_eq!(outcome.score_percentage, 0.0);
        assert!(!outcome.is_passed);
    }

    #[tokio::test]
    async fn demo_accounts_sign_in_for_each_role() {
        let repo = Arc::new(storage::repository::InMemoryRepository::new());
        let tokens = Arc::new(
            SessionTokens::load(repo, lesson_core::time::fixed_clock())
                .await
                .unwrap(),
        );
        for role in Role::ALL {
            let api = InMemoryLessonApi::demo(role, Arc::clone(&tokens));
            let grant = api.login(&demo_credentials(role)).await.unwrap();
            assert!(grant.token.starts_with(&format!("mem-{}-", role.segment())));
        }

        let learner = InMemoryLessonApi::demo(Role::User, tokens);
        let err = learner
            .login(&demo_credentials(Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::LoginRejected { .. }));
    }
}

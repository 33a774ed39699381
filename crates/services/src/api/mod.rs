//! REST boundary to the platform backend.

mod http;
mod memory;
pub(crate) mod wire;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use lesson_core::model::{
    GroupedQuestions, Lesson, LessonContent, LessonId, Page, PageRequest, QuestionId, Role,
    SkillModule, SubmissionOutcome, Topic, TopicId, UserProfile,
};

use crate::error::ApiError;

pub use http::HttpLessonApi;
pub use memory::{InMemoryLessonApi, demo_credentials};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Successful login: the bearer token and who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub user: UserProfile,
}

/// One answered question in a submission body.
///
/// Exactly one of the value fields is set, chosen by the module's submission adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntry {
    pub question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
}

/// Answers collected for one lesson attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub lesson_id: LessonId,
    pub entries: Vec<SubmissionEntry>,
}

/// Everything the client needs from the backend.
///
/// Implementations are bound to one explicit [`Role`]; its token authorizes every call
/// except `login`.
#[async_trait]
pub trait LessonApi: Send + Sync {
    /// The role whose session this client acts under.
    fn role(&self) -> Role;

    /// Exchange credentials for a token. Never clears stored state on failure.
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError>;

    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    async fn list_topics(
        &self,
        module: SkillModule,
        page: PageRequest,
    ) -> Result<Page<Topic>, ApiError>;

    async fn get_topic(&self, topic_id: TopicId) -> Result<Topic, ApiError>;

    async fn list_lessons(&self, topic_id: TopicId) -> Result<Vec<Lesson>, ApiError>;

    /// Lessons of the topic the current learner has completed.
    async fn completed_lessons(&self, topic_id: TopicId) -> Result<Vec<LessonId>, ApiError>;

    async fn get_lesson(&self, lesson_id: LessonId) -> Result<LessonContent, ApiError>;

    async fn grouped_questions(&self, lesson_id: LessonId) -> Result<GroupedQuestions, ApiError>;

    async fn submit_lesson(&self, submission: &Submission) -> Result<SubmissionOutcome, ApiError>;
}

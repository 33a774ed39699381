#![allow(dead_code)]

use std::sync::Arc;

use lesson_core::model::{
    Lesson, LessonId, ProficiencyLevel, Question, QuestionId, QuestionKind, Role, SkillModule,
    Topic, TopicId, UserId, UserProfile,
};
use lesson_core::time::fixed_clock;
use serde_json::json;
use services::{AuthService, Credentials, InMemoryLessonApi, SessionTokens};
use storage::repository::InMemoryRepository;

pub const EMAIL: &str = "mia@example.com";
pub const PASSWORD: &str = "secret";

pub async fn tokens() -> Arc<SessionTokens> {
    Arc::new(
        SessionTokens::load(Arc::new(InMemoryRepository::new()), fixed_clock())
            .await
            .unwrap(),
    )
}

pub fn learner() -> UserProfile {
    UserProfile {
        id: UserId::new(7),
        name: "Mia".into(),
        level: Some(ProficiencyLevel::A2),
    }
}

pub fn lesson(id: u64, order_index: u32, time_limit_secs: Option<u32>) -> Lesson {
    Lesson {
        id: LessonId::new(id),
        topic_id: TopicId::new(1),
        title: format!("Lesson {id}"),
        order_index,
        required_level: None,
        is_active: true,
        time_limit_secs,
    }
}

pub fn topic(id: u64, required_level: Option<ProficiencyLevel>, is_active: bool) -> Topic {
    Topic {
        id: TopicId::new(id),
        module: SkillModule::Grammar,
        name: format!("Topic {id}"),
        description: None,
        required_level,
        is_active,
        owner_id: Some(UserId::new(2)),
    }
}

/// Three questions: a choice, a two-blank fill-in, and a short answer.
pub fn questions() -> Vec<Question> {
    vec![
        Question::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Pick").with_order_index(1),
        Question::new(QuestionId::new(2), QuestionKind::FillBlank, "I ___ a ___")
            .with_order_index(2),
        Question::new(QuestionId::new(3), QuestionKind::ShortAnswer, "Say hi").with_order_index(3),
    ]
}

/// Backend with one learner account, one topic and two lessons.
///
/// Lesson 1 is timed by `time_limit_secs`; lesson 2 follows it.
pub fn backend(tokens: Arc<SessionTokens>, time_limit_secs: Option<u32>) -> InMemoryLessonApi {
    let api = InMemoryLessonApi::new(Role::User, tokens);
    api.add_account(EMAIL, PASSWORD, Role::User, learner());
    api.add_topic(topic(1, None, true));
    api.add_lesson(lesson(1, 1, time_limit_secs), questions());
    api.add_lesson(lesson(2, 2, None), questions());
    api.set_answer_key(QuestionId::new(1), json!("B"));
    api.set_answer_key(QuestionId::new(2), json!({"1": "have", "2": "cat"}));
    api.set_answer_key(QuestionId::new(3), json!("hello"));
    api
}

pub async fn signed_in(api: &InMemoryLessonApi, tokens: &Arc<SessionTokens>) -> UserProfile {
    AuthService::new(Arc::clone(tokens))
        .login(api, &Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap()
}

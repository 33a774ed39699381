//! JSON shapes exchanged with the backend and their mapping onto domain types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lesson_core::model::{
    ChoiceOption, GroupedQuestions, Lesson, LessonContent, LessonId, MAX_BLANKS, ProficiencyLevel,
    Question, QuestionGroup, QuestionId, QuestionKind, QuestionResult, Role, SkillModule,
    SubmissionOutcome, Topic, TopicId, UserId, UserProfile,
};

use crate::api::SubmissionEntry;
use crate::error::{ApiError, FieldErrors};

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_true")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// Unwraps `{ success, data }`.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    if !envelope.success {
        if let Some(fields) = envelope.errors.as_ref().and_then(field_errors) {
            return Err(ApiError::Validation(fields));
        }
        return Err(ApiError::Rejected {
            message: envelope.message.unwrap_or_else(|| "request failed".into()),
        });
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Decode("response has no data".into()))
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

/// Maps a non-2xx response onto the error taxonomy.
///
/// A 401 on the login call means wrong credentials; anywhere else it means the
/// role's session is gone.
pub fn classify_failure(status: u16, body: &str, role: Role, is_login: bool) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_message(status).to_string());

    match status {
        401 if is_login => ApiError::LoginRejected { message },
        401 => ApiError::Unauthorized { role },
        403 => ApiError::Forbidden { message },
        400 | 422 => match parsed.errors.as_ref().and_then(field_errors) {
            Some(fields) => ApiError::Validation(fields),
            None => ApiError::Rejected { message },
        },
        _ => ApiError::Server { status, message },
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        401 => "invalid email or password",
        403 => "you do not have permission to do that",
        404 => "not found",
        500..=599 => "the server is unavailable, please try again",
        _ => "request failed",
    }
}

/// Accepts `{ "field": "msg" }`, `{ "field": ["msg", ...] }` or `[{ "field", "message" }]`.
fn field_errors(value: &Value) -> Option<FieldErrors> {
    let mut fields = FieldErrors::new();
    match value {
        Value::Object(map) => {
            for (field, message) in map {
                let text = match message {
                    Value::String(s) => s.clone(),
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; "),
                    other => other.to_string(),
                };
                fields.insert(field.clone(), text);
            }
        }
        Value::Array(items) => {
            for item in items {
                let field = item.get("field").and_then(Value::as_str);
                let message = item
                    .get("message")
                    .or_else(|| item.get("defaultMessage"))
                    .and_then(Value::as_str);
                if let (Some(field), Some(message)) = (field, message) {
                    fields.insert(field, message);
                }
            }
        }
        _ => {}
    }
    if fields.is_empty() { None } else { Some(fields) }
}

/// Learner's own level; an unrecognised value reads as "not set".
fn user_level(raw: Option<&str>) -> Option<ProficiencyLevel> {
    ProficiencyLevel::parse_optional(raw).ok().flatten()
}

/// Gate requirement; an unrecognised value locks at the highest level.
fn required_level(raw: Option<&str>) -> Option<ProficiencyLevel> {
    match ProficiencyLevel::parse_optional(raw) {
        Ok(level) => level,
        Err(err) => {
            tracing::warn!(error = %err, "unrecognised required level, gating at C2");
            Some(ProficiencyLevel::C2)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: u64,
    #[serde(alias = "fullName", alias = "username", default)]
    pub name: String,
    #[serde(alias = "englishLevel", default)]
    pub level: Option<String>,
}

impl UserDto {
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: UserId::new(self.id),
            name: self.name,
            level: user_level(self.level.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDto {
    pub id: u64,
    #[serde(default)]
    pub module: Option<SkillModule>,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "levelRequired", default)]
    pub required_level: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(alias = "createdBy", default)]
    pub owner_id: Option<u64>,
}

impl TopicDto {
    pub fn into_topic(self, fallback_module: SkillModule) -> Topic {
        Topic {
            id: TopicId::new(self.id),
            module: self.module.unwrap_or(fallback_module),
            name: self.name,
            description: self.description,
            required_level: required_level(self.required_level.as_deref()),
            is_active: self.is_active,
            owner_id: self.owner_id.map(UserId::new),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto<T> {
    #[serde(alias = "items")]
    pub content: Vec<T>,
    #[serde(alias = "number", default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(alias = "total", default)]
    pub total_elements: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummaryDto {
    pub id: u64,
    pub topic_id: u64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub order_index: u32,
    #[serde(alias = "levelRequired", default)]
    pub required_level: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(alias = "timeLimit", default)]
    pub time_limit_seconds: Option<u32>,
}

impl LessonSummaryDto {
    pub fn into_lesson(self) -> Lesson {
        Lesson {
            id: LessonId::new(self.id),
            topic_id: TopicId::new(self.topic_id),
            title: self.title,
            order_index: self.order_index,
            required_level: required_level(self.required_level.as_deref()),
            is_active: self.is_active,
            time_limit_secs: self.time_limit_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDto {
    #[serde(alias = "label", alias = "optionKey", default)]
    pub key: Option<String>,
    #[serde(alias = "content", alias = "optionText")]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub id: u64,
    #[serde(rename = "type", alias = "questionType")]
    pub kind: String,
    #[serde(alias = "questionText", default)]
    pub content: String,
    #[serde(default)]
    pub options: Vec<OptionDto>,
    #[serde(default)]
    pub blank_count: Option<u32>,
    #[serde(default)]
    pub left_items: Vec<String>,
    #[serde(default)]
    pub right_items: Vec<String>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub order_index: u32,
}

fn default_points() -> u32 {
    1
}

impl QuestionDto {
    pub fn into_question(self) -> Result<Question, ApiError> {
        let kind: QuestionKind = self
            .kind
            .parse()
            .map_err(|err: lesson_core::model::QuestionKindParseError| {
                ApiError::Decode(err.to_string())
            })?;

        let options = self
            .options
            .into_iter()
            .enumerate()
            .map(|(idx, option)| ChoiceOption {
                key: option.key.unwrap_or_else(|| option_letter(idx)),
                text: option.text,
            })
            .collect();

        let mut question = Question::new(QuestionId::new(self.id), kind, self.content)
            .with_options(options)
            .with_matching(self.left_items, self.right_items)
            .with_order_index(self.order_index);
        match self.blank_count {
            Some(count) if count > MAX_BLANKS => {
                return Err(ApiError::Decode(format!(
                    "question {} declares {count} blanks, limit is {MAX_BLANKS}",
                    self.id
                )));
            }
            Some(count) if count > 0 => question = question.with_blank_count(count),
            _ => {}
        }
        question.points = self.points;
        Ok(question)
    }
}

fn option_letter(idx: usize) -> String {
    u8::try_from(idx)
        .ok()
        .filter(|i| *i < 26)
        .map_or_else(|| (idx + 1).to_string(), |i| char::from(b'A' + i).to_string())
}

fn questions(dtos: Vec<QuestionDto>) -> Result<Vec<Question>, ApiError> {
    dtos.into_iter().map(QuestionDto::into_question).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDto {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(alias = "timeLimit", default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

impl LessonDto {
    pub fn into_content(self) -> Result<LessonContent, ApiError> {
        Ok(LessonContent {
            id: LessonId::new(self.id),
            title: self.title,
            time_limit_secs: self.time_limit_seconds,
            questions: questions(self.questions)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    #[serde(default)]
    pub completed_lesson_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: u64,
    #[serde(alias = "instructions", default)]
    pub instruction: String,
    #[serde(default)]
    pub order_index: u32,
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedDto {
    #[serde(default)]
    pub tasks: Vec<TaskDto>,
    #[serde(default)]
    pub standalone_questions: Vec<QuestionDto>,
}

impl GroupedDto {
    pub fn into_grouped(self) -> Result<GroupedQuestions, ApiError> {
        let tasks = self
            .tasks
            .into_iter()
            .map(|task| {
                Ok(QuestionGroup {
                    id: task.id,
                    instruction: task.instruction,
                    order_index: task.order_index,
                    questions: questions(task.questions)?,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        Ok(GroupedQuestions {
            tasks,
            standalone: questions(self.standalone_questions)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitBody<'a> {
    pub answers: &'a [SubmissionEntry],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDto {
    pub question_id: u64,
    pub is_correct: bool,
    #[serde(alias = "score", default)]
    pub points: f64,
    #[serde(default)]
    pub correct_answer: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultDto {
    pub is_passed: bool,
    #[serde(alias = "score", default)]
    pub score_percentage: f64,
    #[serde(default)]
    pub results: Vec<ResultDto>,
}

impl SubmitResultDto {
    pub fn into_outcome(self) -> SubmissionOutcome {
        SubmissionOutcome {
            is_passed: self.is_passed,
            score_percentage: self.score_percentage,
            results: self
                .results
                .into_iter()
                .map(|r| QuestionResult {
                    question_id: QuestionId::new(r.question_id),
                    is_correct: r.is_correct,
                    points: r.points,
                    correct_answer: r.correct_answer.filter(|v| !v.is_null()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn login_401_is_rejected_credentials_not_expiry() {
        let body = r#"{"success":false,"message":"Bad credentials"}"#;
        match classify_failure(401, body, Role::Teacher, true) {
            ApiError::LoginRejected { message } => assert_eq!(message, "Bad credentials"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify_failure(401, "", Role::Teacher, false),
            ApiError::Unauthorized { role: Role::Teacher }
        ));
    }

    #[test]
    fn validation_errors_are_collected_per_field() {
        let body = r#"{"errors":{"email":"is required","password":["too short","weak"]}}"#;
        let ApiError::Validation(fields) = classify_failure(422, body, Role::User, false) else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("email"), Some("is required"));
        assert_eq!(fields.get("password"), Some("too short; weak"));

        let list = r#"{"errors":[{"field":"title","defaultMessage":"must not be blank"}]}"#;
        let ApiError::Validation(fields) = classify_failure(400, list, Role::User, false) else {
            panic!("expected validation error");
        };
        assert_eq!(fields.get("title"), Some("must not be blank"));
    }

    #[test]
    fn server_errors_keep_status_and_fallback_message() {
        match classify_failure(502, "<html>", Role::User, false) {
            ApiError::Server { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("try again"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn envelope_failure_maps_to_rejected() {
        let err = decode_envelope::<LessonDto>(r#"{"success":false,"message":"Lesson locked"}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message } if message == "Lesson locked"));
    }

    #[test]
    fn lesson_payload_maps_to_content() {
        let body = json!({
            "success": true,
            "data": {
                "id": 12,
                "title": "Past simple",
                "timeLimitSeconds": 300,
                "questions": [
                    {"id": 1, "type": "MULTIPLE_CHOICE", "content": "Pick", "options": [{"text": "go"}, {"text": "went"}]},
                    {"id": 2, "type": "FILL_BLANK", "questionText": "I ___ home and ___ dinner"},
                    {"id": 3, "type": "MATCHING", "content": "Match", "leftItems": ["dog"], "rightItems": ["woof"], "points": 2}
                ]
            }
        })
        .to_string();

        let content = decode_envelope::<LessonDto>(&body)
            .unwrap()
            .into_content()
            .unwrap();
        assert_eq!(content.id, LessonId::new(12));
        assert_eq!(content.time_limit_secs, Some(300));
        assert_eq!(content.questions[0].options[1].key, "B");
        assert_eq!(content.questions[1].blank_count, 2);
        assert_eq!(content.questions[2].points, 2);
    }

    #[test]
    fn oversized_blank_count_is_a_decode_error() {
        let dto: QuestionDto = serde_json::from_value(json!({
            "id": 9, "type": "FILL_BLANK", "content": "I ___ home", "blankCount": 4_000_000_000_u32
        }))
        .unwrap();
        assert!(matches!(dto.into_question(), Err(ApiError::Decode(msg)) if msg.contains("question 9")));

        let dto: QuestionDto = serde_json::from_value(json!({
            "id": 10, "type": "FILL_BLANK", "content": "I ___ home", "blankCount": 3
        }))
        .unwrap();
        assert_eq!(dto.into_question().unwrap().blank_count, 3);
    }

    #[test]
    fn unknown_question_type_is_a_decode_error() {
        let dto: QuestionDto =
            serde_json::from_value(json!({"id": 1, "type": "DRAG_AND_DROP"})).unwrap();
        assert!(matches!(dto.into_question(), Err(ApiError::Decode(_))));
    }

    #[test]
    fn submit_result_maps_and_drops_null_answers() {
        let dto: SubmitResultDto = serde_json::from_value(json!({
            "isPassed": true,
            "scorePercentage": 66.7,
            "results": [
                {"questionId": 1, "isCorrect": true, "points": 1, "correctAnswer": "B"},
                {"questionId": 2, "isCorrect": false, "points": 0, "correctAnswer": null}
            ]
        }))
        .unwrap();
        let outcome = dto.into_outcome();
        assert_eq!(outcome.correct_count(), 1);
        assert_eq!(outcome.results[1].correct_answer, None);
    }

    #[test]
    fn blank_level_string_means_no_requirement() {
        let dto: TopicDto = serde_json::from_value(json!({
            "id": 4, "name": "Travel", "requiredLevel": "", "isActive": true
        }))
        .unwrap();
        let topic = dto.into_topic(SkillModule::Listening);
        assert_eq!(topic.required_level, None);
        assert_eq!(topic.module, SkillModule::Listening);
    }

    #[test]
    fn unrecognised_required_level_locks_instead_of_opening() {
        let topic: TopicDto = serde_json::from_value(json!({
            "id": 5, "name": "Idioms", "requiredLevel": "C2+", "isActive": true
        }))
        .unwrap();
        let topic = topic.into_topic(SkillModule::Grammar);
        assert_eq!(topic.required_level, Some(ProficiencyLevel::C2));
        assert!(!ProficiencyLevel::satisfies(Some(ProficiencyLevel::B2), topic.required_level));

        let lesson: LessonSummaryDto = serde_json::from_value(json!({
            "id": 8, "topicId": 5, "title": "Phrasal verbs", "levelRequired": "advanced"
        }))
        .unwrap();
        assert_eq!(lesson.into_lesson().required_level, Some(ProficiencyLevel::C2));

        let user: UserDto =
            serde_json::from_value(json!({"id": 1, "name": "Ann", "level": "native"})).unwrap();
        assert_eq!(user.into_profile().level, None);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use lesson_core::model::{
    GroupedQuestions, Lesson, LessonContent, LessonId, Page, PageRequest, Role, SkillModule,
    SubmissionOutcome, Topic, TopicId, UserProfile,
};

use super::wire::{
    self, GroupedDto, LessonDto, LessonSummaryDto, LoginData, LoginRequest, PageDto, ProgressDto,
    SubmitBody, SubmitResultDto, TopicDto, UserDto,
};
use super::{Credentials, LessonApi, LoginGrant, Submission};
use crate::auth::SessionTokens;
use crate::config::ApiConfig;
use crate::error::ApiError;

/// `reqwest`-backed client acting under one explicit role.
#[derive(Clone)]
pub struct HttpLessonApi {
    client: Client,
    config: ApiConfig,
    role: Role,
    tokens: Arc<SessionTokens>,
}

impl HttpLessonApi {
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, role: Role, tokens: Arc<SessionTokens>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            role,
            tokens,
        })
    }

    /// Same connection pool and token provider, acting under another role.
    #[must_use]
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self
            .tokens
            .token(self.role)
            .ok_or(ApiError::MissingToken { role: self.role })?;
        Ok(builder.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        is_login: bool,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), role = %self.role, "api response");

        if !status.is_success() {
            return Err(wire::classify_failure(
                status.as_u16(),
                &body,
                self.role,
                is_login,
            ));
        }
        wire::decode_envelope(&body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.authorized(self.client.get(self.config.url(path)))?;
        self.send(builder, false).await
    }
}

#[async_trait]
impl LessonApi for HttpLessonApi {
    fn role(&self) -> Role {
        self.role
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, ApiError> {
        let url = self
            .config
            .url(&format!("auth/{}/login", self.role.segment()));
        let builder = self.client.post(url).json(&LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        });
        let data: LoginData = self.send(builder, true).await?;
        info!(role = %self.role, "login accepted");
        Ok(LoginGrant {
            token: data.token,
            user: data.user.into_profile(),
        })
    }

    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let dto: UserDto = self.get("users/me").await?;
        Ok(dto.into_profile())
    }

    async fn list_topics(
        &self,
        module: SkillModule,
        page: PageRequest,
    ) -> Result<Page<Topic>, ApiError> {
        let url = self.config.url("topics");
        let builder = self.authorized(self.client.get(url).query(&[
            ("module", module.segment().to_string()),
            ("page", page.zero_based().to_string()),
            ("size", page.size().to_string()),
        ]))?;
        let dto: PageDto<TopicDto> = self.send(builder, false).await?;
        let size = if dto.size == 0 { page.size() } else { dto.size };
        Ok(Page::from_zero_based(dto.content, dto.page, size, dto.total_elements)
            .map(|topic| topic.into_topic(module)))
    }

    async fn get_topic(&self, topic_id: TopicId) -> Result<Topic, ApiError> {
        let dto: TopicDto = self.get(&format!("topics/{topic_id}")).await?;
        Ok(dto.into_topic(SkillModule::Grammar))
    }

    async fn list_lessons(&self, topic_id: TopicId) -> Result<Vec<Lesson>, ApiError> {
        let dtos: Vec<LessonSummaryDto> = self.get(&format!("topics/{topic_id}/lessons")).await?;
        Ok(dtos.into_iter().map(LessonSummaryDto::into_lesson).collect())
    }

    async fn completed_lessons(&self, topic_id: TopicId) -> Result<Vec<LessonId>, ApiError> {
        let dto: ProgressDto = self.get(&format!("topics/{topic_id}/progress")).await?;
        Ok(dto
            .completed_lesson_ids
            .into_iter()
            .map(LessonId::new)
            .collect())
    }

    async fn get_lesson(&self, lesson_id: LessonId) -> Result<LessonContent, ApiError> {
        let dto: LessonDto = self.get(&format!("lessons/{lesson_id}")).await?;
        dto.into_content()
    }

    async fn grouped_questions(&self, lesson_id: LessonId) -> Result<GroupedQuestions, ApiError> {
        let dto: GroupedDto = self
            .get(&format!("lessons/{lesson_id}/grouped-questions"))
            .await?;
        dto.into_grouped()
    }

    async fn submit_lesson(&self, submission: &Submission) -> Result<SubmissionOutcome, ApiError> {
        let url = self
            .config
            .url(&format!("lessons/{}/submit", submission.lesson_id));
        let builder = self.authorized(self.client.post(url).json(&SubmitBody {
            answers: &submission.entries,
        }))?;
        let dto: SubmitResultDto = self.send(builder, false).await?;
        Ok(dto.into_outcome())
    }
}

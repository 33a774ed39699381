use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use lesson_core::model::{LessonId, Role, TopicId, UserProfile};
use storage::repository::Storage;

use crate::Clock;
use crate::api::{HttpLessonApi, InMemoryLessonApi, LessonApi};
use crate::attempt::{AttemptEvent, LessonAttempt};
use crate::auth::{AuthService, RouteGuard, SessionTokens};
use crate::catalog::CatalogService;
use crate::config::ApiConfig;
use crate::error::{AppServicesError, AttemptError};

/// Assembles app-facing services for one role.
#[derive(Clone)]
pub struct AppServices {
    role: Role,
    clock: Clock,
    api: Arc<dyn LessonApi>,
    auth: Arc<AuthService>,
    guard: RouteGuard,
    catalog: CatalogService,
}

impl AppServices {
    /// Build services that talk to the HTTP backend, with tokens persisted in `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or HTTP client setup fails.
    pub async fn new_http(
        config: ApiConfig,
        db_url: &str,
        role: Role,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let tokens = Arc::new(SessionTokens::load(Arc::clone(&storage.tokens), clock).await?);
        info!(base_url = %config.base_url, %role, "using http backend");
        let api: Arc<dyn LessonApi> =
            Arc::new(HttpLessonApi::new(config, role, Arc::clone(&tokens))?);
        Ok(Self::from_parts(role, clock, api, tokens))
    }

    /// Build services over the seeded in-memory backend; nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the in-memory token store cannot be read.
    pub async fn new_offline(role: Role, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::in_memory();
        let tokens = Arc::new(SessionTokens::load(Arc::clone(&storage.tokens), clock).await?);
        info!(%role, "using offline backend");
        let api: Arc<dyn LessonApi> =
            Arc::new(InMemoryLessonApi::demo(role, Arc::clone(&tokens)));
        Ok(Self::from_parts(role, clock, api, tokens))
    }

    /// Wire services around an existing API client and token provider.
    #[must_use]
    pub fn from_parts(
        role: Role,
        clock: Clock,
        api: Arc<dyn LessonApi>,
        tokens: Arc<SessionTokens>,
    ) -> Self {
        Self {
            role,
            clock,
            auth: Arc::new(AuthService::new(Arc::clone(&tokens))),
            guard: RouteGuard::new(tokens),
            catalog: CatalogService::new(Arc::clone(&api)),
            api,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn LessonApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    /// Start an attempt at a lesson of `topic_id` under this role.
    ///
    /// Learners are held to the catalog's access rules; the lesson's module is the topic's.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Catalog` if the lesson is locked or not in the topic, and
    /// other `AttemptError`s if it cannot be loaded.
    pub async fn open_attempt(
        &self,
        topic_id: TopicId,
        lesson_id: LessonId,
        viewer: &UserProfile,
    ) -> Result<(LessonAttempt, UnboundedReceiver<AttemptEvent>), AttemptError> {
        let topic = self
            .catalog
            .authorize_lesson(topic_id, lesson_id, viewer)
            .await?;
        LessonAttempt::open(self.api(), lesson_id, topic.module, self.clock).await
    }
}

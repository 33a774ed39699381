#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod attempt;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod player;
pub mod timer;

pub use lesson_core::Clock;

pub use api::{
    Credentials, HttpLessonApi, InMemoryLessonApi, LessonApi, LoginGrant, Submission,
    SubmissionEntry,
};
pub use app_services::AppServices;
pub use attempt::{AttemptEvent, LessonAttempt};
pub use auth::{AuthService, FailureAction, GuardOutcome, RouteGuard, SessionTokens};
pub use catalog::{CatalogService, LessonAccess, TopicOverview};
pub use config::ApiConfig;
pub use error::{
    ApiError, AppServicesError, AttemptError, AuthError, CatalogError, FieldErrors, PlayerError,
};
pub use player::{AttemptState, LessonPlayer, ReviewItem, SubmitPrompt, SubmitTrigger};
pub use timer::SessionTimer;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use lesson_core::model::{
    Lesson, LessonId, Page, PageRequest, Role, SkillModule, Topic, TopicId, UserProfile,
    ordered_lessons, visible_topics,
};
use lesson_core::{AccessDecision, AccessReason, evaluate_for_role};

use crate::api::LessonApi;
use crate::error::CatalogError;

/// A lesson row with its access decision for the current viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonAccess {
    pub lesson: Lesson,
    pub decision: AccessDecision,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicOverview {
    pub topic: Topic,
    /// In display order.
    pub lessons: Vec<LessonAccess>,
}

/// Topic and lesson listings, filtered and gated for the API's role.
#[derive(Clone)]
pub struct CatalogService {
    api: Arc<dyn LessonApi>,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: Arc<dyn LessonApi>) -> Self {
        Self { api }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.api.role()
    }

    /// One page of a module's topics that `viewer` may see.
    ///
    /// `page` is 1-based. Paging metadata is the backend's; hidden topics are removed
    /// from `items` only.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for an invalid page request or API failure.
    pub async fn topics(
        &self,
        module: SkillModule,
        page: u32,
        size: u32,
        viewer: &UserProfile,
    ) -> Result<Page<Topic>, CatalogError> {
        let request = PageRequest::new(page, size)?;
        let mut listing = self.api.list_topics(module, request).await?;
        let before = listing.items.len();
        listing.items = visible_topics(listing.items, self.role(), Some(viewer.id));
        if listing.items.len() != before {
            debug!(hidden = before - listing.items.len(), "topics hidden from viewer");
        }
        Ok(listing)
    }

    /// The topic with every lesson and whether `viewer` may open it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` if any listing call fails.
    pub async fn topic_overview(
        &self,
        topic_id: TopicId,
        viewer: &UserProfile,
    ) -> Result<TopicOverview, CatalogError> {
        let role = self.role();
        let topic = self.api.get_topic(topic_id).await?;
        let lessons = self.api.list_lessons(topic_id).await?;
        let completed: HashSet<LessonId> = if role == Role::User {
            self.api
                .completed_lessons(topic_id)
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        let rows = ordered_lessons(&lessons)
            .into_iter()
            .map(|lesson| LessonAccess {
                lesson: lesson.clone(),
                decision: evaluate_for_role(
                    role,
                    lesson,
                    &topic,
                    viewer.level,
                    &lessons,
                    |id| completed.contains(&id),
                ),
                completed: completed.contains(&lesson.id),
            })
            .collect();

        Ok(TopicOverview {
            topic,
            lessons: rows,
        })
    }

    /// Access decision for a single lesson of a topic.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::LessonNotInTopic` if the topic has no such lesson.
    pub async fn check_lesson(
        &self,
        topic_id: TopicId,
        lesson_id: LessonId,
        viewer: &UserProfile,
    ) -> Result<LessonAccess, CatalogError> {
        self.topic_overview(topic_id, viewer)
            .await?
            .lessons
            .into_iter()
            .find(|row| row.lesson.id == lesson_id)
            .ok_or(CatalogError::LessonNotInTopic(lesson_id))
    }

    /// Refuse unless `viewer` may open the lesson; returns its topic on success.
    ///
    /// A topic hidden from the viewer locks all of its lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Locked` with the failing decision, or
    /// `CatalogError::LessonNotInTopic` if the topic has no such lesson.
    pub async fn authorize_lesson(
        &self,
        topic_id: TopicId,
        lesson_id: LessonId,
        viewer: &UserProfile,
    ) -> Result<Topic, CatalogError> {
        let overview = self.topic_overview(topic_id, viewer).await?;
        let row = overview
            .lessons
            .iter()
            .find(|row| row.lesson.id == lesson_id)
            .ok_or(CatalogError::LessonNotInTopic(lesson_id))?;

        let decision = if overview.topic.is_visible_to(self.role(), Some(viewer.id)) {
            row.decision
        } else {
            AccessDecision::denied(AccessReason::Inactive)
        };
        if !decision.accessible {
            debug!(%lesson_id, reason = ?decision.reason, "lesson locked for viewer");
            return Err(CatalogError::Locked(decision));
        }
        Ok(overview.topic)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::{TopicId, UserId};
use crate::model::level::ProficiencyLevel;
use crate::model::role::Role;

/// Skill area a topic belongs to. All three share one lesson player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkillModule {
    Grammar,
    Reading,
    Listening,
}

impl SkillModule {
    pub const ALL: [SkillModule; 3] = [
        SkillModule::Grammar,
        SkillModule::Reading,
        SkillModule::Listening,
    ];

    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            SkillModule::Grammar => "grammar",
            SkillModule::Reading => "reading",
            SkillModule::Listening => "listening",
        }
    }
}

impl fmt::Display for SkillModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// A named group of lessons inside one skill module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub module: SkillModule,
    pub name: String,
    pub description: Option<String>,
    pub required_level: Option<ProficiencyLevel>,
    pub is_active: bool,
    /// Teacher who authored the topic, if any.
    pub owner_id: Option<UserId>,
}

impl Topic {
    /// Whether `role` (acting as `viewer`) may see this topic in listings.
    ///
    /// Admins see everything, teachers see active topics plus their own drafts,
    /// learners see active topics only.
    #[must_use]
    pub fn is_visible_to(&self, role: Role, viewer: Option<UserId>) -> bool {
        match role {
            Role::Admin => true,
            Role::Teacher => self.is_active || (viewer.is_some() && self.owner_id == viewer),
            Role::User => self.is_active,
        }
    }
}

/// Keeps only the topics `role` may see, preserving order.
#[must_use]
pub fn visible_topics(topics: Vec<Topic>, role: Role, viewer: Option<UserId>) -> Vec<Topic> {
    topics
        .into_iter()
        .filter(|topic| topic.is_visible_to(role, viewer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: u64, active: bool, owner: Option<u64>) -> Topic {
        Topic {
            id: TopicId::new(id),
            module: SkillModule::Grammar,
            name: format!("Topic {id}"),
            description: None,
            required_level: None,
            is_active: active,
            owner_id: owner.map(UserId::new),
        }
    }

    #[test]
    fn visibility_differs_by_role() {
        let topics = vec![topic(1, true, None), topic(2, false, Some(9)), topic(3, false, Some(4))];

        let admin = visible_topics(topics.clone(), Role::Admin, None);
        assert_eq!(admin.len(), 3);

        let teacher = visible_topics(topics.clone(), Role::Teacher, Some(UserId::new(9)));
        let ids: Vec<_> = teacher.iter().map(|t| t.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);

        let learner = visible_topics(topics, Role::User, Some(UserId::new(9)));
        assert_eq!(learner.len(), 1);
    }

    #[test]
    fn teacher_without_identity_sees_only_active() {
        let draft = topic(2, false, None);
        assert!(!draft.is_visible_to(Role::Teacher, None));
    }
}

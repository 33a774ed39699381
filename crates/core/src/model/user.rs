use crate::model::ids::UserId;
use crate::model::level::ProficiencyLevel;

/// The signed-in account as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub level: Option<ProficiencyLevel>,
}

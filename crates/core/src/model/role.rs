use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {raw:?}")]
pub struct RoleParseError {
    raw: String,
}

/// Who is acting. Each role holds its own independently stored session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::User];

    /// Route segment that scopes this role's pages and auth endpoints.
    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::User => "user",
        }
    }

    #[must_use]
    pub fn login_path(self) -> String {
        format!("/{}/login", self.segment())
    }

    /// Safe landing route after an authorization failure.
    #[must_use]
    pub fn home_path(self) -> String {
        format!("/{}/dashboard", self.segment())
    }

    /// Staff roles preview content without level or sequential gating.
    #[must_use]
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "user" | "learner" | "student" => Ok(Role::User),
            _ => Err(RoleParseError { raw: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_scoped_by_segment() {
        assert_eq!(Role::Teacher.login_path(), "/teacher/login");
        assert_eq!(Role::Admin.home_path(), "/admin/dashboard");
        assert_eq!(Role::User.login_path(), "/user/login");
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("Student".parse::<Role>().unwrap(), Role::User);
        assert!("guest".parse::<Role>().is_err());
    }
}

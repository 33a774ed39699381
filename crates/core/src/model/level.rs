use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown proficiency level: {raw:?}")]
pub struct LevelParseError {
    raw: String,
}

/// CEFR-style proficiency level. Variants are declared in ascending order,
/// so the derived `Ord` is the gating order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl ProficiencyLevel {
    pub const ALL: [ProficiencyLevel; 6] = [
        ProficiencyLevel::A1,
        ProficiencyLevel::A2,
        ProficiencyLevel::B1,
        ProficiencyLevel::B2,
        ProficiencyLevel::C1,
        ProficiencyLevel::C2,
    ];

    /// Zero-based position in the A1..C2 ordering.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            ProficiencyLevel::A1 => 0,
            ProficiencyLevel::A2 => 1,
            ProficiencyLevel::B1 => 2,
            ProficiencyLevel::B2 => 3,
            ProficiencyLevel::C1 => 4,
            ProficiencyLevel::C2 => 5,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProficiencyLevel::A1 => "A1",
            ProficiencyLevel::A2 => "A2",
            ProficiencyLevel::B1 => "B1",
            ProficiencyLevel::B2 => "B2",
            ProficiencyLevel::C1 => "C1",
            ProficiencyLevel::C2 => "C2",
        }
    }

    /// Whether a learner at `user` meets `required`.
    ///
    /// An empty requirement is always met. A learner without a recorded level
    /// fails every non-empty requirement.
    #[must_use]
    pub fn satisfies(user: Option<Self>, required: Option<Self>) -> bool {
        match (user, required) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(user), Some(required)) => user >= required,
        }
    }

    /// Lenient parse for optional wire fields: blank strings mean "no level".
    ///
    /// # Errors
    ///
    /// Returns `LevelParseError` for non-blank strings that are not A1..C2.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, LevelParseError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some),
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| LevelParseError { raw: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_matches_index_ordering_for_every_pair() {
        for user in ProficiencyLevel::ALL {
            for required in ProficiencyLevel::ALL {
                assert_eq!(
                    ProficiencyLevel::satisfies(Some(user), Some(required)),
                    user.index() >= required.index(),
                    "user {user} required {required}"
                );
            }
        }
    }

    #[test]
    fn missing_user_level_only_passes_empty_requirement() {
        assert!(ProficiencyLevel::satisfies(None, None));
        for required in ProficiencyLevel::ALL {
            assert!(!ProficiencyLevel::satisfies(None, Some(required)));
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" b2 ".parse::<ProficiencyLevel>().unwrap(), ProficiencyLevel::B2);
        assert!("D1".parse::<ProficiencyLevel>().is_err());
    }

    #[test]
    fn blank_optional_level_is_none() {
        assert_eq!(ProficiencyLevel::parse_optional(Some("  ")).unwrap(), None);
        assert_eq!(
            ProficiencyLevel::parse_optional(Some("c1")).unwrap(),
            Some(ProficiencyLevel::C1)
        );
    }
}

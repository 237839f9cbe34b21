//! Tri-state flags and the not-applicable sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text used for values that were never computed.
pub const NOT_APPLICABLE: &str = "Not applicable";

/// A boolean outcome that may not have been evaluated.
///
/// Serialised as `"True"`, `"False"` or [`NOT_APPLICABLE`] so the column stays
/// textual even when every sample was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriState {
    True,
    False,
    #[default]
    #[serde(rename = "Not applicable")]
    NotApplicable,
}

impl TriState {
    /// The literal text written to tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }

    /// Whether the flag was evaluated.
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }

    /// Whether the flag is set.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Parse leniently: anything other than `True`/`False` is not applicable.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::NotApplicable)
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(Self::from).unwrap_or(Self::NotApplicable)
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "True" => Ok(Self::True),
            "False" => Ok(Self::False),
            NOT_APPLICABLE => Ok(Self::NotApplicable),
            other => Err(format!("'{}' is not a tri-state value", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_forms() {
        assert_eq!(TriState::True.to_string(), "True");
        assert_eq!(TriState::False.to_string(), "False");
        assert_eq!(TriState::NotApplicable.to_string(), "Not applicable");
        assert_eq!("Not applicable".parse::<TriState>(), Ok(TriState::NotApplicable));
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(TriState::parse_lenient("True"), TriState::True);
        assert_eq!(TriState::parse_lenient("NA"), TriState::NotApplicable);
        assert_eq!(TriState::parse_lenient("true"), TriState::NotApplicable);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(TriState::from(Some(false)), TriState::False);
        assert_eq!(TriState::from(None::<bool>), TriState::NotApplicable);
        assert!(!TriState::NotApplicable.is_applicable());
    }
}

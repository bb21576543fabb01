//! Group name matching for bulk pause, resume and enumeration.

/// Selects groups by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMatcher {
    Equals(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Anything,
}

impl GroupMatcher {
    pub fn equals(group: impl Into<String>) -> Self {
        Self::Equals(group.into())
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::StartsWith(prefix.into())
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self::EndsWith(suffix.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::Contains(fragment.into())
    }

    pub fn is_match(&self, group: &str) -> bool {
        match self {
            Self::Equals(v) => group == v,
            Self::StartsWith(v) => group.starts_with(v.as_str()),
            Self::EndsWith(v) => group.ends_with(v.as_str()),
            Self::Contains(v) => group.contains(v.as_str()),
            Self::Anything => true,
        }
    }

    /// The exact group name when this matcher can only select one group.
    pub fn exact(&self) -> Option<&str> {
        match self {
            Self::Equals(v) => Some(v),
            _ => None,
        }
    }
}

//! Shared value types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Literal that means "deliver regardless of the receiver's origin".
pub const ANY_ORIGIN: &str = "*";

/// Delivery constraint attached to every post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TargetOrigin {
    /// Deliver to any receiver (`"*"`)
    #[default]
    Any,
    /// Deliver only if the receiver's origin matches exactly
    Exact(String),
}

impl TargetOrigin {
    pub fn parse(s: &str) -> Self {
        if s == ANY_ORIGIN {
            TargetOrigin::Any
        } else {
            TargetOrigin::Exact(s.to_string())
        }
    }

    /// Whether a receiver with `origin` may see the message.
    pub fn admits(&self, origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => expected == origin,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Any => ANY_ORIGIN,
            TargetOrigin::Exact(origin) => origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TargetOrigin {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for TargetOrigin {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl Serialize for TargetOrigin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TargetOrigin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_admits_everything() {
        let origin = TargetOrigin::parse("*");
        assert_eq!(origin, TargetOrigin::Any);
        assert!(origin.admits("http://localhost:8080"));
        assert!(origin.admits(""));
    }

    #[test]
    fn test_exact_origin() {
        let origin = TargetOrigin::from("http://localhost:8080");
        assert!(origin.admits("http://localhost:8080"));
        assert!(!origin.admits("http://localhost:8081"));
        assert_eq!(origin.to_string(), "http://localhost:8080");
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let json = serde_json::to_string(&TargetOrigin::Any).unwrap();
        assert_eq!(json, "\"*\"");
        let parsed: TargetOrigin = serde_json::from_str("\"https://a.example\"").unwrap();
        assert_eq!(parsed, TargetOrigin::Exact("https://a.example".into()));
    }
}

//! Service identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a service in the dependency graph.
///
/// A lowercased, hyphenated short name (e.g. `user-management-service`).
/// Identity is by string equality; full canonicalization (aliases, suffix
/// rules) happens in the normalizer. Implements `Ord` for deterministic
/// map ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a service name, trimming and lowercasing the input.
    ///
    /// Interior whitespace and underscores become hyphens so that
    /// `User Service` and `user_service` compare equal to `user-service`.
    pub fn new(name: impl AsRef<str>) -> Self {
        let cleaned: String = name
            .as_ref()
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
            .collect();
        Self(cleaned)
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty after cleaning.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive a fallback name from an IPv4 address (`10.0.0.1` -> `service-10-0-0-1`).
    pub fn from_ip(ip: &str) -> Self {
        Self(format!("service-{}", ip.replace('.', "-")))
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaning() {
        assert_eq!(ServiceName::new("  User Service ").as_str(), "user-service");
        assert_eq!(ServiceName::new("auth_service").as_str(), "auth-service");
        assert_eq!(ServiceName::new("Web-Portal").as_str(), "web-portal");
    }

    #[test]
    fn test_identity_after_cleaning() {
        assert_eq!(ServiceName::new("User_Service"), ServiceName::new("user-service"));
    }

    #[test]
    fn test_from_ip() {
        assert_eq!(ServiceName::from_ip("192.168.1.100").as_str(), "service-192-168-1-100");
    }

    #[test]
    fn test_ordering() {
        assert!(ServiceName::new("alpha") < ServiceName::new("beta"));
    }
}

//! Targets: the contactable entities a campaign processes

use serde::{Deserialize, Serialize};

/// Identifier for a single target within a campaign.
///
/// Target ids are supplied by the `TargetSource` and must be stable
/// across runs: deduplication keys on them, so a source that mints a
/// fresh id for the same business on every load breaks resume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One contactable entity.
///
/// Targets are created by the `TargetSource` at load time and are
/// immutable thereafter; the dispatcher only ever mutates its own
/// tracking records, never target data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Stable identifier, unique within the source.
    pub id: TargetId,

    /// Priority score derived from target attributes (estimated value,
    /// segment, ...). Higher scores are offered to workers first.
    pub priority_score: i64,

    /// Opaque contact address: an email address, a form URL, whatever
    /// the configured transport understands.
    pub contact_address: String,

    /// Arbitrary attributes consumed by the content generator.
    #[serde(default)]
    pub attributes: ahash::AHashMap<String, String>,
}

impl Target {
    /// Create a target with no attributes.
    #[must_use]
    pub fn new(id: impl Into<TargetId>, priority_score: i64, contact_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority_score,
            contact_address: contact_address.into(),
            attributes: ahash::AHashMap::new(),
        }
    }

    /// Builder-style attribute insertion, mostly for tests and fixtures.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_display_roundtrip() {
        let id = TargetId::new("biz-0042");
        assert_eq!(id.to_string(), "biz-0042");
        assert_eq!(id.as_str(), "biz-0042");
        assert_eq!(TargetId::from("biz-0042"), id);
    }

    #[test]
    fn test_target_builder() {
        let target = Target::new("biz-1", 80, "owner@example.com")
            .with_attribute("name", "Example Bakery")
            .with_attribute("segment", "food");

        assert_eq!(target.id, TargetId::new("biz-1"));
        assert_eq!(target.priority_score, 80);
        assert_eq!(target.attributes.get("segment").map(String::as_str), Some("food"));
    }
}

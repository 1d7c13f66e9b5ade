use serde::{Deserialize, Serialize};

/// Labels that describe co-occurrence rather than a specific association.
const GENERIC_LABELS: &[&str] = &[
    "",
    "mentioned_together",
    "mentioned_with",
    "mentioned",
    "referenced",
    "related",
    "related_to",
    "associated_with",
    "co_occurs_with",
    "linked_to",
    "unknown",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "A_TO_B")]
    AToB,
    #[serde(rename = "B_TO_A")]
    BToA,
    #[serde(rename = "BIDIRECTIONAL")]
    Bidirectional,
}

impl Direction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AToB => "A_TO_B",
            Self::BToA => "B_TO_A",
            Self::Bidirectional => "BIDIRECTIONAL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A_TO_B" => Ok(Self::AToB),
            "B_TO_A" => Ok(Self::BToA),
            "BIDIRECTIONAL" => Ok(Self::Bidirectional),
            _ => Err(crate::Error::InvalidDirection(s.to_string())),
        }
    }
}

/// Association between two named entities.
///
/// `source` may be omitted when the relationship hangs off the single subject
/// of a structured profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub target: String,
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Relationship {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
            relationship: relationship.into(),
            direction: None,
            confidence: None,
            evidence: None,
        }
    }

    #[must_use]
    pub fn anchored(target: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self {
            source: None,
            ..Self::new(String::new(), target, relationship)
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    #[must_use]
    pub fn evidence_len(&self) -> usize {
        crate::entity::evidence_len(self.evidence.as_deref())
    }

    #[must_use]
    pub fn canonical_label(&self) -> String {
        canonical_label(&self.relationship)
    }

    /// True when the label names a specific association type.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        !GENERIC_LABELS.contains(&self.canonical_label().as_str())
    }
}

/// Lowercase, trimmed, with runs of spaces and hyphens folded to `_`.
#[must_use]
pub fn canonical_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;

    for ch in label.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_label() {
        assert_eq!(canonical_label("Works At"), "works_at");
        assert_eq!(canonical_label("works-at"), "works_at");
        assert_eq!(canonical_label("  works__at "), "works_at");
        assert_eq!(canonical_label("FRIEND_OF"), "friend_of");
    }

    #[test]
    fn test_generic_labels_are_not_explicit() {
        assert!(!Relationship::new("A", "B", "Mentioned Together").is_explicit());
        assert!(!Relationship::new("A", "B", "referenced").is_explicit());
        assert!(!Relationship::new("A", "B", "").is_explicit());
        assert!(Relationship::new("A", "B", "works_at").is_explicit());
    }

    #[test]
    fn test_direction_serialization() {
        let rel = Relationship::anchored("Bob", "friend_of").with_direction(Direction::Bidirectional);
        let json = serde_json::to_value(&rel).unwrap();

        assert_eq!(json["direction"], "BIDIRECTIONAL");
        assert!(json.get("source").is_none());
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("B_TO_A".parse::<Direction>().unwrap(), Direction::BToA);
        assert!("sideways".parse::<Direction>().is_err());
    }
}

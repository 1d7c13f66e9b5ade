use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Category of an extracted entity.
///
/// Extraction may emit provisional categories outside the closed vocabulary;
/// those survive as [`EntityType::Other`] so nothing is silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Person,
    Org,
    Place,
    Event,
    Concept,
    Other(String),
}

impl EntityType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Place => "PLACE",
            Self::Event => "EVENT",
            Self::Concept => "CONCEPT",
            Self::Other(label) => label,
        }
    }

    /// Lenient mapping used by every parser. Blank labels become `CONCEPT`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "concept" | "topic" | "thing" => Self::Concept,
            "person" | "people" | "individual" | "human" => Self::Person,
            "org" | "organization" | "organisation" | "company" | "business" | "institution" => {
                Self::Org
            }
            "place" | "location" | "city" | "country" | "address" => Self::Place,
            "event" | "meeting" | "conference" => Self::Event,
            _ => Self::Other(trimmed.to_uppercase()),
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(crate::Error::InvalidEntityType(s.to_string()));
        }
        Ok(Self::from_label(s))
    }
}

impl From<String> for EntityType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// A candidate real-world referent produced by extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "confidence_from_number"
    )]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Numbers keep their source text in this crate's JSON, which buffered
/// inputs such as `#[serde(flatten)]` hand over as a map. Going through
/// `Value` reads either form.
fn confidence_from_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(serde_json::Value::as_f64))
}

impl Entity {
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            attributes: BTreeMap::new(),
            confidence: None,
            evidence: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
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
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attributes whose value is not blank.
    #[must_use]
    pub fn populated_attribute_count(&self) -> usize {
        self.attributes
            .values()
            .filter(|v| !v.trim().is_empty())
            .count()
    }

    /// Length of the trimmed evidence in characters, 0 when absent.
    #[must_use]
    pub fn evidence_len(&self) -> usize {
        evidence_len(self.evidence.as_deref())
    }
}

pub(crate) fn evidence_len(evidence: Option<&str>) -> usize {
    evidence.map_or(0, |e| e.trim().chars().count())
}

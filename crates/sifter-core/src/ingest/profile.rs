//! Shapes of already-structured profile exports.
//!
//! Two layouts exist in the wild. The flat one keeps `name`, `attributes`
//! and `relationships` at the top level. The nested one moves identity under
//! `entity` and stores attributes as a list of `{key, value, confidence}`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use super::response::confidence_value;
use crate::entity::{Entity, EntityType};
use crate::relationship::{Direction, Relationship};

/// Confidence given to every directly imported entity and relationship.
pub const DIRECT_IMPORT_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile has no usable name")]
    MissingName,
}

pub type ProfileResult<T> = Result<T, ProfileError>;

#[derive(Debug, Clone)]
pub enum ProfileDocument {
    Flat(FlatProfile),
    Nested(NestedProfile),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "attributes_or_none")]
    pub attributes: Option<ProfileAttributes>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub relationships: Vec<ProfileRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedProfile {
    pub entity: NestedEntity,
    #[serde(default, deserialize_with = "attributes_or_none")]
    pub attributes: Option<ProfileAttributes>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub relationships: Vec<ProfileRelationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedEntity {
    #[serde(default)]
    pub name: Option<ProfileName>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileName {
    Plain(String),
    Parts {
        #[serde(default)]
        full: Option<String>,
        #[serde(default)]
        preferred: Option<String>,
    },
}

impl ProfileName {
    /// `preferred` beats `full`; blanks count as missing.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::Plain(name) => non_blank(Some(name)),
            Self::Parts { full, preferred } => {
                non_blank(preferred.as_ref()).or_else(|| non_blank(full.as_ref()))
            }
        }
    }
}

/// Attributes as a plain object or as a list of keyed entries.
#[derive(Debug, Clone)]
pub enum ProfileAttributes {
    Map(Map<String, Value>),
    List(Vec<ProfileAttribute>),
}

impl ProfileAttributes {
    /// `None` for null and for shapes that are neither an object nor a list.
    /// List entries that do not parse are skipped.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::Map(map)),
            Value::Array(items) => Some(Self::List(parse_items(items, "attribute"))),
            Value::Null => None,
            other => {
                tracing::warn!(kind = json_kind(&other), "ignoring profile attributes of unexpected shape");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileAttribute {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRelationship {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "target_name")]
    pub target: Option<String>,
    #[serde(default, alias = "type", alias = "relationship_type", alias = "label")]
    pub relationship: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// Result of turning a profile into pipeline records.
#[derive(Debug, Clone)]
pub struct ProfileImport {
    pub entity: Entity,
    pub relationships: Vec<Relationship>,
}

impl ProfileDocument {
    /// Pick the shape by the presence of an `entity` object, then parse it.
    pub fn parse(content: &str) -> ProfileResult<Self> {
        let value: Value = serde_json::from_str(content)?;

        if value.get("entity").is_some_and(Value::is_object) {
            Ok(Self::Nested(serde_json::from_value(value)?))
        } else {
            Ok(Self::Flat(serde_json::from_value(value)?))
        }
    }

    pub fn into_import(self) -> ProfileResult<ProfileImport> {
        let (name, type_label, attributes, relationships) = match self {
            Self::Flat(flat) => (
                non_blank(flat.name.as_ref()),
                flat.entity_type.or(flat.kind),
                flat.attributes,
                flat.relationships,
            ),
            Self::Nested(nested) => (
                nested.entity.name.as_ref().and_then(ProfileName::resolve),
                nested.entity.entity_type.or(nested.entity.kind),
                nested.attributes,
                nested.relationships,
            ),
        };

        let name = name.ok_or(ProfileError::MissingName)?;
        let entity_type = EntityType::from_label(type_label.as_deref().unwrap_or_default());

        let entity = Entity::new(name, entity_type)
            .with_attributes(attributes.map(flatten_attributes).unwrap_or_default())
            .with_confidence(DIRECT_IMPORT_CONFIDENCE);

        let relationships = relationships
            .into_iter()
            .filter_map(ProfileRelationship::into_relationship)
            .collect();

        Ok(ProfileImport {
            entity,
            relationships,
        })
    }
}

impl ProfileRelationship {
    fn into_relationship(self) -> Option<Relationship> {
        let Some(target) = non_blank(self.target.as_ref()) else {
            tracing::warn!(label = ?self.relationship, "skipping profile relationship without a target");
            return None;
        };

        let mut rel = Relationship::anchored(target, self.relationship.unwrap_or_default())
            .with_confidence(self.confidence.unwrap_or(DIRECT_IMPORT_CONFIDENCE));
        rel.source = non_blank(self.source.as_ref());

        if let Some(direction) = self.direction {
            match direction.parse::<Direction>() {
                Ok(d) => rel = rel.with_direction(d),
                Err(e) => tracing::warn!(error = %e, "ignoring unrecognized direction"),
            }
        }
        if let Some(evidence) = non_blank(self.evidence.as_ref()) {
            rel = rel.with_evidence(evidence);
        }

        Some(rel)
    }
}

fn attributes_or_none<'de, D>(deserializer: D) -> Result<Option<ProfileAttributes>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(ProfileAttributes::from_value))
}

/// Null or a missing list reads as empty; entries that do not parse are
/// dropped with a warning instead of failing the whole profile.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(parse_items(items, "relationship")),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "ignoring profile relationships of unexpected shape");
            Ok(Vec::new())
        }
    }
}

fn parse_items<T: DeserializeOwned>(items: Vec<Value>, what: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed profile {what}");
                None
            }
        })
        .collect()
}

fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(confidence_value))
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn flatten_attributes(attributes: ProfileAttributes) -> BTreeMap<String, String> {
    match attributes {
        ProfileAttributes::Map(map) => map
            .into_iter()
            .filter_map(|(key, value)| attribute_value(value).map(|v| (key, v)))
            .collect(),
        ProfileAttributes::List(list) => {
            let mut merged = BTreeMap::new();
            for attr in list {
                if attr.key.trim().is_empty() {
                    continue;
                }
                if let Some(value) = attribute_value(attr.value) {
                    merged.entry(attr.key).or_insert(value);
                }
            }
            merged
        }
    }
}

/// Render a loosely typed JSON attribute value as a string. Nulls are dropped.
pub(crate) fn attribute_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => Some(
            items
                .into_iter()
                .filter_map(attribute_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

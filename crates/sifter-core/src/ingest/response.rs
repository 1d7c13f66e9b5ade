//! Validation and repair of extraction-service responses.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::profile::attribute_value;
use crate::entity::{Entity, EntityType};
use crate::relationship::Relationship;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is not JSON and could not be repaired: {0}")]
    Unparseable(String),
    #[error("response JSON has unexpected shape: {0}")]
    UnexpectedShape(&'static str),
}

pub type ResponseResult<T> = Result<T, ResponseError>;

/// Candidates recovered from one service response.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub summary: Option<String>,
    pub repaired: bool,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type", alias = "entity_type")]
    kind: Option<String>,
    #[serde(default)]
    attributes: Option<Value>,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, alias = "relation", alias = "type", alias = "label")]
    relationship: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
}

/// Parse a raw service response into candidate entities and relationships.
///
/// Markdown code fences and surrounding chatter are ignored. A response cut
/// off mid-stream is repaired by dropping the incomplete tail and closing
/// whatever brackets remain open.
pub fn parse_response(raw: &str) -> ResponseResult<ParsedResponse> {
    let body = strip_code_fences(raw);

    let direct = outermost_object(body).and_then(|s| serde_json::from_str::<Value>(s).ok());
    let (value, repaired) = match direct {
        Some(value) => (value, false),
        None => {
            let repaired = repair_truncated(body)
                .ok_or_else(|| ResponseError::Unparseable(preview(body)))?;
            let value = serde_json::from_str::<Value>(&repaired)
                .map_err(|e| ResponseError::Unparseable(e.to_string()))?;
            tracing::warn!(
                original_len = body.len(),
                repaired_len = repaired.len(),
                "repaired truncated extraction response"
            );
            (value, true)
        }
    };

    let mut parsed = match value {
        Value::Object(mut object) => {
            let entities = object.remove("entities").unwrap_or(Value::Null);
            let relationships = object
                .remove("relationships")
                .or_else(|| object.remove("relations"))
                .unwrap_or(Value::Null);
            let summary = object
                .remove("summary")
                .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
                .filter(|s| !s.is_empty());

            ParsedResponse {
                entities: collect(entities, RawEntity::into_entity),
                relationships: collect(relationships, RawRelationship::into_relationship),
                summary,
                repaired: false,
            }
        }
        Value::Array(items) => ParsedResponse {
            entities: collect(Value::Array(items), RawEntity::into_entity),
            ..ParsedResponse::default()
        },
        _ => return Err(ResponseError::UnexpectedShape("expected an object or array")),
    };

    parsed.repaired = repaired;
    Ok(parsed)
}

fn collect<R, T>(value: Value, convert: fn(R) -> Option<T>) -> Vec<T>
where
    R: for<'de> Deserialize<'de>,
{
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<R>(item) {
            Ok(raw) => convert(raw),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed candidate");
                None
            }
        })
        .collect()
}

impl RawEntity {
    fn into_entity(self) -> Option<Entity> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            tracing::warn!("skipping extracted entity with empty name");
            return None;
        }

        let entity_type = EntityType::from_label(self.kind.as_deref().unwrap_or_default());
        let mut entity = Entity::new(name, entity_type);

        if let Some(Value::Object(attributes)) = self.attributes {
            entity.attributes = attributes
                .into_iter()
                .filter(|(key, _)| !key.trim().is_empty())
                .filter_map(|(key, value)| attribute_value(value).map(|v| (key, v)))
                .collect();
        }
        entity.evidence = non_blank(self.evidence);
        entity.confidence = self.confidence.as_ref().and_then(confidence_value);

        Some(entity)
    }
}

impl RawRelationship {
    fn into_relationship(self) -> Option<Relationship> {
        let Some(target) = non_blank(self.target) else {
            tracing::warn!("skipping extracted relationship without a target");
            return None;
        };

        let mut rel = Relationship::anchored(target, self.relationship.unwrap_or_default());
        rel.source = non_blank(self.source);
        rel.evidence = non_blank(self.evidence);
        rel.confidence = self.confidence.as_ref().and_then(confidence_value);

        Some(rel)
    }
}

/// Accept numbers and numeric strings, clamped into [0, 1].
pub(crate) fn confidence_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then(|| number.clamp(0.0, 1.0))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = rest.find('\n').map_or("", |i| &rest[i + 1..]);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Cut the text after the last complete nested value and close every
/// bracket still open at that point.
///
/// Returns `None` when no complete nested value exists or the brackets are
/// mismatched.
#[must_use]
pub fn repair_truncated(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let text = &text[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut cut: Option<(usize, Vec<char>)> = None;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                let open = stack.pop()?;
                if (open == '{') != (ch == '}') {
                    return None;
                }
                if stack.is_empty() {
                    return Some(text[..=i].to_string());
                }
                cut = Some((i + ch.len_utf8(), stack.clone()));
            }
            _ => {}
        }
    }

    let (end, open) = cut?;
    let mut repaired = text[..end].to_string();
    repaired.extend(open.iter().rev().map(|b| if *b == '{' { '}' } else { ']' }));
    Some(repaired)
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

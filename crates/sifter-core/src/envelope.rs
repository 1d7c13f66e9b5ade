use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ingest::{score_entity, FileType};
use crate::relationship::Relationship;

/// How the entities of a document were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    StructuredImport,
    ChatImport,
    AiExtraction,
}

impl ParseStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredImport => "structured_import",
            Self::ChatImport => "chat_import",
            Self::AiExtraction => "ai_extraction",
        }
    }
}

impl std::fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParseStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured_import" => Ok(Self::StructuredImport),
            "chat_import" => Ok(Self::ChatImport),
            "ai_extraction" => Ok(Self::AiExtraction),
            _ => Err(crate::Error::InvalidParseStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub parse_strategy: ParseStrategy,
    pub model_used: String,
    pub parse_duration_ms: u64,
    pub chunk_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Owned,
    #[default]
    Referenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessRules {
    pub visibility: Visibility,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub lenses: Vec<String>,
}

/// An entity as emitted to downstream storage, carrying the ownership and
/// sharing scaffold every stored entity needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEntity {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default)]
    pub access_rules: AccessRules,
    #[serde(default)]
    pub projection_config: ProjectionConfig,
    #[serde(default)]
    pub perspectives: Vec<serde_json::Value>,
}

impl From<Entity> for EnvelopeEntity {
    fn from(mut entity: Entity) -> Self {
        if entity.confidence.is_none() {
            entity.confidence = Some(score_entity(&entity));
        }
        Self {
            entity,
            ownership: Ownership::default(),
            access_rules: AccessRules::default(),
            projection_config: ProjectionConfig::default(),
            perspectives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub metadata: ParseMetadata,
    pub entities: Vec<EnvelopeEntity>,
    pub relationships: Vec<Relationship>,
    pub summary: String,
}

impl ResultEnvelope {
    #[must_use]
    pub fn new(metadata: ParseMetadata, entities: Vec<Entity>, relationships: Vec<Relationship>) -> Self {
        Self {
            metadata,
            entities: entities.into_iter().map(EnvelopeEntity::from).collect(),
            relationships,
            summary: String::new(),
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|e| &e.entity)
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use serde_json::json;

    fn metadata() -> ParseMetadata {
        ParseMetadata {
            filename: "notes.txt".into(),
            file_type: FileType::Plaintext,
            file_size: 42,
            parse_strategy: ParseStrategy::AiExtraction,
            model_used: "llama3".into(),
            parse_duration_ms: 7,
            chunk_count: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_parse_strategy_roundtrip() {
        for strategy in [
            ParseStrategy::StructuredImport,
            ParseStrategy::ChatImport,
            ParseStrategy::AiExtraction,
        ] {
            assert_eq!(strategy.as_str().parse::<ParseStrategy>().unwrap(), strategy);
        }
        assert!("ocr".parse::<ParseStrategy>().is_err());
    }

    #[test]
    fn test_envelope_entity_scaffold() {
        let envelope = ResultEnvelope::new(
            metadata(),
            vec![Entity::new("Jane Doe", EntityType::Person).with_confidence(0.7)],
            vec![],
        );

        let value = serde_json::to_value(&envelope).unwrap();
        let entity = &value["entities"][0];

        assert_eq!(entity["name"], "Jane Doe");
        assert_eq!(entity["type"], "PERSON");
        assert_eq!(entity["confidence"], 0.7);
        assert_eq!(entity["ownership"], "referenced");
        assert_eq!(entity["access_rules"], json!({"visibility": "private", "shared_with": []}));
        assert_eq!(entity["projection_config"], json!({"lenses": []}));
        assert_eq!(entity["perspectives"], json!([]));
    }

    #[test]
    fn test_unscored_entity_gets_confidence() {
        let envelope = ResultEnvelope::new(metadata(), vec![Entity::new("Acme", EntityType::Org)], vec![]);

        let confidence = envelope.entities[0].entity.confidence.unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn test_metadata_serialization() {
        let value = serde_json::to_value(metadata()).unwrap();

        assert_eq!(value["file_type"], "plaintext");
        assert_eq!(value["parse_strategy"], "ai_extraction");
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_envelope_deserializes() {
        let envelope = ResultEnvelope::new(
            metadata(),
            vec![Entity::new("Acme", EntityType::Org).with_confidence(0.5)],
            vec![Relationship::new("Acme", "Denver", "located_in")],
        )
        .with_summary("one org");

        let json = serde_json::to_string(&envelope).unwrap();
        let back: ResultEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(back, envelope);
        assert!(back.entity("Acme").is_some());
    }
}

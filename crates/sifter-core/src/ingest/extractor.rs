use serde_json::Value;
use thiserror::Error;

use super::chunk::chunk_text;
use super::detect::FileType;
use super::profile::{ProfileDocument, ProfileError};
use super::prompt::build_extraction_prompt;
use super::response::parse_response;
use crate::config::PipelineConfig;
use crate::entity::Entity;
use crate::envelope::ParseStrategy;
use crate::relationship::Relationship;
use crate::service::ExtractionService;

pub const DIRECT_IMPORT_MODEL: &str = "direct_import";
pub const DELEGATED_MODEL: &str = "delegated";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{stage} failed: {message}")]
    StructuredInput {
        stage: ParseStrategy,
        message: String,
    },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Everything the router needs to pick and run a strategy.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Normalized text, used by AI extraction.
    pub text: &'a str,
    /// Original content, used by the structured strategies.
    pub content: &'a str,
    pub filename: &'a str,
    pub file_type: FileType,
    /// Replaces `content` for structured import.
    pub content_override: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Empty when AI extraction produced no summary of its own.
    pub summary: String,
    pub strategy: ParseStrategy,
    pub model_used: String,
    pub chunk_count: usize,
}

impl ExtractionOutcome {
    fn empty(strategy: ParseStrategy, model_used: impl Into<String>) -> Self {
        Self {
            entities: Vec::new(),
            relationships: Vec::new(),
            summary: String::new(),
            strategy,
            model_used: model_used.into(),
            chunk_count: 0,
        }
    }
}

impl FileType {
    /// Strategy that handles documents of this type.
    #[must_use]
    pub fn strategy(self) -> ParseStrategy {
        match self {
            Self::StructuredProfile => ParseStrategy::StructuredImport,
            Self::ChatExport => ParseStrategy::ChatImport,
            _ => ParseStrategy::AiExtraction,
        }
    }
}

/// Route a document to direct import, delegated import or the extraction
/// service and collect the candidates it yields.
///
/// Service failures never surface here: a chunk that errors, times out or
/// returns unusable JSON contributes nothing and the remaining chunks still run.
pub async fn extract_entities(
    request: ExtractionRequest<'_>,
    service: &dyn ExtractionService,
    config: &PipelineConfig,
) -> ExtractionResult<ExtractionOutcome> {
    let strategy = request.file_type.strategy();
    tracing::debug!(filename = request.filename, file_type = %request.file_type, %strategy, "routing extraction");

    match strategy {
        ParseStrategy::StructuredImport => import_profile(request.content_override.unwrap_or(request.content)),
        ParseStrategy::ChatImport => delegate_chat(request.content),
        ParseStrategy::AiExtraction => Ok(extract_with_service(request, service, config).await),
    }
}

fn import_profile(content: &str) -> ExtractionResult<ExtractionOutcome> {
    let import = ProfileDocument::parse(content)
        .and_then(ProfileDocument::into_import)
        .map_err(|e: ProfileError| ExtractionError::StructuredInput {
            stage: ParseStrategy::StructuredImport,
            message: e.to_string(),
        })?;

    let summary = format!(
        "Imported {} profile for {} with {} attributes and {} relationships.",
        import.entity.entity_type,
        import.entity.name,
        import.entity.populated_attribute_count(),
        import.relationships.len(),
    );

    let mut outcome = ExtractionOutcome::empty(ParseStrategy::StructuredImport, DIRECT_IMPORT_MODEL);
    outcome.entities.push(import.entity);
    outcome.relationships = import.relationships;
    outcome.summary = summary;
    outcome.chunk_count = 1;
    Ok(outcome)
}

fn delegate_chat(content: &str) -> ExtractionResult<ExtractionOutcome> {
    let value: Value = serde_json::from_str(content).map_err(|e| ExtractionError::StructuredInput {
        stage: ParseStrategy::ChatImport,
        message: e.to_string(),
    })?;

    let messages = count_messages(&value);
    let mut outcome = ExtractionOutcome::empty(ParseStrategy::ChatImport, DELEGATED_MODEL);
    outcome.summary = format!(
        "Conversational export with {messages} messages. Chat exports are handled by the dedicated chat import path; no entities were extracted here."
    );
    Ok(outcome)
}

fn count_messages(value: &Value) -> usize {
    match value {
        Value::Object(object) => object
            .get("mapping")
            .and_then(Value::as_object)
            .map_or(0, |mapping| {
                mapping
                    .values()
                    .filter(|node| node.get("message").is_some_and(|m| !m.is_null()))
                    .count()
            }),
        Value::Array(conversations) => conversations.iter().map(count_messages).sum(),
        _ => 0,
    }
}

async fn extract_with_service(
    request: ExtractionRequest<'_>,
    service: &dyn ExtractionService,
    config: &PipelineConfig,
) -> ExtractionOutcome {
    let chunks = chunk_text(request.text, config.max_chunk_chars);
    let chunk_count = chunks.len();
    tracing::debug!(chunk_count, max_chars = config.max_chunk_chars, "chunked document");

    let mut outcome = ExtractionOutcome::empty(ParseStrategy::AiExtraction, service.model_id());
    outcome.chunk_count = chunk_count;
    let mut summaries = Vec::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let instruction = build_extraction_prompt(request.filename, index, chunk_count);
        let call = service.complete(&instruction, chunk);

        let raw = match tokio::time::timeout(config.chunk_timeout(), call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(chunk = index, error = %e, "extraction service call failed");
                continue;
            }
            Err(_) => {
                tracing::warn!(chunk = index, timeout_secs = config.chunk_timeout_seconds, "extraction service call timed out");
                continue;
            }
        };

        match parse_response(&raw) {
            Ok(parsed) => {
                tracing::debug!(
                    chunk = index,
                    entities = parsed.entities.len(),
                    relationships = parsed.relationships.len(),
                    repaired = parsed.repaired,
                    "parsed extraction response"
                );
                outcome.entities.extend(parsed.entities);
                outcome.relationships.extend(parsed.relationships);
                summaries.extend(parsed.summary);
            }
            Err(e) => {
                tracing::warn!(chunk = index, error = %e, "discarding unusable extraction response");
            }
        }
    }

    outcome.summary = summaries.join(" ");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use crate::service::fake::ScriptedService;
    use std::time::Duration;

    fn request<'a>(text: &'a str, content: &'a str, file_type: FileType) -> ExtractionRequest<'a> {
        ExtractionRequest {
            text,
            content,
            filename: "input",
            file_type,
            content_override: None,
        }
    }

    #[tokio::test]
    async fn test_structured_profile_is_imported_directly() {
        let content = r#"{"entity_type":"person","name":"Steve Hughes","attributes":{"age":"40"},
            "relationships":[{"target":"Acme","relationship":"works_at","direction":"A_TO_B"}]}"#;
        let service = ScriptedService::new(Vec::<String>::new());

        let outcome = extract_entities(
            request(content, content, FileType::StructuredProfile),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(service.calls(), 0);
        assert_eq!(outcome.strategy, ParseStrategy::StructuredImport);
        assert_eq!(outcome.model_used, "direct_import");
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].entity_type, EntityType::Person);
        assert_eq!(outcome.entities[0].confidence, Some(0.9));
        assert_eq!(outcome.relationships.len(), 1);
        assert!(outcome.summary.contains("Steve Hughes"));
    }

    #[tokio::test]
    async fn test_override_replaces_profile_content() {
        let content = r#"{"entity_type":"person","name":"Original"}"#;
        let replacement = r#"{"entity_type":"org","name":"Replacement Inc"}"#;
        let service = ScriptedService::new(Vec::<String>::new());
        let mut req = request(content, content, FileType::StructuredProfile);
        req.content_override = Some(replacement);

        let outcome = extract_entities(req, &service, &PipelineConfig::default()).await.unwrap();

        assert_eq!(outcome.entities[0].name, "Replacement Inc");
        assert_eq!(outcome.entities[0].entity_type, EntityType::Org);
    }

    #[tokio::test]
    async fn test_malformed_profile_names_stage() {
        let service = ScriptedService::new(Vec::<String>::new());

        let err = extract_entities(
            request("{", "{ not json", FileType::StructuredProfile),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("structured_import failed"));
    }

    #[tokio::test]
    async fn test_chat_export_is_delegated() {
        let content = r#"{"title":"t","mapping":{"a":{"message":{"content":"hi"}},"b":{"message":null},"c":{"message":{"content":"yo"}}}}"#;
        let service = ScriptedService::new(Vec::<String>::new());

        let outcome = extract_entities(
            request(content, content, FileType::ChatExport),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(service.calls(), 0);
        assert_eq!(outcome.strategy, ParseStrategy::ChatImport);
        assert_eq!(outcome.model_used, "delegated");
        assert_eq!(outcome.chunk_count, 0);
        assert!(outcome.entities.is_empty());
        assert!(outcome.summary.contains("2 messages"));
    }

    #[tokio::test]
    async fn test_malformed_chat_export_is_an_error() {
        let service = ScriptedService::new(Vec::<String>::new());

        let err = extract_entities(
            request("", "[{\"mapping\":", FileType::ChatExport),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExtractionError::StructuredInput { stage: ParseStrategy::ChatImport, .. }));
    }

    #[tokio::test]
    async fn test_ai_extraction_collects_candidates() {
        let service = ScriptedService::new([r#"{
            "entities": [{"name": "Alice", "type": "person", "attributes": {"role": "engineer"}}],
            "relationships": [{"source": "Alice", "target": "Acme", "relationship": "works_at"}],
            "summary": "Alice works at Acme."
        }"#]);

        let outcome = extract_entities(
            request("Alice works at Acme.", "Alice works at Acme.", FileType::Plaintext),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.strategy, ParseStrategy::AiExtraction);
        assert_eq!(outcome.model_used, "scripted-model");
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].confidence, None);
        assert_eq!(outcome.relationships.len(), 1);
        assert_eq!(outcome.summary, "Alice works at Acme.");
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_the_batch() {
        let first = "First paragraph about Alice.";
        let second = "Second paragraph about Bob.";
        let text = format!("{first}\n\n{second}");
        let service = ScriptedService::new(["this is not json at all", r#"{"entities":[{"name":"Bob","type":"PERSON"}]}"#]);
        let config = PipelineConfig {
            max_chunk_chars: first.len() + 2,
            ..Default::default()
        };

        let outcome = extract_entities(request(&text, &text, FileType::Plaintext), &service, &config)
            .await
            .unwrap();

        assert_eq!(service.calls(), 2);
        assert_eq!(outcome.chunk_count, 2);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "Bob");
    }

    #[tokio::test]
    async fn test_service_error_yields_empty_outcome() {
        let service = ScriptedService::failing();

        let outcome = extract_entities(
            request("Some text.", "Some text.", FileType::Markdown),
            &service,
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.chunk_count, 1);
        assert!(outcome.entities.is_empty());
        assert!(outcome.summary.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_timeout() {
        let service = ScriptedService::new([r#"{"entities":[{"name":"Late","type":"PERSON"}]}"#])
            .with_delay(Duration::from_secs(600));
        let config = PipelineConfig {
            chunk_timeout_seconds: 5,
            ..Default::default()
        };

        let outcome = extract_entities(request("text", "text", FileType::Plaintext), &service, &config)
            .await
            .unwrap();

        assert_eq!(service.calls(), 1);
        assert!(outcome.entities.is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_makes_no_calls() {
        let service = ScriptedService::new(Vec::<String>::new());

        let outcome = extract_entities(request("   ", "   ", FileType::Plaintext), &service, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(service.calls(), 0);
        assert_eq!(outcome.chunk_count, 0);
    }

    #[test]
    fn test_strategy_routing() {
        assert_eq!(FileType::StructuredProfile.strategy(), ParseStrategy::StructuredImport);
        assert_eq!(FileType::ChatExport.strategy(), ParseStrategy::ChatImport);
        assert_eq!(FileType::Pdf.strategy(), ParseStrategy::AiExtraction);
        assert_eq!(FileType::Json.strategy(), ParseStrategy::AiExtraction);
    }
}

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use super::confidence::assign_confidence;
use super::detect::detect_file_type;
use super::extractor::{extract_entities, ExtractionError, ExtractionRequest};
use super::postprocess::PostProcessor;
use super::text::extract_text;
use crate::config::PipelineConfig;
use crate::envelope::{ParseMetadata, ResultEnvelope};
use crate::service::ExtractionService;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Turns one document at a time into a [`ResultEnvelope`].
///
/// Holds no per-document state, so a single pipeline can serve concurrent
/// callers.
pub struct Pipeline {
    service: Arc<dyn ExtractionService>,
    config: PipelineConfig,
    post_processor: PostProcessor,
}

impl Pipeline {
    #[must_use]
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self {
            service,
            config: PipelineConfig::default(),
            post_processor: PostProcessor::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_post_processor(mut self, post_processor: PostProcessor) -> Self {
        self.post_processor = post_processor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn parse(&self, content: &str, filename: &str) -> IngestResult<ResultEnvelope> {
        self.parse_with_override(content, filename, None).await
    }

    /// Like [`Pipeline::parse`], but a structured profile is read from
    /// `content_override` instead of `content` when one is given.
    pub async fn parse_with_override(
        &self,
        content: &str,
        filename: &str,
        content_override: Option<&str>,
    ) -> IngestResult<ResultEnvelope> {
        self.run(content, filename, content_override, content.len()).await
    }

    /// Parse raw bytes, decoding invalid UTF-8 lossily. `file_size` reports
    /// the byte count before decoding.
    pub async fn parse_bytes(&self, bytes: &[u8], filename: &str) -> IngestResult<ResultEnvelope> {
        let content = String::from_utf8_lossy(bytes);
        self.run(&content, filename, None, bytes.len()).await
    }

    /// Read a file and parse it under its own file name.
    pub async fn parse_file(&self, path: &Path) -> IngestResult<ResultEnvelope> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        self.parse_bytes(&bytes, filename).await
    }

    async fn run(
        &self,
        content: &str,
        filename: &str,
        content_override: Option<&str>,
        file_size: usize,
    ) -> IngestResult<ResultEnvelope> {
        let start = Instant::now();

        let file_type = detect_file_type(content, filename);
        let text = extract_text(content, file_type);
        tracing::debug!(filename, %file_type, text_chars = text.len(), "normalized document");

        let request = ExtractionRequest {
            text: &text,
            content,
            filename,
            file_type,
            content_override,
        };
        let outcome = extract_entities(request, self.service.as_ref(), &self.config).await?;

        let (entities, relationships) = assign_confidence(outcome.entities, outcome.relationships);
        let (entities, relationships) = self.post_processor.process(entities, relationships);

        let summary = if outcome.summary.trim().is_empty() {
            format!(
                "Extracted {} entities and {} relationships from {}.",
                entities.len(),
                relationships.len(),
                display_name(filename),
            )
        } else {
            outcome.summary
        };

        let metadata = ParseMetadata {
            filename: filename.to_string(),
            file_type,
            file_size: file_size as u64,
            parse_strategy: outcome.strategy,
            model_used: outcome.model_used,
            parse_duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            chunk_count: outcome.chunk_count,
            timestamp: Utc::now(),
        };

        tracing::info!(
            filename,
            %file_type,
            strategy = %metadata.parse_strategy,
            entities = entities.len(),
            relationships = relationships.len(),
            duration_ms = metadata.parse_duration_ms,
            "parsed document"
        );

        Ok(ResultEnvelope::new(metadata, entities, relationships).with_summary(summary))
    }
}

fn display_name(filename: &str) -> &str {
    if filename.trim().is_empty() {
        "the document"
    } else {
        filename
    }
}

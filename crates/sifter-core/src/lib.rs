#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]

pub mod config;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod ingest;
pub mod relationship;
pub mod service;

pub use config::{ConfigError, PipelineConfig, ServiceConfig, SifterConfig};
pub use entity::{Entity, EntityType};
pub use envelope::{
    AccessRules, EnvelopeEntity, Ownership, ParseMetadata, ParseStrategy, ProjectionConfig,
    ResultEnvelope, Visibility,
};
pub use error::{Error, Result};
pub use ingest::{
    assign_confidence, detect_file_type, extract_entities, extract_text, post_process, FileType,
    IngestError, Pipeline,
};
pub use relationship::{Direction, Relationship};
pub use service::{ExtractionService, OllamaService, ServiceError};

mod client;

pub use client::{ExtractionService, OllamaService, ServiceError, ServiceResult};

#[cfg(test)]
pub(crate) mod fake;

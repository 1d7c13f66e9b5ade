use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ServiceConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("service response is missing the generated text")]
    EmptyResponse,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Language-model backend that turns an instruction plus a slice of text into
/// a JSON description of the entities it found.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Identifier reported in the envelope as `model_used`.
    fn model_id(&self) -> &str;

    async fn complete(&self, instruction: &str, text: &str) -> ServiceResult<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaService {
    endpoint: Url,
    model: String,
    inner: Client,
}

impl OllamaService {
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let mut base = Url::parse(&config.endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("api/generate")?;
        let inner = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            inner,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionService for OllamaService {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, instruction: &str, text: &str) -> ServiceResult<String> {
        let request = GenerateRequest {
            model: &self.model,
            system: instruction,
            prompt: text,
            stream: false,
            format: "json",
        };

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, chars = text.len(), "calling extraction service");

        let response = self.inner.post(self.endpoint.clone()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let generated: GenerateResponse = response.json().await?;
        generated
            .response
            .filter(|r| !r.trim().is_empty())
            .ok_or(ServiceError::EmptyResponse)
    }
}

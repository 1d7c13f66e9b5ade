use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "SIFTER_ENDPOINT";
pub const ENV_MODEL: &str = "SIFTER_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "SIFTER_TIMEOUT_SECS";
pub const ENV_CHUNK_CHARS: &str = "SIFTER_CHUNK_CHARS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidOverride { key: &'static str, value: String },
    #[error("invalid service endpoint {0:?}: {1}")]
    InvalidEndpoint(String, url::ParseError),
    #[error("service model must not be empty")]
    EmptyModel,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where and how to reach the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".into(),
            model: "llama3".into(),
            request_timeout_seconds: 120,
            connect_timeout_seconds: 10,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on the characters sent to the service in one call.
    pub max_chunk_chars: usize,
    /// Wall-clock budget for one chunk's service call.
    pub chunk_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 6000,
            chunk_timeout_seconds: 180,
        }
    }
}

impl PipelineConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SifterConfig {
    pub service: ServiceConfig,
    pub pipeline: PipelineConfig,
}

impl SifterConfig {
    /// `$XDG_CONFIG_HOME/sifter/config.json` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sifter").join("config.json"))
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from `path`, or the default location when it exists, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.service.endpoint = endpoint;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.service.model = model;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = parse_override(ENV_TIMEOUT_SECS, &secs)?;
            self.service.request_timeout_seconds = secs;
            self.pipeline.chunk_timeout_seconds = secs;
        }
        if let Some(chars) = lookup(ENV_CHUNK_CHARS) {
            self.pipeline.max_chunk_chars = parse_override(ENV_CHUNK_CHARS, &chars)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        url::Url::parse(&self.service.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(self.service.endpoint.clone(), e))?;

        if self.service.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.service.request_timeout_seconds == 0 {
            return Err(ConfigError::Zero("service.request_timeout_seconds"));
        }
        if self.service.connect_timeout_seconds == 0 {
            return Err(ConfigError::Zero("service.connect_timeout_seconds"));
        }
        if self.pipeline.max_chunk_chars == 0 {
            return Err(ConfigError::Zero("pipeline.max_chunk_chars"));
        }
        if self.pipeline.chunk_timeout_seconds == 0 {
            return Err(ConfigError::Zero("pipeline.chunk_timeout_seconds"));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SifterConfig::default();
        assert_eq!(config.service.endpoint, "http://localhost:11434");
        assert_eq!(config.service.model, "llama3");
        assert_eq!(config.pipeline.max_chunk_chars, 6000);
        assert_eq!(config.pipeline.chunk_timeout(), Duration::from_secs(180));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SifterConfig =
            serde_json::from_str(r#"{"service": {"model": "mistral"}}"#).unwrap();

        assert_eq!(config.service.model, "mistral");
        assert_eq!(config.service.endpoint, "http://localhost:11434");
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SifterConfig::default();
        config
            .apply_overrides(lookup(&[
                (ENV_ENDPOINT, "http://gpu-box:11434"),
                (ENV_MODEL, "qwen2"),
                (ENV_TIMEOUT_SECS, "30"),
                (ENV_CHUNK_CHARS, "2000"),
            ]))
            .unwrap();

        assert_eq!(config.service.endpoint, "http://gpu-box:11434");
        assert_eq!(config.service.model, "qwen2");
        assert_eq!(config.service.request_timeout_seconds, 30);
        assert_eq!(config.pipeline.chunk_timeout_seconds, 30);
        assert_eq!(config.pipeline.max_chunk_chars, 2000);
    }

    #[test]
    fn test_bad_numeric_override() {
        let mut config = SifterConfig::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_CHUNK_CHARS, "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { key: ENV_CHUNK_CHARS, .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SifterConfig::default();
        config.service.endpoint = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(..))));

        let mut config = SifterConfig::default();
        config.pipeline.max_chunk_chars = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Zero(_))));

        let mut config = SifterConfig::default();
        config.service.connect_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = SifterConfig::from_file(Path::new("/nonexistent/sifter.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_config_serialization() {
        let config = SifterConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SifterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}

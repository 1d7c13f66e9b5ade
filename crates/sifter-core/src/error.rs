use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid entity type: {0:?}")]
    InvalidEntityType(String),

    #[error("Invalid relationship direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Invalid parse strategy: {0}")]
    InvalidParseStrategy(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

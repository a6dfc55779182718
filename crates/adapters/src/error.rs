use aws_smithy_types::error::display::DisplayErrorContext;
use curriculum_core::{LanguageModelError, RetrievalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("AWS request failed: {0}")]
    Sdk(String),
    #[error("failed to start the client runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
    #[error("API returned an empty response")]
    EmptyResponse,
}

impl AdapterError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        AdapterError::InvalidConfig(message.into())
    }

    /// Keeps the whole source chain of an SDK failure in the message.
    pub(crate) fn sdk<E: std::error::Error>(err: E) -> Self {
        AdapterError::Sdk(DisplayErrorContext(err).to_string())
    }
}

impl From<AdapterError> for LanguageModelError {
    fn from(err: AdapterError) -> Self {
        LanguageModelError::new(err)
    }
}

impl From<AdapterError> for RetrievalError {
    fn from(err: AdapterError) -> Self {
        RetrievalError::new(err)
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

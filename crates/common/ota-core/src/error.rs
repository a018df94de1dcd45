use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown platform: {0}")]
    InvalidPlatform(String),

    #[error("Invalid content hash: {0}")]
    InvalidContentHash(String),
}

impl CoreError {
    pub fn invalid_platform(value: impl Into<String>) -> Self {
        Self::InvalidPlatform(value.into())
    }

    pub fn invalid_content_hash(value: impl Into<String>) -> Self {
        Self::InvalidContentHash(value.into())
    }
}

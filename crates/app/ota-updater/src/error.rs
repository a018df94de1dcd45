use ota_core::ContentHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("update request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("update server responded with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("failed to parse update response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("invalid update url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("downloaded bundle hash {actual} does not match expected {expected}")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(String),

    #[error("local update state error: {0}")]
    State(String),

    #[error("local update state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local update state is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpdaterError {
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }

    /// Failures talking to the update server, as opposed to local state failures.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::HttpStatus { .. } | Self::Parse(_)
        )
    }

    pub fn is_hash_mismatch(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }
}

pub type UpdaterResult<T> = std::result::Result<T, UpdaterError>;

/// First `max_chars` characters of an error body, prefixed for display after a status.
pub(crate) fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_is_truncated_and_prefixed() {
        assert_eq!(response_snippet("", 10), "");
        assert_eq!(response_snippet("abcdef", 3), ": abc");
    }

    #[test]
    fn test_status_errors_are_network_errors() {
        let err = UpdaterError::HttpStatus {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body_snippet: String::new(),
        };
        assert!(err.is_network());
        assert!(!UpdaterError::state("disk full").is_network());
    }

    #[test]
    fn test_hash_mismatch_display_names_both_hashes() {
        let expected = ContentHash::compute(b"a");
        let actual = ContentHash::compute(b"b");
        let err = UpdaterError::HashMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        };
        assert!(err.is_hash_mismatch());
        let message = err.to_string();
        assert!(message.contains(expected.as_str()));
        assert!(message.contains(actual.as_str()));
    }
}

//! JSON bodies exchanged over the update HTTP API

use serde::{Deserialize, Serialize};

use crate::{BundleRecord, UpdateDescriptor};

/// Body of `GET /api/update-check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResponse {
    pub update_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateDescriptor>,
}

impl UpdateCheckResponse {
    pub fn none() -> Self {
        Self {
            update_available: false,
            update: None,
        }
    }

    pub fn available(update: UpdateDescriptor) -> Self {
        Self {
            update_available: true,
            update: Some(update),
        }
    }

    /// `updateAvailable: true` without an `update` body is treated as no update.
    pub fn into_update(self) -> Option<UpdateDescriptor> {
        if self.update_available {
            self.update
        } else {
            None
        }
    }
}

/// Body of a successful `POST /api/upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub bundle: BundleRecord,
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_update_body() {
        let json = serde_json::to_string(&UpdateCheckResponse::none()).unwrap();
        assert_eq!(json, r#"{"updateAvailable":false}"#);
    }

    #[test]
    fn test_available_without_update_is_none() {
        let response: UpdateCheckResponse =
            serde_json::from_str(r#"{"updateAvailable":true}"#).unwrap();
        assert!(response.into_update().is_none());
    }
}

//! Utility functions for parsing and validation

use ota_core::{ContentHash, Platform, UpdateQuery};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    error::{UpdateServiceError, UpdateServiceResult},
    types::UpdateCheckParams,
};

/// Returns the trimmed value of a required field, rejecting missing or blank values
pub fn required_field(name: &str, value: Option<String>) -> UpdateServiceResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(UpdateServiceError::validation(format!(
            "missing required field '{}'",
            name
        ))),
    }
}

pub fn parse_platform(value: &str) -> UpdateServiceResult<Platform> {
    value
        .parse::<Platform>()
        .map_err(|e| UpdateServiceError::validation(e.to_string()))
}

/// Parse an optional boolean form field. Absent or blank means false.
pub fn parse_flag(name: &str, value: Option<&str>) -> UpdateServiceResult<bool> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(false);
    };

    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(UpdateServiceError::validation(format!(
            "field '{}' must be a boolean, got '{}'",
            name, value
        ))),
    }
}

/// Unknown and malformed ids are both "not found" to the caller.
pub fn parse_bundle_id(value: &str) -> UpdateServiceResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| UpdateServiceError::bundle_not_found(value))
}

/// Build an [`UpdateQuery`] from raw query parameters.
///
/// A blank or malformed `currentPackageHash` cannot prove the client already
/// holds any bundle, so it is treated as absent.
#[instrument(level = "debug")]
pub fn parse_update_query(params: UpdateCheckParams) -> UpdateServiceResult<UpdateQuery> {
    let app_version = required_field("appVersion", params.app_version)?;
    let platform = parse_platform(&required_field("platform", params.platform)?)?;
    let deployment_key = required_field("deploymentKey", params.deployment_key)?;

    let current_package_hash = params
        .current_package_hash
        .filter(|h| !h.trim().is_empty())
        .and_then(|h| match h.parse::<ContentHash>() {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!("Ignoring unusable currentPackageHash: {}", e);
                None
            }
        });

    Ok(UpdateQuery {
        app_version,
        platform,
        deployment_key,
        current_package_hash,
    })
}

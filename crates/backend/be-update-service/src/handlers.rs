use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use ota_core::api::{HealthResponse, UpdateCheckResponse, UploadResponse};
use tracing::{debug, instrument, warn};

use crate::{
    analytics,
    error::{UpdateServiceError, UpdateServiceResult},
    service::AppState,
    types::{BundleUpload, UpdateCheckParams},
    utils::{parse_bundle_id, parse_flag, parse_platform, parse_update_query, required_field},
};

const BUNDLE_FIELD: &str = "bundle";

#[instrument(skip(state, multipart))]
pub async fn upload_handler(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => return e.into_response(),
    };

    match state.registry().put(upload).await {
        Ok(bundle) => {
            analytics::track_bundle_upload(&bundle);
            (
                StatusCode::OK,
                Json(UploadResponse {
                    success: true,
                    bundle,
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Bundle upload failed: {}", e);
            e.into_response()
        }
    }
}

#[instrument(skip(state), fields(
    app_version = ?params.app_version,
    platform = ?params.platform,
    deployment_key = ?params.deployment_key,
    current_package_hash = ?params.current_package_hash
))]
pub async fn update_check_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateCheckParams>,
) -> Response {
    let query = match parse_update_query(params) {
        Ok(query) => query,
        Err(e) => return e.into_response(),
    };

    match state.resolver().resolve(&query).await {
        Ok(Some(update)) => {
            debug!("Update available: {} ({})", update.label, update.package_hash);
            analytics::track_update_check(&query, true, Some(&update.label));
            (StatusCode::OK, Json(UpdateCheckResponse::available(update))).into_response()
        }
        Ok(None) => {
            analytics::track_update_check(&query, false, None);
            (StatusCode::OK, Json(UpdateCheckResponse::none())).into_response()
        }
        Err(e) => {
            warn!("Update check failed for {}: {}", query.key(), e);
            analytics::track_update_check_failed(&query, "storage");
            e.into_response()
        }
    }
}

#[instrument(skip(state))]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(bundle_id): Path<String>,
) -> Response {
    match serve_bundle(&state, &bundle_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn serve_bundle(state: &AppState, bundle_id: &str) -> UpdateServiceResult<Response> {
    let id = parse_bundle_id(bundle_id)?;
    let record = state.registry().get(id).await?;
    let blob = state.registry().open(&record).await?;

    debug!("Streaming bundle {} ({} bytes)", record.id, blob.size);
    analytics::track_bundle_download(&record);

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.bundle\"", record.id),
            ),
            (header::CONTENT_LENGTH, blob.size.to_string()),
            (header::ETAG, format!("\"{}\"", record.content_hash)),
        ],
        Body::from_stream(blob.stream),
    )
        .into_response())
}

fn multipart_error(err: MultipartError) -> UpdateServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UpdateServiceError::PayloadTooLarge(err.body_text())
    } else {
        UpdateServiceError::validation(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// Collect the multipart form into a [`BundleUpload`]. Unknown fields are ignored.
async fn read_upload(mut multipart: Multipart) -> UpdateServiceResult<BundleUpload> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == BUNDLE_FIELD {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            content = Some(bytes.to_vec());
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            fields.insert(name, text);
        }
    }

    let content =
        content.ok_or_else(|| UpdateServiceError::validation("No bundle file uploaded"))?;
    if content.is_empty() {
        return Err(UpdateServiceError::validation("Uploaded bundle is empty"));
    }

    let app_version = required_field("appVersion", fields.remove("appVersion"))?;
    let platform = parse_platform(&required_field("platform", fields.remove("platform"))?)?;
    let deployment_key = required_field("deploymentKey", fields.remove("deploymentKey"))?;
    let label = required_field("label", fields.remove("label"))?;
    let is_mandatory = parse_flag("isMandatory", fields.get("isMandatory").map(String::as_str))?;
    let update_app_version = parse_flag(
        "updateAppVersion",
        fields.get("updateAppVersion").map(String::as_str),
    )?;

    Ok(BundleUpload::builder()
        .app_version(app_version)
        .platform(platform)
        .deployment_key(deployment_key)
        .label(label)
        .is_mandatory(is_mandatory)
        .update_app_version(update_app_version)
        .content(content)
        .build())
}

use std::sync::atomic::{AtomicBool, Ordering};

use ota_core::{BundleRecord, UpdateQuery};
use posthog_rs::Event;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn event capture on. Call only after the global PostHog client is initialized.
pub fn enable() {
    ENABLED.store(true, Ordering::Relaxed);
}

fn capture_async(event: Event) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = posthog_rs::capture(event).await {
            tracing::error!("Failed to capture posthog event: {}", e);
        }
    });
}

pub fn track_update_check(query: &UpdateQuery, update_available: bool, label: Option<&str>) {
    let mut event = Event::new_anon("update_check");
    event.insert_prop("app_version", &query.app_version).ok();
    event.insert_prop("platform", query.platform.as_str()).ok();
    event.insert_prop("deployment_key", &query.deployment_key).ok();
    event
        .insert_prop("has_current_hash", query.current_package_hash.is_some())
        .ok();
    event.insert_prop("update_available", update_available).ok();
    if let Some(label) = label {
        event.insert_prop("label", label).ok();
    }
    capture_async(event);
}

pub fn track_update_check_failed(query: &UpdateQuery, error_kind: &str) {
    let mut event = Event::new_anon("update_check_failed");
    event.insert_prop("app_version", &query.app_version).ok();
    event.insert_prop("platform", query.platform.as_str()).ok();
    event.insert_prop("deployment_key", &query.deployment_key).ok();
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_bundle_upload(record: &BundleRecord) {
    let mut event = Event::new_anon("bundle_upload");
    event.insert_prop("app_version", &record.app_version).ok();
    event.insert_prop("platform", record.platform.as_str()).ok();
    event.insert_prop("deployment_key", &record.deployment_key).ok();
    event.insert_prop("label", &record.label).ok();
    event.insert_prop("size", record.size).ok();
    event.insert_prop("is_mandatory", record.is_mandatory).ok();
    capture_async(event);
}

pub fn track_bundle_download(record: &BundleRecord) {
    let mut event = Event::new_anon("bundle_download");
    event.insert_prop("app_version", &record.app_version).ok();
    event.insert_prop("platform", record.platform.as_str()).ok();
    event.insert_prop("deployment_key", &record.deployment_key).ok();
    event.insert_prop("label", &record.label).ok();
    capture_async(event);
}

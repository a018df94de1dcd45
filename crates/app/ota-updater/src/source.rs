use async_trait::async_trait;
use ota_core::{ContentHash, UpdateDescriptor, UpdateQuery, api::UpdateCheckResponse};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    config::UpdaterConfig,
    error::{UpdaterError, UpdaterResult, response_snippet},
};

const UPDATE_CHECK_PATH: &str = "/api/update-check";
const SNIPPET_CHARS: usize = 160;

/// Outcome of installing a downloaded bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Succeeded,
    Failed,
}

/// Where update descriptors and bundle bytes come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Ask for the bundle the query should move to. `None` when it is current.
    async fn query_update(&self, query: &UpdateQuery) -> UpdaterResult<Option<UpdateDescriptor>>;

    async fn download(&self, download_url: &str) -> UpdaterResult<Vec<u8>>;

    /// Called after a bundle was downloaded and verified.
    async fn report_status_download(&self, _package_hash: &ContentHash) -> UpdaterResult<()> {
        Ok(())
    }

    /// Called after an install succeeded or was rolled back.
    async fn report_status_deploy(
        &self,
        _package_hash: &ContentHash,
        _status: DeploymentStatus,
    ) -> UpdaterResult<()> {
        Ok(())
    }
}

fn build_http_client(config: &UpdaterConfig) -> UpdaterResult<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| UpdaterError::HttpClient(e.to_string()))
}

/// [`UpdateSource`] backed by the update service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpUpdateSource {
    client: reqwest::Client,
    server_url: Url,
}

impl HttpUpdateSource {
    pub fn new(config: &UpdaterConfig) -> UpdaterResult<Self> {
        Ok(Self::with_client(
            build_http_client(config)?,
            config.server_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, server_url: Url) -> Self {
        Self { client, server_url }
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// Absolute URLs pass through; paths are appended to the server URL, keeping any prefix.
    fn absolute_url(&self, path: &str) -> UpdaterResult<Url> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let joined = format!(
            "{}{}",
            self.server_url.as_str().trim_end_matches('/'),
            path
        );
        Url::parse(&joined).map_err(|e| UpdaterError::invalid_url(joined, e))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> UpdaterResult<reqwest::Response> {
        let response = request.send().await.map_err(UpdaterError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, SNIPPET_CHARS))
                .unwrap_or_default();
            return Err(UpdaterError::HttpStatus {
                status,
                body_snippet,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    #[instrument(skip(self), fields(key = %query.key()), level = "debug")]
    async fn query_update(&self, query: &UpdateQuery) -> UpdaterResult<Option<UpdateDescriptor>> {
        let url = self.absolute_url(UPDATE_CHECK_PATH)?;
        let response = self.send(self.client.get(url).query(query)).await?;
        let body: UpdateCheckResponse = response.json().await.map_err(UpdaterError::Parse)?;

        let Some(mut update) = body.into_update() else {
            debug!("Server reports no update");
            return Ok(None);
        };
        update.download_url = self.absolute_url(&update.download_url)?.to_string();
        Ok(Some(update))
    }

    #[instrument(skip(self), level = "debug")]
    async fn download(&self, download_url: &str) -> UpdaterResult<Vec<u8>> {
        let url = self.absolute_url(download_url)?;
        let response = self.send(self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(UpdaterError::Request)?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

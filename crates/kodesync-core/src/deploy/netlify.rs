//! Netlify deployment provider.
//!
//! Netlify's deploy API is digest-based: create a site, announce the file
//! tree as path -> SHA1 digests, then upload whatever the API reports as
//! missing. Polling reads the deploy resource directly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::deploy::provider::DeployProvider;
use crate::domain::{DeployState, Deployment, DeploymentRequest, Result, SyncError};

const DEFAULT_BASE_URL: &str = "https://api.netlify.com";

pub struct NetlifyProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for NetlifyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl NetlifyProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the provider at a different API origin (used by tests).
    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kodesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        NetlifyProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Netlify's deploy `state` vocabulary, normalized.
///
/// Documented states: new, enqueued, uploading, uploaded, preparing,
/// prepared, processing, building, ready, error. Anything unrecognized is
/// treated as in-progress.
fn map_state(state: &str) -> DeployState {
    match state {
        "new" => DeployState::Queued,
        "ready" => DeployState::Ready,
        "error" => DeployState::Error,
        _ => DeployState::Building,
    }
}

fn map_initial_state(state: Option<&str>) -> DeployState {
    match state {
        Some("ready") => DeployState::Ready,
        Some("error") => DeployState::Error,
        Some("uploading" | "uploaded" | "preparing" | "prepared" | "processing" | "building") => {
            DeployState::Building
        }
        _ => DeployState::Queued,
    }
}

/// Path -> SHA1 announcement map. Netlify keys files by absolute-style
/// paths with a leading slash.
fn digest_map(request: &DeploymentRequest) -> BTreeMap<String, String> {
    request
        .snapshot
        .iter()
        .map(|(path, content)| {
            let digest = hex::encode(Sha1::digest(content.as_bytes()));
            (format!("/{path}"), digest)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SiteResponse {
    id: String,
    url: Option<String>,
    ssl_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeployResponse {
    id: String,
    state: Option<String>,
    #[serde(default)]
    required: Vec<String>,
    deploy_ssl_url: Option<String>,
    url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

async fn rejection(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let message = response
        .json::<ApiError>()
        .await
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("netlify returned {status}"));
    SyncError::ProviderRejected(message)
}

#[async_trait]
impl DeployProvider for NetlifyProvider {
    fn name(&self) -> &str {
        "netlify"
    }

    async fn submit(&self, request: &DeploymentRequest) -> Result<Deployment> {
        let site_name = request
            .target_name
            .clone()
            .unwrap_or_else(|| format!("kode-site-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));

        // 1. Create the site.
        let response = self
            .client
            .post(format!("{}/api/v1/sites", self.base_url))
            .bearer_auth(&request.token)
            .json(&json!({ "name": site_name }))
            .send()
            .await
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let site: SiteResponse = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        // 2. Announce the tree as digests.
        let files = digest_map(request);
        debug!(site_id = %site.id, files = files.len(), "creating netlify deploy");
        let response = self
            .client
            .post(format!("{}/api/v1/sites/{}/deploys", self.base_url, site.id))
            .bearer_auth(&request.token)
            .json(&json!({ "files": files, "async": false }))
            .send()
            .await
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let deploy: DeployResponse = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        // 3. Upload whatever the API reported missing.
        for (path, content) in request.snapshot.iter() {
            let digest = hex::encode(Sha1::digest(content.as_bytes()));
            if !deploy.required.contains(&digest) {
                continue;
            }
            let response = self
                .client
                .put(format!(
                    "{}/api/v1/deploys/{}/files/{path}",
                    self.base_url, deploy.id
                ))
                .bearer_auth(&request.token)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(content.as_bytes().to_vec())
                .send()
                .await
                .map_err(|e| SyncError::NetworkError(e.to_string()))?;
            if !response.status().is_success() {
                return Err(rejection(response).await);
            }
        }

        info!(deploy_id = %deploy.id, "netlify deployment created");
        Ok(Deployment {
            id: deploy.id,
            provider: "netlify".to_string(),
            url: site.ssl_url.or(site.url),
            state: map_initial_state(deploy.state.as_deref()),
            created_at: deploy.created_at.unwrap_or_else(Utc::now),
            error_message: None,
        })
    }

    async fn poll_status(&self, deploy_id: &str, token: &str) -> Result<Option<Deployment>> {
        let response = self
            .client
            .get(format!("{}/api/v1/deploys/{deploy_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let deploy: DeployResponse = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        let state = deploy
            .state
            .as_deref()
            .map(map_state)
            .unwrap_or(DeployState::Building);

        Ok(Some(Deployment {
            id: deploy.id,
            provider: "netlify".to_string(),
            url: deploy.deploy_ssl_url.or(deploy.url),
            state,
            created_at: deploy.created_at.unwrap_or_else(Utc::now),
            error_message: deploy.error_message,
        }))
    }
}

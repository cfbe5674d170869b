//! Vercel deployment provider.
//!
//! Talks to the v13 deployments API: one POST with inline file contents
//! creates the deployment, one GET polls it. Binary files travel
//! base64-encoded with an explicit `encoding` marker.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::deploy::provider::DeployProvider;
use crate::domain::{DeployState, Deployment, DeploymentRequest, Result, SyncError};
use crate::snapshot::FileContent;

const DEFAULT_BASE_URL: &str = "https://api.vercel.com";

pub struct VercelProvider {
    client: reqwest::Client,
    base_url: String,
}

impl Default for VercelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VercelProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the provider at a different API origin (used by tests).
    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kodesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        VercelProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Vercel's `readyState` vocabulary, normalized.
///
/// Documented states: QUEUED, INITIALIZING, BUILDING, READY, ERROR,
/// CANCELED. Anything unrecognized is treated as in-progress.
fn map_ready_state(state: &str) -> DeployState {
    match state {
        "QUEUED" | "INITIALIZING" => DeployState::Queued,
        "BUILDING" => DeployState::Building,
        "READY" => DeployState::Ready,
        "ERROR" | "ERRORED" | "CANCELED" => DeployState::Error,
        _ => DeployState::Building,
    }
}

/// Initial-state normalization: anything not clearly in progress or
/// terminal starts as queued.
fn map_initial_state(state: Option<&str>) -> DeployState {
    match state {
        Some("BUILDING") => DeployState::Building,
        Some("READY") => DeployState::Ready,
        Some("ERROR" | "ERRORED" | "CANCELED") => DeployState::Error,
        _ => DeployState::Queued,
    }
}

/// Request body for the deployment-create endpoint.
fn submit_body(request: &DeploymentRequest) -> serde_json::Value {
    let name = request
        .target_name
        .clone()
        .unwrap_or_else(|| format!("kode-project-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]));

    let files: Vec<serde_json::Value> = request
        .snapshot
        .iter()
        .map(|(path, content)| match content {
            FileContent::Text(data) => json!({ "file": path, "data": data }),
            FileContent::Binary(bytes) => json!({
                "file": path,
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                "encoding": "base64",
            }),
        })
        .collect();

    json!({
        "name": name,
        "files": files,
        "projectSettings": { "framework": "nextjs" },
    })
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
    url: Option<String>,
    #[serde(rename = "readyState")]
    ready_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    id: String,
    url: Option<String>,
    #[serde(rename = "readyState")]
    ready_state: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<i64>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

async fn rejection(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let message = response
        .json::<ApiError>()
        .await
        .ok()
        .and_then(|e| e.error.and_then(|b| b.message))
        .unwrap_or_else(|| format!("vercel returned {status}"));
    SyncError::ProviderRejected(message)
}

#[async_trait]
impl DeployProvider for VercelProvider {
    fn name(&self) -> &str {
        "vercel"
    }

    async fn submit(&self, request: &DeploymentRequest) -> Result<Deployment> {
        let body = submit_body(request);
        debug!(files = request.snapshot.len(), "submitting to vercel");

        let response = self
            .client
            .post(format!("{}/v13/deployments", self.base_url))
            .bearer_auth(&request.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        info!(deploy_id = %created.id, "vercel deployment created");
        Ok(Deployment {
            id: created.id,
            provider: "vercel".to_string(),
            url: created.url,
            state: map_initial_state(created.ready_state.as_deref()),
            created_at: Utc::now(),
            error_message: None,
        })
    }

    async fn poll_status(&self, deploy_id: &str, token: &str) -> Result<Option<Deployment>> {
        let response = self
            .client
            .get(format!("{}/v13/deployments/{deploy_id}", self.base_url))
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

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        let state = status
            .ready_state
            .as_deref()
            .map(map_ready_state)
            .unwrap_or(DeployState::Building);
        let created_at = status
            .created_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Ok(Some(Deployment {
            id: status.id,
            provider: "vercel".to_string(),
            url: status.url,
            state,
            created_at,
            error_message: status.error_message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FileSnapshot;

    #[test]
    fn documented_states_map_totally() {
        assert_eq!(map_ready_state("QUEUED"), DeployState::Queued);
        assert_eq!(map_ready_state("INITIALIZING"), DeployState::Queued);
        assert_eq!(map_ready_state("BUILDING"), DeployState::Building);
        assert_eq!(map_ready_state("READY"), DeployState::Ready);
        assert_eq!(map_ready_state("ERROR"), DeployState::Error);
        assert_eq!(map_ready_state("ERRORED"), DeployState::Error);
        assert_eq!(map_ready_state("CANCELED"), DeployState::Error);
    }

    #[test]
    fn unrecognized_poll_state_maps_to_building() {
        assert_eq!(map_ready_state("ANALYZING"), DeployState::Building);
        assert_eq!(map_ready_state(""), DeployState::Building);
    }

    #[test]
    fn unrecognized_initial_state_normalizes_to_queued() {
        assert_eq!(map_initial_state(None), DeployState::Queued);
        assert_eq!(map_initial_state(Some("QUEUED")), DeployState::Queued);
        assert_eq!(map_initial_state(Some("ANALYZING")), DeployState::Queued);
        assert_eq!(map_initial_state(Some("BUILDING")), DeployState::Building);
    }

    #[test]
    fn submit_body_inlines_text_files() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert_text("index.html", "<h1>x</h1>");
        let request = DeploymentRequest {
            snapshot,
            token: "tok".to_string(),
            target_name: Some("my-site".to_string()),
        };

        let body = submit_body(&request);
        assert_eq!(body["name"], "my-site");
        assert_eq!(body["files"][0]["file"], "index.html");
        assert_eq!(body["files"][0]["data"], "<h1>x</h1>");
        assert!(body["files"][0].get("encoding").is_none());
    }

    #[test]
    fn submit_body_encodes_binary_files() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert_binary("logo.png", vec![0x89, 0x50]);
        let request = DeploymentRequest {
            snapshot,
            token: "tok".to_string(),
            target_name: None,
        };

        let body = submit_body(&request);
        assert_eq!(body["files"][0]["encoding"], "base64");
        // generated name keeps the product prefix
        assert!(body["name"].as_str().unwrap().starts_with("kode-project-"));
    }
}

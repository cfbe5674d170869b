//! Source-hosting repository creation.
//!
//! One call against the GitHub REST surface: create a repository and hand
//! back the URLs a caller needs to register it as a remote.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::domain::{Result, SyncError};

const DEFAULT_API_URL: &str = "https://api.github.com";

/// URLs returned for a freshly created repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRepo {
    /// Browser URL of the repository
    pub html_url: String,
    /// HTTPS URL to register as a remote
    pub clone_url: String,
}

pub struct RepoHostClient {
    client: reqwest::Client,
    api_url: String,
}

impl Default for RepoHostClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoHostClient {
    pub fn new() -> Self {
        Self::with_api_url(DEFAULT_API_URL)
    }

    /// Point the client at a different API origin (used by tests).
    pub fn with_api_url(api_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kodesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        RepoHostClient {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a repository under the authenticated user.
    ///
    /// `auto_init` is off: the caller pushes the initial history itself.
    pub async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
        token: &str,
    ) -> Result<CreatedRepo> {
        if name.trim().is_empty() {
            return Err(SyncError::InvalidInput(
                "repository name must be non-empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/user/repos", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .json(&json!({
                "name": name,
                "description": description,
                "private": private,
                "auto_init": false,
            }))
            .send()
            .await
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SyncError::AuthRejected(format!(
                "repository host returned {status}"
            )));
        }
        if !status.is_success() {
            #[derive(Deserialize)]
            struct ApiError {
                message: Option<String>,
            }
            let message = response
                .json::<ApiError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("repository host returned {status}"));
            return Err(SyncError::ProviderRejected(message));
        }

        let repo: CreatedRepo = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderRejected(format!("malformed response: {e}")))?;

        info!(url = %repo.html_url, "repository created");
        Ok(repo)
    }
}

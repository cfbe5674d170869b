//! Deployment orchestration.
//!
//! The orchestrator publishes a file snapshot to a named provider and
//! normalizes that provider's lifecycle into the shared
//! [`DeployState`](crate::domain::DeployState) vocabulary. Providers are
//! registered by name; orchestrator logic never branches on provider
//! identity outside of dispatch.

pub mod netlify;
pub mod provider;
pub mod vercel;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{DeployState, Deployment, DeploymentRequest, Result, SyncError};
use crate::snapshot::FileSnapshot;

pub use netlify::NetlifyProvider;
pub use provider::DeployProvider;
pub use vercel::VercelProvider;

/// Name-keyed provider registry. Adding a provider means registering an
/// implementation here, not editing orchestrator code.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DeployProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in providers.
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(VercelProvider::new()));
        registry.register(Arc::new(NetlifyProvider::new()));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn DeployProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DeployProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Submits snapshots and tracks deployment lifecycles for the session.
///
/// Submission failures past validation are values (`Deployment` in state
/// `Error` with a message), not errors, so callers render provider
/// failures uniformly. The session history never regresses a deployment's
/// state and never drops an entry.
pub struct DeployOrchestrator {
    registry: ProviderRegistry,
    history: Mutex<Vec<Deployment>>,
}

impl Default for DeployOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployOrchestrator {
    pub fn new() -> Self {
        Self::with_registry(ProviderRegistry::with_builtin_providers())
    }

    pub fn with_registry(registry: ProviderRegistry) -> Self {
        DeployOrchestrator {
            registry,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Publish a snapshot to a provider.
    ///
    /// Validation (non-empty snapshot, non-empty credential, recognized
    /// provider) happens before any network call and surfaces as a typed
    /// error — the caller asked for something malformed, which is not a
    /// provider outcome. Once dispatched, a provider failure comes back as
    /// a `Deployment` in state `Error`.
    pub async fn submit(
        &self,
        provider_name: &str,
        snapshot: FileSnapshot,
        token: &str,
        target_name: Option<String>,
    ) -> Result<Deployment> {
        if snapshot.is_empty() {
            return Err(SyncError::InvalidInput(
                "file snapshot is empty; nothing to deploy".to_string(),
            ));
        }
        if token.trim().is_empty() {
            return Err(SyncError::InvalidInput(
                "provider credential is empty".to_string(),
            ));
        }
        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| SyncError::UnsupportedProvider(provider_name.to_string()))?;

        info!(
            provider = %provider_name,
            files = snapshot.len(),
            snapshot_digest = %&snapshot.digest()[..12],
            "submitting deployment"
        );

        let request = DeploymentRequest {
            snapshot,
            token: token.to_string(),
            target_name,
        };

        let deployment = match provider.submit(&request).await {
            Ok(deployment) => deployment,
            Err(e) => {
                warn!(provider = %provider_name, error = %e, "deployment submission failed");
                Deployment::failed(provider_name, e.to_string())
            }
        };

        if !deployment.id.is_empty() {
            self.history.lock().await.push(deployment.clone());
        }
        Ok(deployment)
    }

    /// Fetch a deployment's current state and fold it into the session
    /// history.
    ///
    /// Returns `Ok(None)` when the provider no longer knows the id. The
    /// returned (and recorded) state never regresses: once the history has
    /// a deployment in `Ready` or `Error`, a stale poll result cannot move
    /// it back.
    pub async fn poll_status(
        &self,
        provider_name: &str,
        deploy_id: &str,
        token: &str,
    ) -> Result<Option<Deployment>> {
        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| SyncError::UnsupportedProvider(provider_name.to_string()))?;

        let Some(mut polled) = provider.poll_status(deploy_id, token).await? else {
            return Ok(None);
        };

        let mut history = self.history.lock().await;
        if let Some(recorded) = history.iter_mut().find(|d| d.id == polled.id) {
            if recorded.state.is_terminal() || polled.state.rank() < recorded.state.rank() {
                // stale or post-terminal read from the provider; keep
                // what was recorded (ready and error never swap)
                polled.state = recorded.state;
                polled.error_message = recorded.error_message.clone();
            }
            recorded.state = polled.state;
            recorded.url = polled.url.clone().or(recorded.url.take());
            recorded.error_message = polled
                .error_message
                .clone()
                .or(recorded.error_message.take());
        } else {
            history.push(polled.clone());
        }

        if polled.state == DeployState::Error {
            warn!(deploy_id = %deploy_id, "deployment failed");
        }
        Ok(Some(polled))
    }

    /// Deployments tracked this session, oldest first. Entries are never
    /// deleted by this crate.
    pub async fn history(&self) -> Vec<Deployment> {
        self.history.lock().await.clone()
    }
}

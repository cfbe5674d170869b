//! Hosting-provider capability set.
//!
//! A provider is anything that can accept a file snapshot and report the
//! resulting deployment's lifecycle. Each implementation owns its own
//! request/response shapes and its own state-vocabulary mapping table; the
//! orchestrator never branches on provider identity outside of registry
//! dispatch, so adding a provider means implementing this trait, not
//! editing orchestrator logic.

use async_trait::async_trait;

use crate::domain::{Deployment, DeploymentRequest, Result};

/// One hosting provider's create/status surface.
#[async_trait]
pub trait DeployProvider: Send + Sync {
    /// Registry key (e.g. `"vercel"`, `"netlify"`).
    fn name(&self) -> &str;

    /// Create a deployment from the request's snapshot.
    ///
    /// On success the returned deployment is in `Queued` or `Building`
    /// depending on where the provider starts work; an unrecognized
    /// initial state normalizes to `Queued`.
    async fn submit(&self, request: &DeploymentRequest) -> Result<Deployment>;

    /// Fetch the current state of a deployment by id.
    ///
    /// Returns `Ok(None)` when the provider no longer knows the id (404 —
    /// expired or invalid), so callers can distinguish "not found" from a
    /// transient fetch failure.
    async fn poll_status(&self, deploy_id: &str, token: &str) -> Result<Option<Deployment>>;
}

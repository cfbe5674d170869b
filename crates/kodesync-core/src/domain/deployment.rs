//! Deployment lifecycle types shared across hosting providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::FileSnapshot;

/// Normalized deployment state vocabulary.
///
/// Every provider's own vocabulary maps onto these four states via a fixed
/// per-provider table. Transitions are monotonic: `Ready` and `Error` are
/// terminal, and a recorded deployment never moves backwards (no
/// `Ready -> Building`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployState {
    Queued,
    Building,
    Ready,
    Error,
}

impl DeployState {
    /// Ordering rank used to enforce monotonicity. Terminal states share
    /// the top rank; `Building -> Ready` and `Building -> Error` are the
    /// only transitions out of `Building`.
    pub fn rank(self) -> u8 {
        match self {
            DeployState::Queued => 0,
            DeployState::Building => 1,
            DeployState::Ready | DeployState::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeployState::Ready | DeployState::Error)
    }
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeployState::Queued => "queued",
            DeployState::Building => "building",
            DeployState::Ready => "ready",
            DeployState::Error => "error",
        };
        f.write_str(s)
    }
}

/// A deployment as tracked by this crate.
///
/// Created at submission time, mutated only by status-poll results,
/// retained in the orchestrator's session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Provider-assigned deployment id
    pub id: String,
    /// Provider name this deployment was submitted to
    pub provider: String,
    /// Public URL once the provider assigns one
    pub url: Option<String>,
    pub state: DeployState,
    pub created_at: DateTime<Utc>,
    /// Human-readable failure message when `state == Error`
    pub error_message: Option<String>,
}

impl Deployment {
    /// A submit-time failure expressed as a value rather than an error,
    /// so callers render provider failures uniformly.
    pub fn failed(provider: &str, message: String) -> Self {
        Deployment {
            id: String::new(),
            provider: provider.to_string(),
            url: None,
            state: DeployState::Error,
            created_at: Utc::now(),
            error_message: Some(message),
        }
    }
}

/// Everything a provider needs to create a deployment.
///
/// A value object; it has no identity until a provider accepts it and
/// assigns a deployment id.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub snapshot: FileSnapshot,
    /// Bearer token for the provider API
    pub token: String,
    /// Optional site/project name; providers generate one when absent
    pub target_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_share_top_rank() {
        assert!(DeployState::Ready.rank() > DeployState::Building.rank());
        assert_eq!(DeployState::Ready.rank(), DeployState::Error.rank());
        assert!(DeployState::Queued.rank() < DeployState::Building.rank());
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&DeployState::Building).unwrap();
        assert_eq!(json, "\"building\"");
    }

    #[test]
    fn failed_deployment_carries_message() {
        let d = Deployment::failed("vercel", "quota exceeded".to_string());
        assert_eq!(d.state, DeployState::Error);
        assert_eq!(d.error_message.as_deref(), Some("quota exceeded"));
        assert!(d.url.is_none());
    }
}

//! Orchestrator behavior against in-memory fake providers.
//!
//! The fakes count calls, so validation properties ("no network on an
//! empty snapshot") are observable, and they script submit/poll outcomes
//! so lifecycle normalization is exercised without HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use kodesync_core::deploy::{DeployOrchestrator, DeployProvider, ProviderRegistry};
use kodesync_core::{DeployState, Deployment, DeploymentRequest, FileSnapshot, Result, SyncError};

/// Scripted provider that counts every call it receives.
struct ScriptedProvider {
    submit_result: std::result::Result<(), String>,
    poll_state: Option<DeployState>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn succeeding(poll_state: DeployState) -> Arc<Self> {
        Arc::new(ScriptedProvider {
            submit_result: Ok(()),
            poll_state: Some(poll_state),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(ScriptedProvider {
            submit_result: Err(message.to_string()),
            poll_state: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeployProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, _request: &DeploymentRequest) -> Result<Deployment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.submit_result {
            Ok(()) => Ok(Deployment {
                id: "d1".to_string(),
                provider: "scripted".to_string(),
                url: Some("p.example.com".to_string()),
                state: DeployState::Queued,
                created_at: Utc::now(),
                error_message: None,
            }),
            Err(message) => Err(SyncError::ProviderRejected(message.clone())),
        }
    }

    async fn poll_status(&self, deploy_id: &str, _token: &str) -> Result<Option<Deployment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(state) = self.poll_state else {
            return Ok(None);
        };
        Ok(Some(Deployment {
            id: deploy_id.to_string(),
            provider: "scripted".to_string(),
            url: Some("p.example.com".to_string()),
            state,
            created_at: Utc::now(),
            error_message: (state == DeployState::Error).then(|| "build failed".to_string()),
        }))
    }
}

/// Provider whose polls report a scripted sequence of states, in order.
struct SequencedProvider {
    states: std::sync::Mutex<Vec<DeployState>>,
}

#[async_trait]
impl DeployProvider for SequencedProvider {
    fn name(&self) -> &str {
        "sequenced"
    }

    async fn submit(&self, _request: &DeploymentRequest) -> Result<Deployment> {
        Ok(Deployment {
            id: "d1".to_string(),
            provider: "sequenced".to_string(),
            url: Some("p.example.com".to_string()),
            state: DeployState::Queued,
            created_at: Utc::now(),
            error_message: None,
        })
    }

    async fn poll_status(&self, deploy_id: &str, _token: &str) -> Result<Option<Deployment>> {
        let mut states = self.states.lock().unwrap();
        if states.is_empty() {
            return Ok(None);
        }
        let state = states.remove(0);
        Ok(Some(Deployment {
            id: deploy_id.to_string(),
            provider: "sequenced".to_string(),
            url: Some("p.example.com".to_string()),
            state,
            created_at: Utc::now(),
            error_message: (state == DeployState::Error).then(|| "build failed".to_string()),
        }))
    }
}

fn orchestrator_with(provider: Arc<ScriptedProvider>) -> DeployOrchestrator {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    DeployOrchestrator::with_registry(registry)
}

fn one_page_snapshot() -> FileSnapshot {
    let mut snapshot = FileSnapshot::new();
    snapshot.insert_text("index.html", "<h1>x</h1>");
    snapshot
}

#[tokio::test]
async fn empty_snapshot_is_rejected_with_zero_provider_calls() {
    let provider = ScriptedProvider::succeeding(DeployState::Ready);
    let orchestrator = orchestrator_with(provider.clone());

    let err = orchestrator
        .submit("scripted", FileSnapshot::new(), "tok", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
    assert_eq!(provider.calls(), 0, "no network call may be made");
}

#[tokio::test]
async fn unsupported_provider_is_rejected_with_zero_provider_calls() {
    let provider = ScriptedProvider::succeeding(DeployState::Ready);
    let orchestrator = orchestrator_with(provider.clone());

    let err = orchestrator
        .submit("vercel", one_page_snapshot(), "tok", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedProvider(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn successful_submit_starts_queued_with_provider_url() {
    let orchestrator = orchestrator_with(ScriptedProvider::succeeding(DeployState::Building));

    let deployment = orchestrator
        .submit("scripted", one_page_snapshot(), "tok", None)
        .await
        .unwrap();

    assert_eq!(deployment.id, "d1");
    assert!(matches!(
        deployment.state,
        DeployState::Queued | DeployState::Building
    ));
    assert_eq!(deployment.url.as_deref(), Some("p.example.com"));
}

#[tokio::test]
async fn provider_failure_is_a_value_not_an_error() {
    let orchestrator = orchestrator_with(ScriptedProvider::failing("quota exceeded"));

    let deployment = orchestrator
        .submit("scripted", one_page_snapshot(), "tok", None)
        .await
        .unwrap();

    assert_eq!(deployment.state, DeployState::Error);
    let message = deployment.error_message.unwrap();
    assert!(message.contains("quota exceeded"));
    // a failed submission never got an id and is not history
    assert!(orchestrator.history().await.is_empty());
}

#[tokio::test]
async fn error_poll_result_normalizes_to_error_state() {
    let orchestrator = orchestrator_with(ScriptedProvider::succeeding(DeployState::Error));
    orchestrator
        .submit("scripted", one_page_snapshot(), "tok", None)
        .await
        .unwrap();

    let polled = orchestrator
        .poll_status("scripted", "d1", "tok")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(polled.state, DeployState::Error);
    assert_eq!(polled.error_message.as_deref(), Some("build failed"));
}

#[tokio::test]
async fn poll_of_unknown_id_is_none_not_an_error() {
    let provider = Arc::new(ScriptedProvider {
        submit_result: Ok(()),
        poll_state: None,
        calls: AtomicUsize::new(0),
    });
    let orchestrator = orchestrator_with(provider);

    let polled = orchestrator
        .poll_status("scripted", "expired", "tok")
        .await
        .unwrap();
    assert!(polled.is_none());
}

#[tokio::test]
async fn history_retains_each_submission() {
    let orchestrator = orchestrator_with(ScriptedProvider::succeeding(DeployState::Ready));
    orchestrator
        .submit("scripted", one_page_snapshot(), "tok", None)
        .await
        .unwrap();

    let history = orchestrator.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, "d1");
    assert_eq!(history[0].state, DeployState::Queued);

    // polling folds the new state into the same entry
    orchestrator
        .poll_status("scripted", "d1", "tok")
        .await
        .unwrap();
    let history = orchestrator.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state, DeployState::Ready);
}

#[tokio::test]
async fn ready_deployment_stays_ready_after_late_error_report() {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(SequencedProvider {
        states: std::sync::Mutex::new(vec![DeployState::Ready, DeployState::Error]),
    }));
    let orchestrator = DeployOrchestrator::with_registry(registry);
    orchestrator
        .submit("sequenced", one_page_snapshot(), "tok", None)
        .await
        .unwrap();

    let first = orchestrator
        .poll_status("sequenced", "d1", "tok")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.state, DeployState::Ready);

    // the provider now claims the build failed; ready is terminal, so
    // the session keeps the successful outcome
    let second = orchestrator
        .poll_status("sequenced", "d1", "tok")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.state, DeployState::Ready);
    assert!(second.error_message.is_none());
    assert_eq!(orchestrator.history().await[0].state, DeployState::Ready);
}

#[tokio::test]
async fn polls_for_different_ids_are_independent() {
    let orchestrator = orchestrator_with(ScriptedProvider::succeeding(DeployState::Building));

    // concurrent polls for distinct ids; neither blocks the other and
    // both land in history as separate entries
    let (a, b) = tokio::join!(
        orchestrator.poll_status("scripted", "d-alpha", "tok"),
        orchestrator.poll_status("scripted", "d-beta", "tok"),
    );
    assert_eq!(a.unwrap().unwrap().id, "d-alpha");
    assert_eq!(b.unwrap().unwrap().id, "d-beta");
    assert_eq!(orchestrator.history().await.len(), 2);
}

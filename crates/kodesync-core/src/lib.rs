//! KodeSync Core Library
//!
//! Repository synchronization and deployment orchestration for the Kode
//! in-browser development environment: version-control operations over a
//! sandboxed filesystem root, plus publishing a project's file tree to a
//! hosting provider with normalized status tracking.

pub mod credentials;
pub mod deploy;
pub mod domain;
pub mod repo_host;
pub mod snapshot;
pub mod telemetry;
pub mod vcs;

pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use deploy::{
    DeployOrchestrator, DeployProvider, NetlifyProvider, ProviderRegistry, VercelProvider,
};
pub use domain::{
    Author, CommitRecord, DeployState, Deployment, DeploymentRequest, Identity, Result,
    StatusEntry, SyncError,
};
pub use repo_host::{CreatedRepo, RepoHostClient};
pub use snapshot::{FileContent, FileSnapshot};
pub use telemetry::init_tracing;
pub use vcs::RepoSession;

/// KodeSync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

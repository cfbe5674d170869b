//! Domain models for KodeSync.
//!
//! Canonical definitions for the core entities:
//! - `Identity`: Per-call author identity and remote credential
//! - `CommitRecord` / `StatusEntry`: Repository inspection results
//! - `Deployment` / `DeployState`: Normalized deployment lifecycle

pub mod deployment;
pub mod error;
pub mod identity;

// Re-export main types and errors
pub use deployment::{DeployState, Deployment, DeploymentRequest};
pub use error::{Result, SyncError};
pub use identity::{Author, CommitRecord, Identity, StatusEntry};

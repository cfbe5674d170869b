//! Author identity and repository inspection types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-call author identity and remote credential.
///
/// Supplied on every operation that stamps a commit or talks to a remote.
/// Never persisted by this crate; callers that want persistence go through
/// a [`crate::credentials::CredentialStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Commit author name (e.g. "Ada Lovelace")
    pub name: String,
    /// Commit author email
    pub email: String,
    /// Bearer-style token presented as the transport username on
    /// smart-HTTP fetch/push
    pub token: String,
}

impl Identity {
    pub fn new(name: &str, email: &str, token: &str) -> Self {
        Identity {
            name: name.to_string(),
            email: email.to_string(),
            token: token.to_string(),
        }
    }
}

/// Commit author as recorded in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// A single commit, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full object id (40 hex chars for SHA-1 repositories)
    pub oid: String,
    /// Commit subject line
    pub message: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

/// One modified path from `status()`.
///
/// The underlying engine reports a three-way comparison (HEAD vs. working
/// tree vs. stage); this crate collapses it to a single modified flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: String,
    pub modified: bool,
}

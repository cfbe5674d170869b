//! Domain-level error taxonomy for KodeSync.

/// KodeSync domain errors.
///
/// Every remote or filesystem failure a caller can observe surfaces as one
/// of these kinds with a short human-readable message. Credentials are
/// never embedded in messages (see `vcs::redact`).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("authentication rejected by remote: {0}")]
    AuthRejected(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("push rejected (non-fast-forward): {0}")]
    NonFastForward(String),

    #[error("merge conflict: {0}")]
    MergeConflict(String),

    #[error("remote already exists: {0}")]
    RemoteExists(String),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("target directory is not empty: {0}")]
    NotEmpty(String),

    #[error("nothing to commit (staging area is empty)")]
    EmptyCommit,

    #[error("unsupported deployment provider: {0}")]
    UnsupportedProvider(String),

    #[error("provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("vcs engine error: {0}")]
    Engine(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for KodeSync domain operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::AuthRejected("remote returned 401".to_string());
        assert!(err.to_string().contains("authentication rejected"));

        let err = SyncError::NonFastForward("origin/main has diverged".to_string());
        assert!(err.to_string().contains("non-fast-forward"));

        let err = SyncError::EmptyCommit;
        assert!(err.to_string().contains("nothing to commit"));

        let err = SyncError::UnsupportedProvider("surge".to_string());
        assert!(err.to_string().contains("surge"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SyncError = io.into();
        assert!(matches!(err, SyncError::Io(_)));
    }
}

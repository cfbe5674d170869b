//! Credential storage boundary.
//!
//! This crate never persists tokens itself; persistence is an external
//! key-value collaborator injected at the boundary. The core only reads
//! tokens per call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Result;

/// External token store keyed by provider name (`"vercel"`, `"netlify"`,
/// `"github"`, ...).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the token for a provider, if one is stored.
    async fn get(&self, provider: &str) -> Result<Option<String>>;

    /// Store or replace a provider's token.
    async fn set(&self, provider: &str, token: &str) -> Result<()>;

    /// Forget a provider's token. No-op if absent.
    async fn remove(&self, provider: &str) -> Result<()>;
}

/// In-memory credential store for tests and in-process callers.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: &str) -> Result<Option<String>> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.get(provider).cloned())
    }

    async fn set(&self, provider: &str, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(provider.to_string(), token.to_string());
        Ok(())
    }

    async fn remove(&self, provider: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.remove(provider);
        Ok(())
    }
}

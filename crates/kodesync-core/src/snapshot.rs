//! File-tree snapshots handed to deployment providers.
//!
//! A snapshot is an ordered map of repository-relative paths to file
//! contents, built either directly by a caller or by walking a repository
//! root (skipping version-control metadata). Contents are UTF-8 text or
//! declared binary; providers decide per-file how to put each variant on
//! the wire.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Result, SyncError};

/// Content of a single snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    /// UTF-8 text, carried verbatim
    Text(String),
    /// Declared-binary content, base64-encoded where a provider's wire
    /// format requires a string payload
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(s) => s.as_bytes(),
            FileContent::Binary(b) => b,
        }
    }
}

/// Ordered path -> content map published to a provider.
///
/// Paths are repository-relative with `/` separators and no leading slash.
/// BTreeMap ordering keeps the content digest stable across identical
/// trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    files: BTreeMap<String, FileContent>,
}

impl FileSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a UTF-8 text file.
    pub fn insert_text(&mut self, path: &str, content: &str) {
        self.files
            .insert(normalize_path(path), FileContent::Text(content.to_string()));
    }

    /// Add a declared-binary file.
    pub fn insert_binary(&mut self, path: &str, content: Vec<u8>) {
        self.files
            .insert(normalize_path(path), FileContent::Binary(content));
    }

    /// Walk a repository root into a snapshot, skipping the `.git`
    /// directory. Regular files only; symlinks and other specials are
    /// ignored. Files that are not valid UTF-8 are carried as binary.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut snapshot = FileSnapshot::new();
        collect_files(root, root, &mut snapshot)?;
        Ok(snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileContent)> {
        self.files.iter()
    }

    /// SHA-256 digest over paths and contents, hex-encoded.
    ///
    /// Used for logging and deduplication; two identical trees always
    /// produce the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, content) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(content.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches('/').replace('\\', "/")
}

fn collect_files(root: &Path, dir: &Path, snapshot: &mut FileSnapshot) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            collect_files(root, &path, snapshot)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(root)
                .map_err(|e| SyncError::Engine(format!("path outside root: {e}")))?
                .to_string_lossy()
                .replace('\\', "/");
            let bytes = fs::read(&path)?;
            match String::from_utf8(bytes) {
                Ok(text) => snapshot.insert_text(&rel, &text),
                Err(e) => snapshot.insert_binary(&rel, e.into_bytes()),
            }
        }
        // symlinks, sockets etc. are skipped
    }
    Ok(())
}

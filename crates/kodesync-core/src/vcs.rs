//! Repository session over a sandboxed filesystem root.
//!
//! [`RepoSession`] wraps narrowly-scoped version-control operations (init,
//! clone, stage, commit, push, pull, status, log, remote registration) by
//! orchestrating the `git` engine against a fixed root directory. It never
//! implements object storage or merging itself; it classifies the engine's
//! failures into the [`SyncError`] taxonomy and guarantees per-handle
//! ordering.
//!
//! Remote authentication follows the smart-HTTP convention of presenting a
//! bearer-style token as the transport username. Tokens are injected into
//! the remote URL for the duration of a call and redacted from any message
//! that can reach a caller.

use std::path::{Path, PathBuf};
use std::process::Output;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{Author, CommitRecord, Identity, Result, StatusEntry, SyncError};

/// Log format shared by `commit` and `log`: fields separated by the ASCII
/// unit separator so subjects containing spaces survive parsing.
const LOG_FORMAT: &str = "%H%x1f%ct%x1f%an%x1f%ae%x1f%s";

/// A version-control session bound to one sandbox root.
///
/// Operations on one session execute strictly in submission order: every
/// operation holds the session's mutex across all of its suspension points,
/// and waiters are queued FIFO. A caller issuing `add_files -> commit ->
/// push` can rely on each step observing the previous one's effects even
/// on a multi-threaded runtime.
///
/// The root directory is exclusively owned by the session; no operation
/// touches paths outside it.
pub struct RepoSession {
    root: PathBuf,
    op_lock: Mutex<()>,
}

impl RepoSession {
    /// Bind a session to a sandbox root. The directory must exist; the
    /// repository inside it may not (use [`RepoSession::init`] or
    /// [`RepoSession::clone_from`] to create one).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RepoSession {
            root: root.into(),
            op_lock: Mutex::new(()),
        }
    }

    /// The sandbox root this session operates on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create repository metadata with `main` as the primary branch and
    /// record the author identity in local config.
    pub async fn init(&self, identity: &Identity) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        if self.root.join(".git").exists() {
            return Err(SyncError::AlreadyInitialized(
                self.root.display().to_string(),
            ));
        }

        self.git(&["init", "--initial-branch", "main"], &[]).await?;
        self.git(&["config", "user.name", identity.name.as_str()], &[])
            .await?;
        self.git(&["config", "user.email", identity.email.as_str()], &[])
            .await?;

        info!(root = %self.root.display(), "repository initialized");
        Ok(())
    }

    /// Fetch a remote's default branch into an empty root.
    ///
    /// Shallow, single-branch: only the most recent history of one branch
    /// is transferred. Fails with [`SyncError::NotEmpty`] before any
    /// network traffic if the root already contains files.
    pub async fn clone_from(&self, url: &str, identity: &Identity) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        if dir_has_entries(&self.root)? {
            return Err(SyncError::NotEmpty(self.root.display().to_string()));
        }

        let authed = authenticated_url(url, &identity.token);
        self.git_authed(
            &["clone", "--depth", "1", "--single-branch", authed.as_str(), "."],
            &[],
            &identity.token,
        )
        .await?;

        info!(url = %redact(url, &identity.token), "repository cloned");
        Ok(())
    }

    /// Stage the given paths, or the entire tree when `paths` is empty.
    ///
    /// Staging an unchanged or empty tree is a valid no-op.
    pub async fn add_files(&self, paths: &[String]) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        if paths.is_empty() {
            self.git(&["add", "--all"], &[]).await?;
        } else {
            let mut args = vec!["add", "--"];
            args.extend(paths.iter().map(String::as_str));
            self.git(&args, &[]).await?;
        }

        debug!(count = paths.len(), "paths staged");
        Ok(())
    }

    /// Commit the staging area.
    ///
    /// Empty commits are rejected by policy: if nothing is staged this
    /// returns [`SyncError::EmptyCommit`] without touching history. The
    /// message must be non-empty.
    pub async fn commit(&self, message: &str, identity: &Identity) -> Result<CommitRecord> {
        let _guard = self.op_lock.lock().await;

        if message.trim().is_empty() {
            return Err(SyncError::InvalidInput(
                "commit message must be non-empty".to_string(),
            ));
        }

        // `diff --cached --quiet` exits 0 when the stage matches HEAD
        // (or the empty tree on an unborn branch).
        let staged = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(&self.root)
            .output()
            .await?;
        if staged.status.success() {
            return Err(SyncError::EmptyCommit);
        }

        self.git(&["commit", "-m", message], &author_env(identity))
            .await?;

        let format_arg = format!("--format={LOG_FORMAT}");
        let output = self
            .git(&["log", "-1", format_arg.as_str()], &[])
            .await?;
        let line = String::from_utf8_lossy(&output.stdout);
        let record = parse_log_line(line.trim())
            .ok_or_else(|| SyncError::Engine("could not parse commit record".to_string()))?;

        info!(oid = %record.oid, "committed");
        Ok(record)
    }

    /// Push a branch to a remote.
    ///
    /// A diverged remote surfaces as [`SyncError::NonFastForward`]; this
    /// session never merges or rewrites history on the caller's behalf —
    /// pulling first is a caller decision.
    pub async fn push(&self, remote: &str, branch: &str, identity: &Identity) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let url = self.resolve_remote_url(remote).await?;
        let authed = authenticated_url(&url, &identity.token);
        self.git_authed(&["push", authed.as_str(), branch], &[], &identity.token)
            .await?;

        info!(remote = %remote, branch = %branch, "pushed");
        Ok(())
    }

    /// Pull a branch from a remote (fast-forward or the engine's default
    /// merge). Conflicts are surfaced as [`SyncError::MergeConflict`], not
    /// resolved here.
    pub async fn pull(&self, remote: &str, branch: &str, identity: &Identity) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let url = self.resolve_remote_url(remote).await?;
        let authed = authenticated_url(&url, &identity.token);
        // merge (not rebase) on divergence; newer git refuses to pick a
        // reconciliation strategy without this
        self.git_authed(
            &["-c", "pull.rebase=false", "pull", authed.as_str(), branch],
            &author_env(identity),
            &identity.token,
        )
        .await?;

        info!(remote = %remote, branch = %branch, "pulled");
        Ok(())
    }

    /// Register a named remote. Fails with [`SyncError::RemoteExists`] if
    /// the name is taken.
    pub async fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let output = Command::new("git")
            .args(["remote", "add", name, url])
            .current_dir(&self.root)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists") {
                return Err(SyncError::RemoteExists(name.to_string()));
            }
            return Err(SyncError::Engine(stderr.trim().to_string()));
        }

        info!(remote = %name, "remote added");
        Ok(())
    }

    /// Current branch name, with `"main"` as the documented fallback for a
    /// detached HEAD or any underlying failure (advisory helper, never
    /// errors).
    pub async fn current_branch(&self) -> String {
        let _guard = self.op_lock.lock().await;

        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(&self.root)
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => {
                let branch = String::from_utf8_lossy(&o.stdout).trim().to_string();
                if branch.is_empty() || branch == "HEAD" {
                    "main".to_string()
                } else {
                    branch
                }
            }
            _ => "main".to_string(),
        }
    }

    /// Modified paths as of call time (never cached). Degrades to an empty
    /// list on underlying failure (advisory helper, never errors).
    pub async fn status(&self) -> Vec<StatusEntry> {
        let _guard = self.op_lock.lock().await;

        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(&self.root)
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => {
                parse_porcelain(&String::from_utf8_lossy(&o.stdout))
            }
            _ => {
                warn!("status unavailable, returning empty list");
                Vec::new()
            }
        }
    }

    /// Commit history, most recent first, bounded by `depth`. A repository
    /// with no commits yet yields an empty list.
    pub async fn log(&self, depth: usize) -> Result<Vec<CommitRecord>> {
        let _guard = self.op_lock.lock().await;

        let depth_arg = depth.to_string();
        let format_arg = format!("--format={LOG_FORMAT}");
        let output = Command::new("git")
            .args(["log", "-n", depth_arg.as_str(), format_arg.as_str()])
            .current_dir(&self.root)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("does not have any commits")
                || stderr.contains("unknown revision")
            {
                return Ok(Vec::new());
            }
            return Err(SyncError::Engine(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_log_line).collect())
    }

    /// Resolve a remote argument to a fetch/push URL: names go through the
    /// engine's remote table, URLs pass through untouched.
    async fn resolve_remote_url(&self, remote: &str) -> Result<String> {
        if remote.contains("://") || remote.starts_with("git@") || remote.starts_with('/') {
            return Ok(remote.to_string());
        }

        let output = Command::new("git")
            .args(["remote", "get-url", remote])
            .current_dir(&self.root)
            .output()
            .await?;
        if !output.status.success() {
            return Err(SyncError::NotFound(format!("remote '{remote}'")));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git with no credential in the argument list.
    async fn git(&self, args: &[&str], envs: &[(String, String)]) -> Result<Output> {
        self.git_authed(args, envs, "").await
    }

    /// Run git, classifying a non-zero exit into the error taxonomy and
    /// redacting `token` from anything that reaches the caller.
    async fn git_authed(
        &self,
        args: &[&str],
        envs: &[(String, String)],
        token: &str,
    ) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        let output = cmd
            .output()
            .await
            .map_err(|e| SyncError::Engine(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            // conflict notices can land on stdout while stderr carries
            // only the trailing error line; classify over both
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let combined = format!("{}\n{}", stdout.trim(), stderr.trim());
            return Err(classify_engine_failure(redact(combined.trim(), token).as_str()));
        }
        Ok(output)
    }
}

/// Commit identity environment for operations that may create commits.
fn author_env(identity: &Identity) -> [(String, String); 4] {
    [
        ("GIT_AUTHOR_NAME".to_string(), identity.name.clone()),
        ("GIT_AUTHOR_EMAIL".to_string(), identity.email.clone()),
        ("GIT_COMMITTER_NAME".to_string(), identity.name.clone()),
        ("GIT_COMMITTER_EMAIL".to_string(), identity.email.clone()),
    ]
}

/// Present a bearer token as the transport username on an HTTP(S) URL.
/// Non-HTTP URLs (ssh, local paths) pass through unchanged, as do URLs
/// that already carry userinfo and calls with no token.
fn authenticated_url(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    for scheme in ["https://", "http://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            if rest.contains('@') {
                return url.to_string();
            }
            return format!("{scheme}{token}@{rest}");
        }
    }
    url.to_string()
}

/// Strip a credential from text before it can reach logs or callers.
fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        return text.to_string();
    }
    text.replace(token, "***")
}

/// Map git stderr onto the error taxonomy.
///
/// Auth patterns are checked before network ones: an HTTP 401/403 also
/// mentions "unable to access", which would otherwise read as transport
/// failure.
fn classify_engine_failure(stderr: &str) -> SyncError {
    let message = stderr.trim().to_string();

    const AUTH: &[&str] = &[
        "Authentication failed",
        "could not read Username",
        "Invalid username or password",
        "returned error: 401",
        "returned error: 403",
        "Permission denied",
    ];
    const FAST_FORWARD: &[&str] = &["non-fast-forward", "fetch first", "[rejected]"];
    const CONFLICT: &[&str] = &[
        "CONFLICT",
        "Automatic merge failed",
        "needs merge",
        "would be overwritten by merge",
    ];
    const NETWORK: &[&str] = &[
        "Could not resolve host",
        "unable to access",
        "Connection refused",
        "Connection reset",
        "timed out",
        "early EOF",
        "remote end hung up",
    ];

    if AUTH.iter().any(|p| stderr.contains(p)) {
        SyncError::AuthRejected(message)
    } else if FAST_FORWARD.iter().any(|p| stderr.contains(p)) {
        SyncError::NonFastForward(message)
    } else if CONFLICT.iter().any(|p| stderr.contains(p)) {
        SyncError::MergeConflict(message)
    } else if NETWORK.iter().any(|p| stderr.contains(p)) {
        SyncError::NetworkError(message)
    } else {
        SyncError::Engine(message)
    }
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_some())
}

/// Parse one `LOG_FORMAT` line into a [`CommitRecord`].
fn parse_log_line(line: &str) -> Option<CommitRecord> {
    let mut fields = line.split('\u{1f}');
    let oid = fields.next()?.to_string();
    if oid.is_empty() {
        return None;
    }
    let epoch: i64 = fields.next()?.parse().ok()?;
    let name = fields.next()?.to_string();
    let email = fields.next()?.to_string();
    let message = fields.next().unwrap_or_default().to_string();

    Some(CommitRecord {
        oid,
        message,
        author: Author { name, email },
        timestamp: DateTime::<Utc>::from_timestamp(epoch, 0)?,
    })
}

/// Parse `status --porcelain` output into modified-path entries.
/// Renames report the new path.
fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            let path = match path.split_once(" -> ") {
                Some((_, new)) => new,
                None => path,
            };
            StatusEntry {
                path: path.trim_matches('"').to_string(),
                modified: true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_becomes_transport_username() {
        assert_eq!(
            authenticated_url("https://github.com/a/b.git", "tok"),
            "https://tok@github.com/a/b.git"
        );
        assert_eq!(
            authenticated_url("http://host/repo", "tok"),
            "http://tok@host/repo"
        );
    }

    #[test]
    fn non_http_urls_pass_through() {
        assert_eq!(
            authenticated_url("git@github.com:a/b.git", "tok"),
            "git@github.com:a/b.git"
        );
        assert_eq!(authenticated_url("/tmp/bare.git", "tok"), "/tmp/bare.git");
    }

    #[test]
    fn existing_userinfo_is_preserved() {
        assert_eq!(
            authenticated_url("https://user@host/repo", "tok"),
            "https://user@host/repo"
        );
    }

    #[test]
    fn redact_strips_token() {
        let msg = redact("fatal: unable to access 'https://tok@host/x'", "tok");
        assert!(!msg.contains("tok@"));
        assert!(msg.contains("***@"));
    }

    #[test]
    fn auth_failures_classify_before_network() {
        let err = classify_engine_failure(
            "fatal: unable to access 'https://host/x': The requested URL returned error: 403",
        );
        assert!(matches!(err, SyncError::AuthRejected(_)));
    }

    #[test]
    fn divergent_push_classifies_as_non_fast_forward() {
        let err = classify_engine_failure(
            "! [rejected] main -> main (fetch first)\nerror: failed to push some refs",
        );
        assert!(matches!(err, SyncError::NonFastForward(_)));
    }

    #[test]
    fn conflict_classifies_as_merge_conflict() {
        let err = classify_engine_failure(
            "CONFLICT (content): Merge conflict in index.html\nAutomatic merge failed",
        );
        assert!(matches!(err, SyncError::MergeConflict(_)));
    }

    #[test]
    fn unreachable_host_classifies_as_network() {
        let err = classify_engine_failure("fatal: Could not resolve host: github.invalid");
        assert!(matches!(err, SyncError::NetworkError(_)));
    }

    #[test]
    fn unknown_failures_fall_back_to_engine() {
        let err = classify_engine_failure("fatal: bad object HEAD");
        assert!(matches!(err, SyncError::Engine(_)));
    }

    #[test]
    fn porcelain_lines_parse_to_paths() {
        let entries = parse_porcelain(" M src/app.js\n?? new.txt\nR  old.txt -> renamed.txt\n");
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/app.js", "new.txt", "renamed.txt"]);
        assert!(entries.iter().all(|e| e.modified));
    }

    #[test]
    fn log_line_parses_to_record() {
        let line = "abc123\u{1f}1700000000\u{1f}Ada\u{1f}ada@x.com\u{1f}first commit";
        let record = parse_log_line(line).unwrap();
        assert_eq!(record.oid, "abc123");
        assert_eq!(record.author.name, "Ada");
        assert_eq!(record.message, "first commit");
    }

    #[test]
    fn empty_log_line_is_skipped() {
        assert!(parse_log_line("").is_none());
    }
}

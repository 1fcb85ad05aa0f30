//! Repository host abstraction.
//!
//! Provides the `RepoHost` trait over the repository hosting API so the
//! orchestrator and tests are decoupled from the concrete GitHub client.
//! Writes are conditional on the version token read with the file; the
//! host never overwrites silently.

pub mod github;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FileSnapshot, RepoRef, TreeEntry};

/// Errors from repository host calls. Callers branch on kind: a conflict
/// skips the file, auth failures halt the session, transient failures are
/// file-level errors.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("version conflict writing {0}: content changed upstream")]
    Conflict(String),

    #[error("transient host error: {0}")]
    Transient(String),

    #[error("host API error: {0}")]
    Api(String),

    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),
}

/// Abstract repository host contract.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Resolve the repository's default branch name.
    async fn default_branch(&self, repo: &RepoRef) -> Result<String, HostError>;

    /// One recursive listing of the whole tree at `branch`. Large trees
    /// (thousands of entries) come back from a single call.
    async fn list_tree(&self, repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, HostError>;

    /// Fetch current content and version token for a path.
    async fn read_file(&self, repo: &RepoRef, path: &str) -> Result<FileSnapshot, HostError>;

    /// Conditionally update a file (compare-and-swap on the version
    /// token). Returns the new version token on success; fails with
    /// [`HostError::Conflict`] when `expected_version` is stale.
    async fn write_file(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        expected_version: &str,
        message: &str,
    ) -> Result<String, HostError>;
}

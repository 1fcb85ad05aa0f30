//! GitHub REST implementation of [`RepoHost`].
//!
//! Uses the repos/contents/git-trees endpoints. File bodies travel
//! base64-encoded through [`crate::codec`]; conditional writes pass the
//! previously read blob SHA so the host rejects stale updates atomically.

use async_trait::async_trait;
use serde::Deserialize;

use crate::codec;
use crate::models::{FileSnapshot, RepoRef, TreeEntry};

use super::{HostError, RepoHost};

const API_BASE: &str = "https://api.github.com";

/// GitHub-backed repository host.
pub struct GithubHost {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Deserialize)]
struct WrittenContent {
    sha: String,
}

impl GithubHost {
    /// Create a host client with a repository access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(API_BASE, token)
    }

    /// Create a host client against a specific API base URL (useful for
    /// GitHub Enterprise or a stub server in tests).
    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sovereign/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    /// Map a non-success response into a distinguished [`HostError`].
    async fn error_for(context: &str, response: reqwest::Response) -> HostError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => HostError::NotFound(context.to_string()),
            401 | 403 => HostError::Auth(format!("{context}: HTTP {status}")),
            // GitHub reports a stale SHA as 409 (conflict) or 422.
            409 | 422 => HostError::Conflict(context.to_string()),
            s if s >= 500 => HostError::Transient(format!("{context}: HTTP {status}")),
            _ => HostError::Api(format!("{context}: HTTP {status}: {body}")),
        }
    }

    fn transport_error(context: &str, err: reqwest::Error) -> HostError {
        HostError::Transient(format!("{context}: {err}"))
    }
}

#[async_trait]
impl RepoHost for GithubHost {
    async fn default_branch(&self, repo: &RepoRef) -> Result<String, HostError> {
        let url = format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("repo lookup", e))?;

        if !response.status().is_success() {
            return Err(Self::error_for(&repo.to_string(), response).await);
        }

        let info: RepoInfo = response
            .json()
            .await
            .map_err(|e| HostError::Api(format!("repo lookup: {e}")))?;
        Ok(info.default_branch)
    }

    async fn list_tree(&self, repo: &RepoRef, branch: &str) -> Result<Vec<TreeEntry>, HostError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.base_url, repo.owner, repo.name, branch
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("tree listing", e))?;

        if !response.status().is_success() {
            return Err(Self::error_for("tree listing", response).await);
        }

        let tree: TreeResponse = response
            .json()
            .await
            .map_err(|e| HostError::Api(format!("tree listing: {e}")))?;
        if tree.truncated {
            tracing::warn!("tree listing truncated by host; queue covers a partial tree");
        }
        Ok(tree.tree)
    }

    async fn read_file(&self, repo: &RepoRef, path: &str) -> Result<FileSnapshot, HostError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, repo.owner, repo.name, path
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error(path, e))?;

        if !response.status().is_success() {
            return Err(Self::error_for(path, response).await);
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| HostError::Api(format!("{path}: {e}")))?;
        let content = codec::decode(&contents.content)?;
        Ok(FileSnapshot {
            path: path.to_string(),
            content,
            version_token: contents.sha,
        })
    }

    async fn write_file(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        expected_version: &str,
        message: &str,
    ) -> Result<String, HostError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, repo.owner, repo.name, path
        );
        let payload = serde_json::json!({
            "message": message,
            "content": codec::encode(content),
            "sha": expected_version,
        });
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::transport_error(path, e))?;

        if !response.status().is_success() {
            return Err(Self::error_for(path, response).await);
        }

        let written: WriteResponse = response
            .json()
            .await
            .map_err(|e| HostError::Api(format!("{path}: {e}")))?;
        Ok(written.content.sha)
    }
}

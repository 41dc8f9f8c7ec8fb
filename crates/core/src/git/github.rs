//! GitHub REST API client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::GitHubError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    pub commit: GitHubCommit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub commit: GitHubCommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<GitHubGitActor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubGitActor {
    pub name: String,
    pub email: String,
    pub date: Option<String>,
}

/// Response of `GET /repos/{owner}/{repo}/compare/{base}...{head}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitComparison {
    /// `identical`, `ahead`, `behind` or `diverged`.
    pub status: String,
    pub ahead_by: u64,
    pub behind_by: u64,
    #[serde(default)]
    pub total_commits: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
    /// Number of commits in the pull request at the time it was fetched.
    #[serde(default)]
    pub commits: u64,
    pub merged: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// Response of `PUT /repos/{owner}/{repo}/pulls/{number}/merge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestMerge {
    pub merged: bool,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Asynchronous GitHub REST API client.
///
/// Built once at startup and shared; without a token every request goes out
/// unauthenticated, which limits access to public repositories.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self, GitHubError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("branchgate/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        info!(api_url = %api_url, authenticated = token.is_some(), "created GitHubClient");
        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Fetch a single branch with its head commit.
    #[instrument(skip(self))]
    pub async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<GitHubBranch, GitHubError> {
        let url = self.repo_endpoint(owner, repo, &["branches"], branch)?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        self.check_response(&resp)?;
        let branch: GitHubBranch = resp.json().await?;
        debug!(name = %branch.name, sha = %branch.commit.sha, "fetched branch");
        Ok(branch)
    }

    /// Compare two refs: how far `head` is ahead of / behind `base`.
    #[instrument(skip(self))]
    pub async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CommitComparison, GitHubError> {
        let basehead = format!("{}...{}", base, head);
        let url = self.repo_endpoint(owner, repo, &["compare"], &basehead)?;
        let resp = self.authorize(self.http.get(url)).send().await?;
        self.check_response(&resp)?;
        let comparison: CommitComparison = resp.json().await?;
        debug!(
            status = %comparison.status,
            ahead_by = comparison.ahead_by,
            behind_by = comparison.behind_by,
            "compared commits"
        );
        Ok(comparison)
    }

    #[instrument(skip(self, body))]
    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        let url = self.repo_endpoint(owner, repo, &["pulls"], "")?;
        let payload =
            serde_json::json!({ "title": title, "body": body, "head": head, "base": base });
        let resp = self
            .authorize(self.http.post(url))
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        let pr: PullRequest = resp.json().await?;
        info!(number = pr.number, commits = pr.commits, "created pull request");
        Ok(pr)
    }

    #[instrument(skip(self))]
    pub async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<PullRequestMerge, GitHubError> {
        let number = pr_number.to_string();
        let url = self.repo_endpoint(owner, repo, &["pulls", &number, "merge"], "")?;
        let payload = serde_json::json!({ "merge_method": "merge" });
        let resp = self
            .authorize(self.http.put(url))
            .json(&payload)
            .send()
            .await?;
        self.check_response(&resp)?;
        let merge: PullRequestMerge = resp.json().await?;
        info!(pr_number, merged = merge.merged, "merged pull request");
        Ok(merge)
    }

    /// `{api_url}/repos/{owner}/{repo}/{fixed..}/{git_ref}` with every segment
    /// percent-encoded. `git_ref` keeps its `/` separators, so `feature/login`
    /// stays two segments while `#`, `?` and `%` inside a name are escaped.
    fn repo_endpoint(
        &self,
        owner: &str,
        repo: &str,
        fixed: &[&str],
        git_ref: &str,
    ) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| GitHubError::InvalidUrl(format!("{}: {}", self.api_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| GitHubError::InvalidUrl(self.api_url.clone()))?
            .pop_if_empty()
            .extend(["repos", owner, repo])
            .extend(fixed)
            .extend(git_ref.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check_response(&self, resp: &reqwest::Response) -> Result<(), GitHubError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 404 {
            return Err(GitHubError::NotFound(resp.url().path().to_string()));
        }
        if status.as_u16() == 401 {
            return Err(GitHubError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        if status.as_u16() == 429
            || (status.as_u16() == 403
                && resp
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    == Some("0"))
        {
            let reset = resp
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(GitHubError::RateLimited { reset_at: reset });
        }
        if status.as_u16() == 403 {
            return Err(GitHubError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        Err(GitHubError::ApiError {
            status: status.as_u16(),
            body: format!("HTTP {}", status),
        })
    }
}

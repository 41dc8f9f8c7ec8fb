//! Branch merges performed on a throwaway local clone.
//!
//! Each merge clones into its own scratch directory under the configured
//! root. The directory is a [`tempfile::TempDir`], so it is removed when the
//! merge returns, whichever way it returns.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::LocalConfig;
use crate::errors::GitError;
use crate::git::client::{GitClient, MergeSummary};
use crate::git::remote_url::{normalize_git_url, redact_url, repo_name_from_git_url};
use crate::models::MergeResult;

/// The only remote a scratch clone has.
pub const REMOTE_NAME: &str = "origin";

/// Local-clone backend.
#[derive(Clone)]
pub struct LocalBackend {
    temp_root: PathBuf,
    token: Option<String>,
    /// Host (`github.com`, `ghes.example.com:8443`) the token may be sent to.
    token_host: String,
    committer_name: String,
    committer_email: String,
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("temp_root", &self.temp_root)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_host", &self.token_host)
            .field("committer_name", &self.committer_name)
            .field("committer_email", &self.committer_email)
            .finish()
    }
}

/// Refer to a branch that was never checked out locally through its
/// remote-tracking ref. Names that already contain `/` are used as given.
pub fn remote_tracking_name(head: &str) -> String {
    if head.contains('/') {
        head.to_string()
    } else {
        format!("{}/{}", REMOTE_NAME, head)
    }
}

impl LocalBackend {
    /// `token_host` is the repository host from the GitHub settings, with
    /// an optional path prefix that is ignored here.
    pub fn new(config: &LocalConfig, token: Option<String>, token_host: &str) -> Self {
        let token_host = token_host
            .split('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self {
            temp_root: config.temp_dir.clone(),
            token,
            token_host,
            committer_name: config.committer_name.clone(),
            committer_email: config.committer_email.clone(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// The token, but only for `https` URLs on the configured host. Any
    /// other remote is cloned without credentials.
    fn token_for(&self, git_url: &str) -> Option<&str> {
        let token = self.token.as_deref()?;
        let trusted = Url::parse(git_url).ok().is_some_and(|url| {
            let authority = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => return false,
            };
            url.scheme() == "https" && authority.eq_ignore_ascii_case(&self.token_host)
        });
        if trusted {
            Some(token)
        } else {
            warn!(
                url = %redact_url(git_url),
                token_host = %self.token_host,
                "remote is not the configured https host; cloning without credentials"
            );
            None
        }
    }

    /// Clone `git_url`, merge `head` into `base`, and push `base` back.
    ///
    /// The git work is blocking and runs on the blocking thread pool.
    #[instrument(skip(self, git_url), fields(url = %redact_url(git_url)))]
    pub async fn merge_branches(&self, git_url: &str, base: &str, head: &str) -> MergeResult {
        let request_id = Uuid::new_v4();
        info!(%request_id, "merging branches on a local clone");

        let this = self.clone();
        let url = git_url.to_string();
        let (base_owned, head_owned) = (base.to_string(), head.to_string());
        let task = tokio::task::spawn_blocking(move || {
            this.merge_blocking(&url, &base_owned, &head_owned, request_id)
        });

        match task.await {
            Ok(Ok(summary)) => match summary {
                MergeSummary::Conflicted { paths } => {
                    error!(%request_id, ?paths, "merge failed; possible conflicts");
                    MergeResult::error(head, base)
                }
                other => MergeResult::ok(head, base, other.changes() as u64),
            },
            Ok(Err(e)) => {
                error!(%request_id, error = %e, "unexpected error during local merge");
                MergeResult::error(head, base)
            }
            Err(e) => {
                let e = GitError::TaskAborted(e.to_string());
                error!(%request_id, error = %e, "local merge task did not complete");
                MergeResult::error(head, base)
            }
        }
    }

    fn merge_blocking(
        &self,
        git_url: &str,
        base: &str,
        head: &str,
        request_id: Uuid,
    ) -> Result<MergeSummary, GitError> {
        let git_url = normalize_git_url(git_url);
        let scratch = self.scratch_dir(&repo_name_from_git_url(&git_url), request_id)?;
        let token = self.token_for(&git_url);

        let client = GitClient::clone_repo(&git_url, scratch.path(), token)?;
        client.checkout_branch(REMOTE_NAME, base)?;
        client.pull(REMOTE_NAME, base, token)?;

        let head_ref = remote_tracking_name(head);
        let summary =
            client.merge_into_head(&head_ref, &self.committer_name, &self.committer_email)?;
        if summary.failed() {
            return Ok(summary);
        }

        client.push(REMOTE_NAME, base, token)?;
        info!(
            %request_id,
            head = %client.get_head_sha()?,
            changes = summary.changes(),
            "pushed merged branch"
        );
        Ok(summary)
    }

    fn scratch_dir(&self, repo_name: &str, request_id: Uuid) -> Result<TempDir, GitError> {
        if !self.temp_root.exists() {
            warn!(path = %self.temp_root.display(), "temp root missing, creating it");
            std::fs::create_dir_all(&self.temp_root)?;
        }
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", repo_name, request_id))
            .tempdir_in(&self.temp_root)?;
        info!(path = %dir.path().display(), "created scratch directory");
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_with_token(root: &Path) -> LocalBackend {
        let config = LocalConfig {
            temp_dir: root.to_path_buf(),
            ..LocalConfig::default()
        };
        LocalBackend::new(&config, Some("ghp_secret".into()), "github.com")
    }

    #[test]
    fn test_remote_tracking_name() {
        assert_eq!(remote_tracking_name("dev"), "origin/dev");
        assert_eq!(remote_tracking_name("origin/dev"), "origin/dev");
        assert_eq!(remote_tracking_name("upstream/feature"), "upstream/feature");
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            temp_dir: root.path().join("temp_repos"),
            ..LocalConfig::default()
        };
        let backend = LocalBackend::new(&config, None, "github.com");
        let a = backend.scratch_dir("widgets", Uuid::new_v4()).unwrap();
        let b = backend.scratch_dir("widgets", Uuid::new_v4()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(backend.temp_root()));

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_clone_failure_is_error_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let config = LocalConfig {
            temp_dir: root.path().to_path_buf(),
            ..LocalConfig::default()
        };
        let backend = LocalBackend::new(&config, None, "github.com");
        let missing = root.path().join("does-not-exist.git");
        let result = backend
            .merge_branches(&missing.display().to_string(), "master", "dev")
            .await;

        assert_eq!(result.status, RequestStatus::Error);
        assert_eq!(result.commit_count, 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_token_only_for_configured_https_host() {
        let root = tempfile::tempdir().unwrap();
        let backend = backend_with_token(root.path());
        let token = Some("ghp_secret");

        assert_eq!(backend.token_for("https://github.com/acme/widgets.git"), token);
        assert_eq!(backend.token_for("https://GitHub.com/acme/widgets.git"), token);
        assert_eq!(backend.token_for("http://github.com/acme/widgets.git"), None);
        assert_eq!(backend.token_for("https://github.com.evil.test/acme/widgets.git"), None);
        assert_eq!(backend.token_for("https://github.com:8443/acme/widgets.git"), None);
        assert_eq!(backend.token_for("https://evil.test/github.com/acme/widgets.git"), None);
        assert_eq!(backend.token_for("git@github.com:acme/widgets.git"), None);
        assert_eq!(backend.token_for("/srv/git/widgets.git"), None);
    }

    #[test]
    fn test_token_host_keeps_port_and_drops_path_prefix() {
        let backend = LocalBackend::new(
            &LocalConfig::default(),
            Some("ghp_secret".into()),
            "GHES.example.com:8443/git",
        );
        assert_eq!(
            backend.token_for("https://ghes.example.com:8443/git/acme/widgets.git"),
            Some("ghp_secret")
        );
        assert_eq!(backend.token_for("https://ghes.example.com/acme/widgets.git"), None);
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let root = tempfile::tempdir().unwrap();
        let text = format!("{:?}", backend_with_token(root.path()));
        assert!(!text.contains("ghp_secret"));
        assert!(text.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_untrusted_remote_is_never_sent_the_token() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Basic realm=\"git\""),
            )
            .mount(&server)
            .await;
        let root = tempfile::tempdir().unwrap();

        let result = backend_with_token(root.path())
            .merge_branches(&format!("{}/attacker/repo", server.uri()), "master", "dev")
            .await;

        assert_eq!(result, MergeResult::error("dev", "master"));
        let requests = server.received_requests().await.unwrap();
        assert!(!requests.is_empty());
        assert!(requests
            .iter()
            .all(|r| !r.headers.contains_key("authorization")));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

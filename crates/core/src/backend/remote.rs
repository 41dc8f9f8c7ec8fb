//! Branch operations against the GitHub REST API.

use tracing::{error, info, instrument, warn};

use crate::errors::GitHubError;
use crate::git::github::GitHubClient;
use crate::models::{BranchInfo, CompareResult, MergeResult, RequestStatus};
use crate::normalize::{branch_info_from_github, compare_result_from_github};

/// Remote backend backed by a shared [`GitHubClient`].
#[derive(Clone)]
pub struct RemoteBackend {
    client: GitHubClient,
}

/// 404 is NOT_FOUND; everything else is ERROR.
fn status_for(err: &GitHubError) -> RequestStatus {
    match err {
        GitHubError::NotFound(_) => RequestStatus::NotFound,
        _ => RequestStatus::Error,
    }
}

impl RemoteBackend {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    /// Name, last commit SHA and last commit message of `branch`.
    #[instrument(skip(self))]
    pub async fn get_branch_info(&self, owner: &str, repo: &str, branch: &str) -> BranchInfo {
        info!("getting branch info");
        match self.client.get_branch(owner, repo, branch).await {
            Ok(data) => branch_info_from_github(data),
            Err(e) => {
                let status = status_for(&e);
                if status == RequestStatus::NotFound {
                    error!(repo, branch, "repository or branch not found");
                } else {
                    error!(error = %e, "unexpected error getting branch info");
                }
                BranchInfo::failed(status, branch)
            }
        }
    }

    /// How `head` relates to `base`.
    #[instrument(skip(self))]
    pub async fn compare_branches(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> CompareResult {
        info!("comparing branches");
        match self.client.compare_commits(owner, repo, base, head).await {
            Ok(comparison) => compare_result_from_github(&comparison, head, base),
            Err(e) => {
                let status = status_for(&e);
                if status == RequestStatus::NotFound {
                    error!(repo, base, head, "repository or branch not found");
                } else {
                    error!(error = %e, "unexpected error comparing branches");
                }
                CompareResult::failed(status, head, base)
            }
        }
    }

    /// Merge `head` into `base` by opening a pull request and merging it
    /// straight away.
    ///
    /// The two calls are not atomic. If the pull request is created but the
    /// merge call fails, the pull request stays open; that case is logged
    /// separately and its number is returned in `open_pull_request_number`.
    #[instrument(skip(self))]
    pub async fn merge_branches(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> MergeResult {
        info!("merging branches via pull request");
        let title = format!("Merge {} into {}", head, base);

        let pr = match self
            .client
            .create_pull_request(owner, repo, &title, "", head, base)
            .await
        {
            Ok(pr) => pr,
            Err(e) => {
                if e.status() == Some(422) {
                    error!(
                        error = %e,
                        "pull request was not created; possible conflicts or missing branches"
                    );
                } else {
                    error!(error = %e, "unexpected error creating pull request");
                }
                return MergeResult::error(head, base);
            }
        };

        match self.client.merge_pull_request(owner, repo, pr.number).await {
            Ok(merge) if merge.merged => MergeResult::ok(head, base, pr.commits),
            Ok(merge) => {
                warn!(
                    pr_number = pr.number,
                    message = merge.message.as_deref().unwrap_or(""),
                    "merge call returned merged=false; pull request left open"
                );
                MergeResult {
                    open_pull_request_number: Some(pr.number),
                    ..MergeResult::error(head, base)
                }
            }
            Err(e) => {
                if e.status() == Some(405) {
                    error!(pr_number = pr.number, "pull request cannot be merged; possible conflicts");
                } else {
                    error!(pr_number = pr.number, error = %e, "unexpected error merging pull request");
                }
                warn!(
                    pr_number = pr.number,
                    url = %pr.html_url,
                    "pull request left open after failed merge"
                );
                MergeResult {
                    open_pull_request_number: Some(pr.number),
                    ..MergeResult::error(head, base)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BranchStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> RemoteBackend {
        RemoteBackend::new(GitHubClient::new(server.uri(), Some("ghp_test".into())).unwrap())
    }

    fn pull_json(number: u64, commits: u64) -> serde_json::Value {
        json!({
            "number": number,
            "title": "Merge dev into master",
            "html_url": format!("https://github.com/acme/widgets/pull/{}", number),
            "state": "open",
            "head": { "ref": "dev", "sha": "aaa" },
            "base": { "ref": "master", "sha": "bbb" },
            "commits": commits,
            "merged": false
        })
    }

    #[tokio::test]
    async fn test_get_branch_info_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/master"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "master",
                "commit": {
                    "sha": "2a11cbc9b9a69c523dda961cc24ce544a1a7b78e",
                    "commit": { "message": "Fixed bug with the login page" }
                }
            })))
            .mount(&server)
            .await;

        let info = backend(&server).get_branch_info("acme", "widgets", "master").await;
        assert_eq!(info.status, RequestStatus::Ok);
        assert_eq!(
            info.last_commit_sha.as_deref(),
            Some("2a11cbc9b9a69c523dda961cc24ce544a1a7b78e")
        );
    }

    #[tokio::test]
    async fn test_get_branch_info_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Branch not found"})))
            .mount(&server)
            .await;

        let info = backend(&server).get_branch_info("acme", "widgets", "ghost").await;
        assert_eq!(info, BranchInfo::failed(RequestStatus::NotFound, "ghost"));
    }

    #[tokio::test]
    async fn test_get_branch_info_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/master"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let info = backend(&server).get_branch_info("acme", "widgets", "master").await;
        assert_eq!(info, BranchInfo::failed(RequestStatus::Error, "master"));
    }

    #[tokio::test]
    async fn test_get_branch_info_malformed_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/master"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let info = backend(&server).get_branch_info("acme", "widgets", "master").await;
        assert_eq!(info.status, RequestStatus::Error);
    }

    #[tokio::test]
    async fn test_compare_branches_ahead() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/compare/master...dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ahead", "ahead_by": 3, "behind_by": 0, "total_commits": 3
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .compare_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result.status, RequestStatus::Ok);
        assert_eq!(result.branch_status, Some(BranchStatus::Ahead));
        assert_eq!(result.ahead_commit_count, Some(3));
        assert_eq!(result.behind_commit_count, Some(0));
    }

    #[tokio::test]
    async fn test_compare_branches_unrecognized_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/compare/master...dev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "something-new", "ahead_by": 1, "behind_by": 1
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .compare_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result.status, RequestStatus::Ok);
        assert_eq!(result.branch_status, Some(BranchStatus::Unknown));
    }

    #[tokio::test]
    async fn test_compare_branches_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/compare/master...ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = backend(&server)
            .compare_branches("acme", "widgets", "master", "ghost")
            .await;
        assert_eq!(
            result,
            CompareResult::failed(RequestStatus::NotFound, "ghost", "master")
        );
    }

    #[tokio::test]
    async fn test_get_branch_info_hash_in_name_is_not_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/branches/feat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "feat",
                "commit": { "sha": "deadbeef", "commit": { "message": "other branch" } }
            })))
            .expect(0)
            .mount(&server)
            .await;

        let result = backend(&server)
            .get_branch_info("acme", "widgets", "feat#1")
            .await;
        assert_eq!(result, BranchInfo::failed(RequestStatus::NotFound, "feat#1"));
    }

    #[tokio::test]
    async fn test_compare_branches_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/compare/master...dev"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = backend(&server)
            .compare_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(
            result,
            CompareResult::failed(RequestStatus::Error, "dev", "master")
        );
    }

    #[tokio::test]
    async fn test_compare_branches_unreachable_api_is_error() {
        let client = GitHubClient::new("http://127.0.0.1:9", None).unwrap();
        let result = RemoteBackend::new(client)
            .compare_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(
            result,
            CompareResult::failed(RequestStatus::Error, "dev", "master")
        );
    }

    #[tokio::test]
    async fn test_merge_branches_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/pulls"))
            .and(body_partial_json(json!({
                "title": "Merge dev into master", "head": "dev", "base": "master"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(7, 3)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/widgets/pulls/7/merge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "merged": true, "sha": "ccc", "message": "Pull Request successfully merged"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend(&server)
            .merge_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result, MergeResult::ok("dev", "master", 3));
    }

    #[tokio::test]
    async fn test_merge_branches_pr_creation_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/pulls"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "Validation Failed"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = backend(&server)
            .merge_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result, MergeResult::error("dev", "master"));
    }

    #[tokio::test]
    async fn test_merge_branches_unmergeable_reports_open_pr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(12, 2)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/widgets/pulls/12/merge"))
            .respond_with(ResponseTemplate::new(405).set_body_json(json!({
                "message": "Pull Request is not mergeable"
            })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .merge_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result.status, RequestStatus::Error);
        assert_eq!(result.commit_count, 0);
        assert_eq!(result.open_pull_request_number, Some(12));
    }

    #[tokio::test]
    async fn test_merge_branches_merged_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(pull_json(5, 4)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/widgets/pulls/5/merge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "merged": false })))
            .mount(&server)
            .await;

        let result = backend(&server)
            .merge_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result.status, RequestStatus::Error);
        assert_eq!(result.commit_count, 0);
        assert_eq!(result.open_pull_request_number, Some(5));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "ERROR",
                "branchName": "dev",
                "baseBranchName": "master",
                "commitCount": 0,
                "openPullRequestNumber": 5
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_is_error() {
        // Nothing listens on port 9 on loopback.
        let client = GitHubClient::new("http://127.0.0.1:9", None).unwrap();
        let result = RemoteBackend::new(client)
            .merge_branches("acme", "widgets", "master", "dev")
            .await;
        assert_eq!(result, MergeResult::error("dev", "master"));
    }
}

//! Git operations for branchgate.

pub mod client;
pub mod github;
pub mod remote_url;

pub use client::{GitClient, MergeSummary};
pub use github::GitHubClient;
pub use remote_url::RepoRef;

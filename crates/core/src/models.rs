//! Result types returned by both branch backends.
//!
//! These are the JSON shapes the web API hands back; field names are
//! camelCase on the wire and optional fields are omitted when absent.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Outcome of a backend operation, reported in-band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Ok,
    NotFound,
    Error,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// How a branch's history relates to its base branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    Equal,
    Ahead,
    Behind,
    Diverged,
    Unknown,
}

impl std::fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "EQUAL"),
            Self::Ahead => write!(f, "AHEAD"),
            Self::Behind => write!(f, "BEHIND"),
            Self::Diverged => write!(f, "DIVERGED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    pub status: RequestStatus,
    pub branch_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_message: Option<String>,
}

impl BranchInfo {
    /// A result carrying only a status and the requested branch name.
    pub fn failed(status: RequestStatus, branch_name: &str) -> Self {
        Self {
            status,
            branch_name: branch_name.to_string(),
            last_commit_sha: None,
            last_commit_message: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompareResult {
    pub status: RequestStatus,
    pub branch_name: String,
    pub base_branch_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_status: Option<BranchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind_commit_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ahead_commit_count: Option<u64>,
}

impl CompareResult {
    /// A result carrying only a status and both branch names.
    pub fn failed(status: RequestStatus, branch_name: &str, base_branch_name: &str) -> Self {
        Self {
            status,
            branch_name: branch_name.to_string(),
            base_branch_name: base_branch_name.to_string(),
            branch_status: None,
            behind_commit_count: None,
            ahead_commit_count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub status: RequestStatus,
    pub branch_name: String,
    pub base_branch_name: String,
    pub commit_count: u64,
    /// Set when a pull request was opened but could not be merged, so the
    /// caller knows it is still open on the remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_pull_request_number: Option<u64>,
}

impl MergeResult {
    pub fn ok(branch_name: &str, base_branch_name: &str, commit_count: u64) -> Self {
        Self {
            status: RequestStatus::Ok,
            branch_name: branch_name.to_string(),
            base_branch_name: base_branch_name.to_string(),
            commit_count,
            open_pull_request_number: None,
        }
    }

    /// ERROR with a zero commit count.
    pub fn error(branch_name: &str, base_branch_name: &str) -> Self {
        Self {
            status: RequestStatus::Error,
            branch_name: branch_name.to_string(),
            base_branch_name: base_branch_name.to_string(),
            commit_count: 0,
            open_pull_request_number: None,
        }
    }
}

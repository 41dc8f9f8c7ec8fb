//! Maps GitHub payloads onto the uniform result shapes.
//!
//! Everything here is pure. The only real decision is the comparison status
//! table: values GitHub may add later fall through to [`BranchStatus::Unknown`].

use crate::git::github::{CommitComparison, GitHubBranch};
use crate::models::{BranchInfo, BranchStatus, CompareResult, RequestStatus};

/// GitHub compare `status` values and their internal counterparts.
const PROVIDER_STATUS_TABLE: &[(&str, BranchStatus)] = &[
    ("identical", BranchStatus::Equal),
    ("ahead", BranchStatus::Ahead),
    ("behind", BranchStatus::Behind),
    ("diverged", BranchStatus::Diverged),
];

/// Translate a provider comparison status. Unrecognized values map to
/// [`BranchStatus::Unknown`].
pub fn branch_status_from_provider(status: &str) -> BranchStatus {
    PROVIDER_STATUS_TABLE
        .iter()
        .find(|(name, _)| *name == status)
        .map(|(_, mapped)| *mapped)
        .unwrap_or(BranchStatus::Unknown)
}

pub fn branch_info_from_github(branch: GitHubBranch) -> BranchInfo {
    BranchInfo {
        status: RequestStatus::Ok,
        branch_name: branch.name,
        last_commit_sha: Some(branch.commit.sha),
        last_commit_message: Some(branch.commit.commit.message),
    }
}

/// `ahead_by`/`behind_by` are counted from `head`'s point of view.
pub fn compare_result_from_github(
    comparison: &CommitComparison,
    branch_name: &str,
    base_branch_name: &str,
) -> CompareResult {
    CompareResult {
        status: RequestStatus::Ok,
        branch_name: branch_name.to_string(),
        base_branch_name: base_branch_name.to_string(),
        branch_status: Some(branch_status_from_provider(&comparison.status)),
        behind_commit_count: Some(comparison.behind_by),
        ahead_commit_count: Some(comparison.ahead_by),
    }
}

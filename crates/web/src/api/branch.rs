//! Branch endpoints: info, comparison and merge.
//!
//! All three are `GET` with query parameters and always answer 200 with a
//! result body once the parameters are valid; backend failures travel in the
//! body's `status` field.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use branchgate_core::models::{BranchInfo, CompareResult, MergeResult};
use branchgate_core::RepoRef;

use super::status::AppError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub url: Option<String>,
    pub branch: Option<String>,
    pub base_branch: Option<String>,
    pub locally: Option<String>,
}

impl BranchQuery {
    fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or_default()
    }

    fn base_branch(&self) -> &str {
        self.base_branch.as_deref().unwrap_or_default()
    }

    fn locally(&self) -> bool {
        self.locally
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/branch/info", get(branch_info))
        .route("/api/branch/compare", get(compare_branches))
        .route("/api/branch/merge", get(merge_branches))
}

/// Absent and empty values both count as missing. Names are reported in the
/// order given.
fn require_params(params: &[(&str, &Option<String>)]) -> Result<(), AppError> {
    let missing: Vec<&str> = params
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Missing required query parameters: {}",
            missing.join(", ")
        )))
    }
}

fn parse_repo(state: &AppState, url: &str) -> Result<RepoRef, AppError> {
    Ok(RepoRef::parse_for_host(url, &state.repo_host)?)
}

async fn branch_info(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BranchQuery>, QueryRejection>,
) -> Result<Json<BranchInfo>, AppError> {
    let Query(query) = query?;
    require_params(&[("url", &query.url), ("branch", &query.branch)])?;
    info!(url = query.url(), branch = query.branch(), "branch info requested");

    let repo = parse_repo(&state, query.url())?;
    let result = state
        .remote
        .get_branch_info(&repo.owner, &repo.name, query.branch())
        .await;
    Ok(Json(result))
}

async fn compare_branches(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BranchQuery>, QueryRejection>,
) -> Result<Json<CompareResult>, AppError> {
    let Query(query) = query?;
    require_params(&[
        ("url", &query.url),
        ("branch", &query.branch),
        ("baseBranch", &query.base_branch),
    ])?;
    info!(
        url = query.url(),
        branch = query.branch(),
        base_branch = query.base_branch(),
        "branch comparison requested"
    );

    let repo = parse_repo(&state, query.url())?;
    let result = state
        .remote
        .compare_branches(&repo.owner, &repo.name, query.base_branch(), query.branch())
        .await;
    Ok(Json(result))
}

async fn merge_branches(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BranchQuery>, QueryRejection>,
) -> Result<Json<MergeResult>, AppError> {
    let Query(query) = query?;
    require_params(&[
        ("url", &query.url),
        ("branch", &query.branch),
        ("baseBranch", &query.base_branch),
    ])?;
    let locally = query.locally();
    info!(
        url = query.url(),
        branch = query.branch(),
        base_branch = query.base_branch(),
        locally,
        "branch merge requested"
    );

    // The local backend clones whatever URL it is given, attaching the
    // token only for https remotes on the configured host.
    let result = if locally {
        state
            .local
            .merge_branches(query.url(), query.base_branch(), query.branch())
            .await
    } else {
        let repo = parse_repo(&state, query.url())?;
        state
            .remote
            .merge_branches(&repo.owner, &repo.name, query.base_branch(), query.branch())
            .await
    };
    Ok(Json(result))
}

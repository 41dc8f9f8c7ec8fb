//! Repository URL handling.
//!
//! Parses `owner`/`name` out of a GitHub remote URL and derives the web host
//! that URLs are matched against from the configured API URL, so GitHub
//! Enterprise Server (`https://<host>/api/v3`) works the same as github.com.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::RepoUrlError;

/// Host matched by [`RepoRef::parse`].
pub const DEFAULT_HOST: &str = "github.com";

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse a `github.com/<owner>/<name>[.git]` URL.
    pub fn parse(url: &str) -> Result<Self, RepoUrlError> {
        Self::parse_for_host(url, DEFAULT_HOST)
    }

    /// Parse `<host>/<owner>/<name>[.git]` (or the scp-style
    /// `<host>:<owner>/<name>.git`). A trailing `/` is tolerated.
    pub fn parse_for_host(url: &str, host: &str) -> Result<Self, RepoUrlError> {
        let pattern = format!(
            r"(?:^|[/@.]){}[/:]([^/]+)/([^/]+?)(?:\.git)?/?$",
            regex_lite::escape(host.trim_end_matches('/'))
        );
        let re = Regex::new(&pattern).map_err(|_| RepoUrlError::Invalid(url.to_string()))?;
        let caps = re
            .captures(url.trim())
            .ok_or_else(|| RepoUrlError::Invalid(url.to_string()))?;

        match (caps.get(1), caps.get(2)) {
            (Some(owner), Some(name)) if !owner.as_str().is_empty() && !name.as_str().is_empty() => {
                Ok(Self {
                    owner: owner.as_str().to_string(),
                    name: name.as_str().to_string(),
                })
            }
            _ => Err(RepoUrlError::Invalid(url.to_string())),
        }
    }
}

/// Replace the `user[:password]@` part of a URL's authority with `***@`,
/// for logging. Paths and scp-style remotes are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Ensure a clone URL ends with `.git`.
pub fn normalize_git_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.ends_with(".git") {
        url.to_string()
    } else {
        format!("{}.git", url)
    }
}

/// Repository name taken from the final path segment of a clone URL, with
/// any `.git` suffix removed.
pub fn repo_name_from_git_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let last = url.rsplit(['/', ':']).next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Derive the Git web base URL (without repo path).
///
/// Resolution order:
/// 1. If `git_base_url` is `Some(non-empty)`, use it as the base.
/// 2. Otherwise derive from `api_url`:
///    - `https://api.github.com` → `https://github.com`
///    - `https://<host>/api/v3`  → `https://<host>`
///    - Anything else            → strip trailing slash, use as-is
pub fn derive_git_base_url(api_url: &str, git_base_url: Option<&str>) -> String {
    if let Some(explicit) = git_base_url {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return trimmed.trim_end_matches('/').to_string();
        }
    }

    let url = api_url.trim().trim_end_matches('/');

    if url.eq_ignore_ascii_case("https://api.github.com") {
        return "https://github.com".to_string();
    }

    if let Some(base) = url.strip_suffix("/api/v3") {
        return base.to_string();
    }

    url.to_string()
}

//! Error types for the branchgate core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. The
//! backends fold these into in-band statuses; the web layer only ever sees
//! [`RepoUrlError`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Repository URL errors
// ---------------------------------------------------------------------------

/// Errors from parsing a repository URL into owner and name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoUrlError {
    /// The URL does not look like `<host>/<owner>/<name>[.git]`.
    #[error("invalid repository URL: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected {
        branch: String,
        detail: String,
    },

    /// The blocking git task panicked or was cancelled.
    #[error("git task aborted: {0}")]
    TaskAborted(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// GitHub API errors
// ---------------------------------------------------------------------------

/// Errors from GitHub REST API interactions.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("GitHub HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The repository, branch or pull request does not exist.
    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    /// The API returned a non-success status code.
    #[error("GitHub API error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    /// Authentication token is missing or invalid.
    #[error("GitHub authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The configured API URL cannot carry a request path.
    #[error("invalid GitHub API URL: {0}")]
    InvalidUrl(String),

    /// Rate limit exceeded.
    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited {
        reset_at: String,
    },
}

impl GitHubError {
    /// The HTTP status behind this error, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::ApiError { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            Self::AuthenticationFailed(_) | Self::InvalidUrl(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RepoUrlError::Invalid("ftp://example.com".into());
        assert_eq!(err.to_string(), "invalid repository URL: ftp://example.com");

        let err = GitError::RefNotFound("origin/dev".into());
        assert_eq!(err.to_string(), "git ref not found: origin/dev");

        let err = GitHubError::RateLimited {
            reset_at: "1700000000".into(),
        };
        assert!(err.to_string().contains("rate limit"));

        let err = ConfigError::InvalidValue {
            field: "server.listen".into(),
            detail: "not a socket address".into(),
        };
        assert!(err.to_string().contains("server.listen"));
    }

    #[test]
    fn test_github_error_status() {
        assert_eq!(GitHubError::NotFound("x".into()).status(), Some(404));
        let err = GitHubError::ApiError {
            status: 422,
            body: "HTTP 422".into(),
        };
        assert_eq!(err.status(), Some(422));
        assert_eq!(GitHubError::AuthenticationFailed("x".into()).status(), None);
    }
}

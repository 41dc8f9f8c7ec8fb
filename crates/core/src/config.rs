//! TOML-based configuration system for branchgate.
//!
//! The GitHub token is never stored in the file: `github.token_env` names the
//! environment variable holding it, resolved at runtime via
//! [`AppConfig::resolve_env_vars`]. A `--token` flag on the server binary
//! takes precedence over the environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::git::remote_url::derive_git_base_url;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Local-clone backend settings.
    #[serde(default)]
    pub local: LocalConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:3000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen() -> String {
    "127.0.0.1:3000".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// GitHub API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Environment variable holding the GitHub access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Explicit web host base (e.g. `https://ghes.example.com`) used when
    /// matching repository URLs. Derived from `api_url` when unset.
    #[serde(default)]
    pub git_base_url: Option<String>,

    /// Resolved token (populated by `resolve_env_vars` or `--token`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token_env", &self.token_env)
            .field("git_base_url", &self.git_base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token_env: default_token_env(),
            git_base_url: None,
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Host (and optional path prefix) that repository URLs are matched
    /// against, e.g. `github.com`.
    pub fn repo_host(&self) -> String {
        let base = derive_git_base_url(&self.api_url, self.git_base_url.as_deref());
        base.split_once("://")
            .map(|(_, rest)| rest.to_string())
            .unwrap_or(base)
    }
}

// ---------------------------------------------------------------------------
// Local backend
// ---------------------------------------------------------------------------

/// Settings for merges performed on a local clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Root directory holding per-merge scratch clones.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Name recorded on merge commits.
    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    /// Email recorded on merge commits.
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp_repos")
}
fn default_committer_name() -> String {
    "branchgate".into()
}
fn default_committer_email() -> String {
    "branchgate@localhost".into()
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the GitHub token from the environment unless one is already
    /// set (e.g. from the command line).
    ///
    /// A missing token is not an error: requests proceed unauthenticated and
    /// only public repositories are reachable.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if self.github.token.is_some() {
            debug!("GitHub token supplied explicitly, skipping environment");
            return Ok(());
        }
        self.github.token = resolve_optional_env(&self.github.token_env, "github.token_env");
        if self.github.token.is_none() {
            warn!(
                env_name = %self.github.token_env,
                "GitHub token is not set; private repositories will not be available. \
                 Set the environment variable or pass --token"
            );
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: format!("'{}' is not a socket address", self.server.listen),
            });
        }
        if self.github.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "github.api_url".into(),
                detail: "GitHub API URL must not be empty".into(),
            });
        }
        if self.local.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "local.temp_dir".into(),
                detail: "temp directory must not be empty".into(),
            });
        }

        Ok(())
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs and returns `None` if the variable is unset or empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            debug!(field, env_name, "env var not set");
            None
        }
    }
}

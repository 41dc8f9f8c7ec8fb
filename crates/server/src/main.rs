//! branchgate server entry point.
//!
//! Loads configuration, builds the GitHub client and both branch backends,
//! starts the web server, and handles graceful shutdown.

mod signals;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use branchgate_core::config::AppConfig;
use branchgate_core::git::GitHubClient;
use branchgate_core::{LocalBackend, RemoteBackend};
use branchgate_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Branch information, comparison and merge over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "branchgate",
    version,
    about = "HTTP API for inspecting, comparing and merging GitHub branches"
)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GitHub access token. Takes precedence over the token environment variable.
    #[arg(long)]
    token: Option<String>,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            AppConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => AppConfig::default(),
    };

    // Initialize tracing
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.server.log_level.clone());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Command-line overrides
    if let Some(token) = args.token.filter(|t| !t.is_empty()) {
        config.github.token = Some(token);
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables in config")?;
    config
        .validate()
        .context("configuration validation failed")?;

    let config_source = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".into());

    // Startup banner
    info!("========================================");
    info!("  branchgate v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", config_source);
    info!("GitHub API    : {}", config.github.api_url);
    info!("Repo host     : {}", config.github.repo_host());
    info!("Web listen    : {}", config.server.listen);
    info!("Temp dir      : {}", config.local.temp_dir.display());
    info!("Log level     : {}", log_level);
    info!("========================================");

    std::fs::create_dir_all(&config.local.temp_dir).context("failed to create temp directory")?;

    let client = GitHubClient::new(config.github.api_url.clone(), config.github.token.clone())
        .context("failed to build GitHub client")?;
    info!(authenticated = client.is_authenticated(), "GitHub client initialized");
    let remote = RemoteBackend::new(client);
    let local = LocalBackend::new(
        &config.local,
        config.github.token.clone(),
        &config.github.repo_host(),
    );
    info!("Branch backends initialized");

    let listen_addr = config.server.listen.clone();
    let web_server = WebServer::new(&config, remote, local);

    let shutdown = async {
        signals::wait_for_shutdown().await;
        info!("Shutdown signal received, draining in-flight requests...");
    };
    if let Err(e) = web_server.start(&listen_addr, shutdown).await {
        error!("Web server error: {}", e);
        return Err(e);
    }

    info!("branchgate stopped.");
    Ok(())
}

//! branchgate core library.
//!
//! This crate provides the building blocks behind the branch API:
//! configuration, repository URL parsing, the GitHub REST client, the local
//! `git2` client, the two branch backends, and the normalizer that maps
//! provider payloads onto the uniform result shapes.

pub mod backend;
pub mod config;
pub mod errors;
pub mod git;
pub mod models;
pub mod normalize;

// Re-exports for convenience.
pub use backend::{LocalBackend, RemoteBackend};
pub use config::AppConfig;
pub use git::remote_url::RepoRef;

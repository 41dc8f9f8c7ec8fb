//! The two branch backends.
//!
//! [`RemoteBackend`] talks to the GitHub REST API; [`LocalBackend`] merges
//! on a throwaway clone. Neither returns errors: every failure is folded
//! into the `status` of the result.

pub mod local;
pub mod remote;

pub use local::LocalBackend;
pub use remote::RemoteBackend;

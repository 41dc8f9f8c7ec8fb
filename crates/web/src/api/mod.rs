//! REST API endpoint modules.

pub mod branch;
pub mod status;

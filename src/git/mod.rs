//! Git operations module
//!
//! Provides:
//! - Commit id resolution for report metadata

pub mod commits;

pub use commits::{head_commit, resolve_commit};

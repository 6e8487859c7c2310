//! Commit ids for coverage reports

use anyhow::{Context, Result};
use git2::Repository;
use std::path::Path;

/// Resolve a revision (`HEAD`, branch, tag or sha) to a full commit id
pub fn resolve_commit(path: &Path, rev: &str) -> Result<String> {
    let repo = Repository::discover(path)
        .with_context(|| format!("Failed to find git repository at {}", path.display()))?;

    let object = repo
        .revparse_single(rev)
        .with_context(|| format!("Unknown revision '{}'", rev))?;
    let commit = object.peel_to_commit()?;

    Ok(commit.id().to_string())
}

/// Commit id of the checked-out HEAD
pub fn head_commit(path: &Path) -> Result<String> {
    resolve_commit(path, "HEAD")
}

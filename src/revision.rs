//! Revision hash sources.
//!
//! The pipeline normally supplies a revision hash; when it doesn't, one is
//! computed either from the artifact content or from the git HEAD commit.

use anyhow::{Context, Result};
use git2::Repository;
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevisionSource {
    /// SHA-256 of the artifact content
    #[default]
    Content,
    /// HEAD commit id of the project's git repository
    Git,
}

impl std::fmt::Display for RevisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevisionSource::Content => write!(f, "content"),
            RevisionSource::Git => write!(f, "git"),
        }
    }
}

impl std::str::FromStr for RevisionSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(RevisionSource::Content),
            "git" => Ok(RevisionSource::Git),
            _ => anyhow::bail!("Invalid revision source '{}'. Valid values: content, git", s),
        }
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Full hex id of the HEAD commit of the repository containing `project_dir`.
pub fn git_head_hash(project_dir: &Path) -> Result<String> {
    let repo = Repository::discover(project_dir).context("Failed to open git repository")?;
    let head = repo.head().context("Repository has no HEAD")?;
    let commit = head
        .peel_to_commit()
        .context("HEAD does not point to a commit")?;
    Ok(commit.id().to_string())
}

/// Produce a revision hash for `artifact_path` using `source`.
pub async fn resolve_revision_hash(
    source: RevisionSource,
    project_dir: &Path,
    artifact_path: &Path,
) -> Result<String> {
    match source {
        RevisionSource::Content => {
            let content = tokio::fs::read_to_string(artifact_path)
                .await
                .with_context(|| format!("Failed to read {}", artifact_path.display()))?;
            Ok(content_hash(&content))
        }
        RevisionSource::Git => git_head_hash(project_dir),
    }
}

//! Sparse, shallow checkouts of application and template repositories.
//!
//! Shells out to the `git` binary: sparse-checkout patterns are grown
//! incrementally as the render pass discovers which manifest directories it
//! needs, and history is never fetched deeper than one commit.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} failed: {stderr}")]
    Failed { args: String, stderr: String },

    #[error("failed to create checkout directory: {0}")]
    TempDir(std::io::Error),
}

/// A temporary sparse checkout; the directory is removed on drop.
#[derive(Debug)]
pub struct SparseCheckout {
    dir: TempDir,
}

impl SparseCheckout {
    /// Initialize a sparse checkout of `repo` containing only `patterns`,
    /// shallow-fetched at `git_ref`.
    pub async fn clone(repo: &str, patterns: &[&str], git_ref: &str) -> Result<Self, GitError> {
        let dir = TempDir::new().map_err(GitError::TempDir)?;
        let path = dir.path();
        debug!(repo, git_ref, dir = %path.display(), "sparse checkout");

        git(path, &["init"]).await?;
        git(path, &["sparse-checkout", "init"]).await?;
        for pattern in patterns {
            git(path, &["sparse-checkout", "add", pattern]).await?;
        }
        git(path, &["remote", "add", "origin", repo]).await?;

        let checkout = Self { dir };
        checkout.checkout(git_ref).await?;
        Ok(checkout)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Widen the checkout with additional sparse patterns. Takes effect on
    /// the next [`checkout`](Self::checkout).
    pub async fn add_patterns(&self, patterns: &[&str]) -> Result<(), GitError> {
        for pattern in patterns {
            git(self.path(), &["sparse-checkout", "add", pattern]).await?;
        }
        Ok(())
    }

    /// Shallow-fetch `git_ref` from origin and check it out.
    pub async fn checkout(&self, git_ref: &str) -> Result<(), GitError> {
        git(self.path(), &["fetch", "origin", git_ref, "--depth", "1"]).await?;
        git(self.path(), &["checkout", "FETCH_HEAD"]).await
    }

    /// Absolute path of `rel` inside the checkout.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path().join(rel)
    }
}

async fn git(dir: &Path, args: &[&str]) -> Result<(), GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await?;

    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::Failed {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

//! Apply command: materialize per-cluster directories in the gitops repo.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::gitops;
use crate::output::print_success;
use crate::store::ControlPlane;

/// Materialize per-cluster directories in the gitops repository.
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Path to the control-plane repository checkout.
    pub control_plane_repo: PathBuf,

    /// Path to the cluster gitops repository checkout.
    pub gitops_repo: PathBuf,
}

impl ApplyCommand {
    pub async fn run(self) -> Result<()> {
        let store = ControlPlane::new(&self.control_plane_repo);
        let clusters = store.load_clusters().await?;
        let assignments = store.load_assignments().await?;

        gitops::apply(&clusters, &assignments, &self.gitops_repo).await?;

        print_success(&format!(
            "applied assignments from {} to {}",
            self.control_plane_repo.display(),
            self.gitops_repo.display()
        ));
        Ok(())
    }
}

//! Render command: templates x deployments -> gitops application manifests.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::output::print_success;
use crate::render::render_all;
use crate::store::ControlPlane;

/// Render application manifests into the cluster gitops repository.
#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Path to the control-plane repository checkout.
    pub control_plane_repo: PathBuf,

    /// Path to the cluster gitops repository checkout.
    pub gitops_repo: PathBuf,
}

impl RenderCommand {
    pub async fn run(self) -> Result<()> {
        let store = ControlPlane::new(&self.control_plane_repo);
        let applications = store.load_applications().await?;
        let templates = store.load_templates().await?;

        render_all(&applications, &templates, &self.gitops_repo).await?;

        print_success(&format!(
            "rendered templates from {} to {}",
            self.control_plane_repo.display(),
            self.gitops_repo.display()
        ));
        Ok(())
    }
}

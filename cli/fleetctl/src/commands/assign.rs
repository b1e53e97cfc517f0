//! Assign command: reconcile assignments against the cluster inventory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use fleet_assign::{AssignmentOp, ReconcileContext, Reconciler};
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use crate::output::{print_output, print_success, print_warning, OutputFormat};
use crate::store::ControlPlane;

/// Reconcile application assignments in the control-plane repository.
#[derive(Debug, Args)]
pub struct AssignCommand {
    /// Path to the control-plane repository checkout.
    pub control_plane_repo: PathBuf,

    /// Compute and print operations without applying them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct OperationRow {
    operation: String,
    application: String,
    cluster: String,
}

impl From<&AssignmentOp> for OperationRow {
    fn from(op: &AssignmentOp) -> Self {
        Self {
            operation: op.action.to_string(),
            application: op.assignment.application().to_string(),
            cluster: op.assignment.cluster().to_string(),
        }
    }
}

impl AssignCommand {
    pub async fn run(self, format: OutputFormat) -> Result<()> {
        let store = ControlPlane::new(&self.control_plane_repo);
        let clusters = store.load_clusters().await?;
        let assignments = store.load_assignments().await?;
        let applications = store.load_applications().await?;

        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };
        let fleet = Reconciler::new().reconcile_all(ctx, &applications);

        for diagnostic in fleet.diagnostics() {
            warn!("{diagnostic}");
        }

        let rows: Vec<OperationRow> = fleet.operations().map(OperationRow::from).collect();
        print_output(&rows, format);

        if !self.dry_run {
            store.apply_operations(fleet.operations()).await?;
            print_success(&format!(
                "processed {} assignments in {}",
                rows.len(),
                self.control_plane_repo.display()
            ));
        }

        // Applications are reconciled independently; the successful ones were
        // applied above even if some failed.
        let failures: Vec<_> = fleet.failures().collect();
        if let Some((application, err)) = failures.first() {
            for (application, err) in &failures {
                print_warning(&format!("{application}: {err}"));
            }
            return Err(anyhow::Error::new(**err).context(format!(
                "application {application} could not be fully assigned ({} of {} failed)",
                failures.len(),
                applications.len()
            )));
        }

        Ok(())
    }
}

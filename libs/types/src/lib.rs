//! Record types for the fleet control plane.
//!
//! The control-plane repository stores one YAML file per record, grouped by
//! kind. All records share the `kind` / `metadata` / `spec` envelope. These
//! types are the single definition used by the reconciliation engine and the
//! CLI's store, render, and gitops layers.

mod error;
mod records;

pub use error::InvalidRecord;
pub use records::{
    Application, ApplicationDeployment, ApplicationDeploymentSpec, ApplicationTemplate,
    ApplicationTemplateSpec, Assignment, AssignmentSpec, Cluster, ClusterSpec, DeploymentValues,
    Metadata, PlacementCount, Template, TemplateParameter,
};

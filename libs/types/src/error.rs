//! Validation errors for control-plane records.

use thiserror::Error;

/// A record that parsed but does not satisfy the control-plane schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRecord {
    /// `metadata.name` is missing or empty.
    #[error("{kind} record has an empty metadata.name")]
    EmptyName { kind: &'static str },

    /// A referenced name field is empty.
    #[error("{kind} {name}: field {field} must not be empty")]
    EmptyField {
        kind: &'static str,
        name: String,
        field: &'static str,
    },

    /// A numeric placement count of zero is meaningless; delete the record instead.
    #[error("ApplicationDeployment {name}: spec.clusters must be at least 1")]
    ZeroPlacementCount { name: String },

    /// Assignment names are derived from their application and cluster.
    #[error("Assignment {name}: metadata.name must be {expected}")]
    AssignmentNameMismatch { name: String, expected: String },

    /// The record's `kind` does not match the directory it was loaded from.
    #[error("{name}: expected kind {expected}, found {found}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },
}

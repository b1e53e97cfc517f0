//! Operation and diagnostic types emitted by the engine.

use std::fmt;

use fleet_types::Assignment;

/// What to do with one assignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    /// Persist a newly synthesized assignment.
    Create,
    /// Remove the stored assignment record.
    Delete,
    /// Leave the stored record as is.
    Keep,
}

impl fmt::Display for OpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpAction::Create => f.write_str("create"),
            OpAction::Delete => f.write_str("delete"),
            OpAction::Keep => f.write_str("keep"),
        }
    }
}

/// One reconciliation operation: an action applied to an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentOp {
    pub action: OpAction,
    pub assignment: Assignment,
}

impl AssignmentOp {
    pub fn create(assignment: Assignment) -> Self {
        Self {
            action: OpAction::Create,
            assignment,
        }
    }

    pub fn delete(assignment: Assignment) -> Self {
        Self {
            action: OpAction::Delete,
            assignment,
        }
    }

    pub fn keep(assignment: Assignment) -> Self {
        Self {
            action: OpAction::Keep,
            assignment,
        }
    }
}

/// A non-fatal observation made during reconciliation.
///
/// Returned alongside operations rather than logged, so the engine stays free
/// of hidden output; the caller decides how to surface these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A declared selector matched no cluster in the inventory.
    NoEligibleClusters { application: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoEligibleClusters { application } => {
                write!(f, "there are no eligible clusters for application {application}")
            }
        }
    }
}

//! Assignment reconciliation engine.
//!
//! Computes the create/keep/delete operations that converge the recorded
//! assignment set toward each application's declared placement. Key concepts:
//!
//! - **Eligible cluster**: a cluster satisfying an application's selector
//!   (every cluster when no selector is declared).
//! - **Valid assignment**: an existing assignment whose cluster is still in
//!   the eligible set; anything else is stale and gets deleted.
//! - **Operation**: one create/delete/keep per assignment, the unit applied
//!   by the store layer.
//!
//! # Invariants
//!
//! - The engine performs no I/O and never mutates its inputs.
//! - Which valid assignments survive a scale-down is deterministic (original
//!   record order); only the choice of NEW clusters is randomized, and that
//!   choice sits behind [`SelectionStrategy`] so tests can pin it down.
//! - At most one assignment per (application, cluster) pair, assumed on input
//!   and preserved on output.
//! - Zero eligible clusters is a [`Diagnostic`], never an error.

mod error;
mod ops;
mod reconcile;
mod selector;
mod strategy;

pub use error::InsufficientClusters;
pub use ops::{AssignmentOp, Diagnostic, OpAction};
pub use reconcile::{
    AppOutcome, FleetReconciliation, ReconcileContext, Reconciler, Reconciliation,
};
pub use selector::is_eligible;
pub use strategy::{FirstN, RandomSelection, SelectionStrategy};

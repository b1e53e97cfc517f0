//! Engine errors.

use thiserror::Error;

/// An application demanded more new placements than there are unscheduled
/// eligible clusters left to host them.
///
/// `requested` is the number of assignments still to create, not the
/// application's total desired count.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("requested {requested} assignments, but only {available} clusters are available")]
pub struct InsufficientClusters {
    pub requested: usize,
    pub available: usize,
}

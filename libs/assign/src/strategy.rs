//! Cluster selection strategies for new assignments.

use fleet_types::Cluster;
use rand::seq::index;

/// Chooses which unscheduled clusters receive new assignments.
///
/// The engine only contracts the COUNT of selections; the concrete choice is
/// a strategy so production can stay uniform random while tests assert exact
/// outcomes.
pub trait SelectionStrategy {
    /// Select `count` distinct clusters from `candidates`, `count <=
    /// candidates.len()`. Implementations must not repeat a candidate.
    fn select<'a>(&mut self, candidates: &[&'a Cluster], count: usize) -> Vec<&'a Cluster>;
}

/// Uniform random selection without replacement. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelection;

impl SelectionStrategy for RandomSelection {
    fn select<'a>(&mut self, candidates: &[&'a Cluster], count: usize) -> Vec<&'a Cluster> {
        let mut rng = rand::rng();
        index::sample(&mut rng, candidates.len(), count)
            .into_iter()
            .map(|i| candidates[i])
            .collect()
    }
}

/// Deterministic prefix selection, for tests and reproducible runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstN;

impl SelectionStrategy for FirstN {
    fn select<'a>(&mut self, candidates: &[&'a Cluster], count: usize) -> Vec<&'a Cluster> {
        candidates[..count].to_vec()
    }
}

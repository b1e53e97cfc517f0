//! The diffing algorithm that converges recorded assignments to desired
//! placement.

use std::collections::BTreeSet;

use fleet_types::{ApplicationDeployment, Assignment, Cluster, PlacementCount};

use crate::error::InsufficientClusters;
use crate::ops::{AssignmentOp, Diagnostic};
use crate::selector::eligible_clusters;
use crate::strategy::{RandomSelection, SelectionStrategy};

/// Point-in-time snapshot the engine reconciles against.
///
/// The engine assumes the snapshot is internally consistent and does not
/// detect it going stale; applying the resulting operations under a
/// single-writer discipline is the store's job.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub clusters: &'a [Cluster],
    pub assignments: &'a [Assignment],
}

/// The outcome of reconciling one application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Ordered operations: stale deletes, then keep/delete over valid
    /// assignments in record order, then creates.
    pub operations: Vec<AssignmentOp>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One application's result within a fleet-wide pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOutcome {
    pub application: String,
    pub result: Result<Reconciliation, InsufficientClusters>,
}

/// The outcome of reconciling the whole fleet.
///
/// Applications are reconciled independently; one application running out of
/// clusters does not discard the operations computed for the others. Callers
/// that want all-or-nothing semantics instead use [`into_result`].
///
/// [`into_result`]: FleetReconciliation::into_result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FleetReconciliation {
    /// Deletes for assignments whose application no longer exists.
    pub orphaned: Vec<AssignmentOp>,
    /// Per-application outcomes, in application input order.
    pub outcomes: Vec<AppOutcome>,
}

impl FleetReconciliation {
    /// All operations from the orphan sweep and every successful application,
    /// in emission order.
    pub fn operations(&self) -> impl Iterator<Item = &AssignmentOp> {
        self.orphaned.iter().chain(
            self.outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok())
                .flat_map(|r| r.operations.iter()),
        )
    }

    /// Diagnostics from every successful application.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flat_map(|r| r.diagnostics.iter())
    }

    /// Applications that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &InsufficientClusters)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(_) => None,
                Err(e) => Some((o.application.as_str(), e)),
            })
    }

    /// Collapse to a flat operation list, failing on the first application
    /// error and discarding everything else.
    pub fn into_result(self) -> Result<Vec<AssignmentOp>, InsufficientClusters> {
        let mut operations = self.orphaned;
        for outcome in self.outcomes {
            operations.extend(outcome.result?.operations);
        }
        Ok(operations)
    }
}

/// The reconciliation engine, generic over how new clusters are chosen.
#[derive(Debug, Clone, Default)]
pub struct Reconciler<S = RandomSelection> {
    strategy: S,
}

impl Reconciler<RandomSelection> {
    /// An engine with uniform random cluster selection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: SelectionStrategy> Reconciler<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Self { strategy }
    }

    /// Reconcile a single application against the snapshot.
    pub fn reconcile(
        &mut self,
        ctx: ReconcileContext<'_>,
        application: &ApplicationDeployment,
    ) -> Result<Reconciliation, InsufficientClusters> {
        let (eligible, diagnostic) = eligible_clusters(ctx.clusters, application);
        let eligible_names: BTreeSet<&str> = eligible.iter().map(|c| c.name()).collect();

        let mut valid: Vec<&Assignment> = Vec::new();
        let mut operations = Vec::new();

        // Stale references (cluster gone, renamed, or fallen out of the
        // selector) are deleted unconditionally and never count toward sizing.
        for assignment in ctx
            .assignments
            .iter()
            .filter(|a| a.application() == application.name())
        {
            if eligible_names.contains(assignment.cluster()) {
                valid.push(assignment);
            } else {
                operations.push(AssignmentOp::delete(assignment.clone()));
            }
        }

        let desired = match application.spec.clusters {
            PlacementCount::All => eligible.len(),
            PlacementCount::Count(n) => n as usize,
        };

        // Scale-down is deterministic: the first `excess` valid assignments
        // in record order go, the rest stay.
        let excess = valid.len().saturating_sub(desired);
        for (i, assignment) in valid.iter().enumerate() {
            if i < excess {
                operations.push(AssignmentOp::delete((*assignment).clone()));
            } else {
                operations.push(AssignmentOp::keep((*assignment).clone()));
            }
        }

        operations.extend(self.new_assignments(&eligible, &valid, application, desired)?);

        Ok(Reconciliation {
            operations,
            diagnostics: diagnostic.into_iter().collect(),
        })
    }

    /// Reconcile every application, pruning assignments for applications that
    /// no longer exist first.
    pub fn reconcile_all(
        &mut self,
        ctx: ReconcileContext<'_>,
        applications: &[ApplicationDeployment],
    ) -> FleetReconciliation {
        let known: BTreeSet<&str> = applications.iter().map(|a| a.name()).collect();

        let orphaned = ctx
            .assignments
            .iter()
            .filter(|a| !known.contains(a.application()))
            .map(|a| AssignmentOp::delete(a.clone()))
            .collect();

        let outcomes = applications
            .iter()
            .map(|application| AppOutcome {
                application: application.name().to_string(),
                result: self.reconcile(ctx, application),
            })
            .collect();

        FleetReconciliation { orphaned, outcomes }
    }

    fn new_assignments(
        &mut self,
        eligible: &[&Cluster],
        valid: &[&Assignment],
        application: &ApplicationDeployment,
        desired: usize,
    ) -> Result<Vec<AssignmentOp>, InsufficientClusters> {
        // Zero eligible clusters is a diagnostic, not a failure; there is
        // nothing to create.
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let Some(shortfall) = desired.checked_sub(valid.len()).filter(|n| *n > 0) else {
            return Ok(Vec::new());
        };

        let scheduled: BTreeSet<&str> = valid.iter().map(|a| a.cluster()).collect();
        let unscheduled: Vec<&Cluster> = eligible
            .iter()
            .filter(|c| !scheduled.contains(c.name()))
            .copied()
            .collect();

        // One assignment per (application, cluster) pair: demand beyond the
        // unscheduled pool cannot be met.
        if shortfall > unscheduled.len() {
            return Err(InsufficientClusters {
                requested: shortfall,
                available: unscheduled.len(),
            });
        }

        Ok(self
            .strategy
            .select(&unscheduled, shortfall)
            .into_iter()
            .map(|cluster| {
                AssignmentOp::create(Assignment::new(application.name(), cluster.name()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OpAction;
    use crate::strategy::FirstN;
    use fleet_types::{
        ApplicationDeploymentSpec, ClusterSpec, Metadata, PlacementCount,
    };

    fn cluster(name: &str) -> Cluster {
        Cluster {
            kind: Cluster::KIND.to_string(),
            metadata: Metadata {
                name: name.to_string(),
                labels: None,
            },
            spec: ClusterSpec::default(),
        }
    }

    fn labeled_cluster(name: &str, key: &str, value: &str) -> Cluster {
        let mut c = cluster(name);
        c.metadata.labels = Some([(key.to_string(), value.to_string())].into());
        c
    }

    fn app(name: &str, clusters: PlacementCount) -> ApplicationDeployment {
        ApplicationDeployment {
            kind: ApplicationDeployment::KIND.to_string(),
            metadata: Metadata {
                name: name.to_string(),
                labels: None,
            },
            spec: ApplicationDeploymentSpec {
                clusters,
                selector: None,
                repo: "https://git.example.com/app.git".into(),
                path: "app.yaml".into(),
                git_ref: "main".into(),
                values: None,
            },
        }
    }

    fn app_with_selector(
        name: &str,
        clusters: PlacementCount,
        key: &str,
        value: &str,
    ) -> ApplicationDeployment {
        let mut a = app(name, clusters);
        a.spec.selector = Some([(key.to_string(), value.to_string())].into());
        a
    }

    fn actions(ops: &[AssignmentOp]) -> Vec<(OpAction, &str)> {
        ops.iter().map(|o| (o.action, o.assignment.name())).collect()
    }

    #[test]
    fn satisfied_application_only_keeps() {
        let clusters = vec![cluster("a"), cluster("b")];
        let assignments = vec![Assignment::new("billing", "a"), Assignment::new("billing", "b")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let result = Reconciler::new()
            .reconcile(ctx, &app("billing", PlacementCount::Count(2)))
            .unwrap();

        assert_eq!(
            actions(&result.operations),
            vec![(OpAction::Keep, "billing-a"), (OpAction::Keep, "billing-b")]
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn all_on_empty_history_creates_one_per_cluster() {
        let clusters = vec![cluster("a"), cluster("b"), cluster("c")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &[],
        };

        let result = Reconciler::new()
            .reconcile(ctx, &app("billing", PlacementCount::All))
            .unwrap();

        let mut created: Vec<&str> = result
            .operations
            .iter()
            .map(|o| {
                assert_eq!(o.action, OpAction::Create);
                o.assignment.cluster()
            })
            .collect();
        created.sort_unstable();
        assert_eq!(created, vec!["a", "b", "c"]);
    }

    #[test]
    fn scale_down_deletes_earliest_assignments_first() {
        let clusters = vec![cluster("a"), cluster("b")];
        let assignments = vec![Assignment::new("billing", "a"), Assignment::new("billing", "b")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let result = Reconciler::new()
            .reconcile(ctx, &app("billing", PlacementCount::Count(1)))
            .unwrap();

        assert_eq!(
            actions(&result.operations),
            vec![
                (OpAction::Delete, "billing-a"),
                (OpAction::Keep, "billing-b")
            ]
        );
    }

    #[test]
    fn removed_cluster_invalidates_its_assignment() {
        let clusters = vec![cluster("b")];
        let assignments = vec![Assignment::new("billing", "a"), Assignment::new("billing", "b")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let result = Reconciler::new()
            .reconcile(ctx, &app("billing", PlacementCount::Count(1)))
            .unwrap();

        assert_eq!(
            actions(&result.operations),
            vec![
                (OpAction::Delete, "billing-a"),
                (OpAction::Keep, "billing-b")
            ]
        );
    }

    #[test]
    fn deselected_cluster_invalidates_and_replacement_is_created() {
        let clusters = vec![
            labeled_cluster("a", "region", "us-west"),
            labeled_cluster("b", "region", "us-east"),
        ];
        let assignments = vec![Assignment::new("billing", "a")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let result = Reconciler::with_strategy(FirstN)
            .reconcile(
                ctx,
                &app_with_selector("billing", PlacementCount::Count(1), "region", "us-east"),
            )
            .unwrap();

        assert_eq!(
            actions(&result.operations),
            vec![
                (OpAction::Delete, "billing-a"),
                (OpAction::Create, "billing-b")
            ]
        );
    }

    #[test]
    fn shortfall_beyond_pool_fails_with_counts() {
        let clusters = vec![cluster("a")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &[],
        };

        let err = Reconciler::new()
            .reconcile(ctx, &app("billing", PlacementCount::Count(2)))
            .unwrap_err();

        assert_eq!(
            err,
            InsufficientClusters {
                requested: 2,
                available: 1
            }
        );
    }

    #[test]
    fn unmatched_selector_reports_diagnostic_without_failing() {
        let clusters = vec![labeled_cluster("a", "region", "us-west")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &[],
        };

        let result = Reconciler::new()
            .reconcile(
                ctx,
                &app_with_selector("billing", PlacementCount::Count(2), "region", "eu-west"),
            )
            .unwrap();

        assert!(result.operations.is_empty());
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::NoEligibleClusters {
                application: "billing".to_string()
            }]
        );
    }

    #[test]
    fn creates_fill_only_unscheduled_clusters() {
        let clusters = vec![cluster("a"), cluster("b"), cluster("c")];
        let assignments = vec![Assignment::new("billing", "b")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let result = Reconciler::with_strategy(FirstN)
            .reconcile(ctx, &app("billing", PlacementCount::Count(3)))
            .unwrap();

        assert_eq!(
            actions(&result.operations),
            vec![
                (OpAction::Keep, "billing-b"),
                (OpAction::Create, "billing-a"),
                (OpAction::Create, "billing-c"),
            ]
        );
    }

    #[test]
    fn reconcile_all_prunes_removed_applications() {
        let clusters = vec![cluster("a"), cluster("b")];
        let assignments = vec![
            Assignment::new("legacy", "a"),
            Assignment::new("billing", "b"),
            Assignment::new("legacy", "b"),
        ];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let fleet = Reconciler::new()
            .reconcile_all(ctx, &[app("billing", PlacementCount::Count(1))]);

        assert_eq!(
            actions(&fleet.orphaned),
            vec![
                (OpAction::Delete, "legacy-a"),
                (OpAction::Delete, "legacy-b")
            ]
        );
        let ops: Vec<_> = fleet.operations().cloned().collect();
        assert_eq!(
            actions(&ops),
            vec![
                (OpAction::Delete, "legacy-a"),
                (OpAction::Delete, "legacy-b"),
                (OpAction::Keep, "billing-b"),
            ]
        );
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn one_failing_application_does_not_discard_the_others() {
        let clusters = vec![cluster("a")];
        let assignments = vec![Assignment::new("billing", "a")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };

        let apps = vec![
            app("billing", PlacementCount::Count(1)),
            app("greedy", PlacementCount::Count(5)),
        ];
        let fleet = Reconciler::new().reconcile_all(ctx, &apps);

        let ops: Vec<_> = fleet.operations().cloned().collect();
        assert_eq!(actions(&ops), vec![(OpAction::Keep, "billing-a")]);

        let failures: Vec<_> = fleet.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "greedy");
        assert_eq!(
            *failures[0].1,
            InsufficientClusters {
                requested: 5,
                available: 1
            }
        );
    }

    #[test]
    fn into_result_restores_all_or_nothing() {
        let clusters = vec![cluster("a")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &[],
        };

        let apps = vec![
            app("billing", PlacementCount::Count(1)),
            app("greedy", PlacementCount::Count(5)),
        ];
        let fleet = Reconciler::with_strategy(FirstN).reconcile_all(ctx, &apps);
        assert!(fleet.into_result().is_err());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let clusters = vec![cluster("a"), cluster("b"), cluster("c")];
        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &[],
        };
        let application = app("billing", PlacementCount::Count(2));

        let mut engine = Reconciler::new();
        let first = engine.reconcile(ctx, &application).unwrap();

        // Fold the created assignments back in, as the store would.
        let assignments: Vec<Assignment> = first
            .operations
            .iter()
            .filter(|o| o.action == OpAction::Create)
            .map(|o| o.assignment.clone())
            .collect();
        assert_eq!(assignments.len(), 2);

        let ctx = ReconcileContext {
            clusters: &clusters,
            assignments: &assignments,
        };
        let second = engine.reconcile(ctx, &application).unwrap();
        assert!(second.operations.iter().all(|o| o.action == OpAction::Keep));
        assert_eq!(second.operations.len(), 2);
    }
}

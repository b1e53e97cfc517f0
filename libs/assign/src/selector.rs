//! Selector evaluation: which clusters may host an application.

use std::collections::BTreeMap;

use fleet_types::{ApplicationDeployment, Cluster};

use crate::ops::Diagnostic;

/// The selector key matched against a cluster's environment list instead of
/// its label map.
const ENVIRONMENT_KEY: &str = "environment";

/// Whether `cluster` satisfies every criterion in `selector`.
///
/// The `environment` key requires membership in the cluster's environment
/// list; every other key requires an exact label match. A cluster without an
/// environment list or label map fails the corresponding criterion.
pub fn is_eligible(cluster: &Cluster, selector: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(key, value)| {
        if key == ENVIRONMENT_KEY {
            cluster
                .environments()
                .is_some_and(|envs| envs.iter().any(|e| e == value))
        } else {
            cluster
                .labels()
                .and_then(|labels| labels.get(key))
                .is_some_and(|v| v == value)
        }
    })
}

/// The clusters eligible to host `application`, in inventory order.
///
/// An absent or empty selector makes every cluster eligible. A selector that
/// matches nothing yields an empty set plus a diagnostic; it is not an error.
pub(crate) fn eligible_clusters<'a>(
    clusters: &'a [Cluster],
    application: &ApplicationDeployment,
) -> (Vec<&'a Cluster>, Option<Diagnostic>) {
    let selector = match application.selector() {
        Some(selector) if !selector.is_empty() => selector,
        _ => return (clusters.iter().collect(), None),
    };

    let eligible: Vec<&Cluster> = clusters
        .iter()
        .filter(|c| is_eligible(c, selector))
        .collect();

    let diagnostic = eligible.is_empty().then(|| Diagnostic::NoEligibleClusters {
        application: application.name().to_string(),
    });

    (eligible, diagnostic)
}

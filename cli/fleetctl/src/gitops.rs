//! Cluster gitops repository layout.
//!
//! Each cluster gets a directory under `clusters/` holding a
//! `kustomization.yaml` whose resources point at the rendered application
//! directories. Directories for clusters that left the inventory are pruned.

use std::io;
use std::path::{Path, PathBuf};

use fleet_types::{Assignment, Cluster};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::info;

const CLUSTERS_DIR: &str = "clusters";
const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

#[derive(Debug, Error)]
pub enum GitOpsError {
    #[error("io error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> GitOpsError + '_ {
    move |source| GitOpsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Kustomization {
    api_version: &'static str,
    kind: &'static str,
    metadata: KustomizationMetadata,
    resources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct KustomizationMetadata {
    name: String,
}

impl Kustomization {
    fn for_cluster(cluster: &Cluster, assignments: &[&Assignment]) -> Self {
        let mut resources: Vec<String> = assignments
            .iter()
            .map(|a| format!("../../applications/{}", a.application()))
            .collect();
        resources.sort();

        Self {
            api_version: "kustomize.config.k8s.io/v1beta1",
            kind: "Kustomization",
            metadata: KustomizationMetadata {
                name: cluster.name().to_string(),
            },
            resources,
        }
    }
}

/// Materialize per-cluster directories in the gitops repository.
pub async fn apply(
    clusters: &[Cluster],
    assignments: &[Assignment],
    output: &Path,
) -> Result<(), GitOpsError> {
    let clusters_dir = output.join(CLUSTERS_DIR);
    fs::create_dir_all(&clusters_dir)
        .await
        .map_err(io_err(&clusters_dir))?;

    prune_removed_clusters(clusters, &clusters_dir).await?;

    for cluster in clusters {
        let assigned: Vec<&Assignment> = assignments
            .iter()
            .filter(|a| a.cluster() == cluster.name())
            .collect();

        let dir = clusters_dir.join(cluster.name());
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(io_err(&dir)(source)),
        }
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;

        let kustomization = Kustomization::for_cluster(cluster, &assigned);
        let path = dir.join(KUSTOMIZATION_FILE);
        let contents =
            serde_yaml::to_string(&kustomization).map_err(|source| GitOpsError::Serialize {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, contents).await.map_err(io_err(&path))?;

        info!(
            cluster = cluster.name(),
            applications = kustomization.resources.len(),
            "wrote cluster directory"
        );
    }

    Ok(())
}

async fn prune_removed_clusters(
    clusters: &[Cluster],
    clusters_dir: &Path,
) -> Result<(), GitOpsError> {
    let known: std::collections::BTreeSet<&str> = clusters.iter().map(|c| c.name()).collect();

    let mut entries = fs::read_dir(clusters_dir)
        .await
        .map_err(io_err(clusters_dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err(clusters_dir))? {
        let is_dir = entry
            .file_type()
            .await
            .map_err(io_err(&entry.path()))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        let keep = name.to_str().is_some_and(|n| known.contains(n));
        if !keep {
            let path = entry.path();
            info!(path = %path.display(), "pruning removed cluster");
            fs::remove_dir_all(&path).await.map_err(io_err(&path))?;
        }
    }
    Ok(())
}

//! Control-plane repository store.
//!
//! The control-plane checkout holds one YAML file per record, grouped in a
//! directory per kind. Records are validated here, before they ever reach the
//! reconciliation engine; the engine trusts its inputs.
//!
//! Operations are applied in a single pass over a local checkout, which is
//! the single-writer discipline the engine relies on.

use std::io;
use std::path::{Path, PathBuf};

use fleet_assign::{AssignmentOp, OpAction};
use fleet_types::{
    ApplicationDeployment, ApplicationTemplate, Assignment, Cluster, InvalidRecord,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

const APPLICATIONS_DIR: &str = "applications";
const ASSIGNMENTS_DIR: &str = "assignments";
const CLUSTERS_DIR: &str = "clusters";
const TEMPLATES_DIR: &str = "templates";

/// Store errors, always carrying the offending path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid record in {path}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: InvalidRecord,
    },

    #[error("duplicate {kind} name {name} in {path}")]
    Duplicate {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load and parse one YAML file.
pub async fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = fs::read_to_string(path).await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// A client for the contents of a control-plane repository checkout.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    root: PathBuf,
}

impl ControlPlane {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn load_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        self.load_dir(CLUSTERS_DIR, Cluster::KIND, Cluster::validate, Cluster::name)
            .await
    }

    pub async fn load_applications(&self) -> Result<Vec<ApplicationDeployment>, StoreError> {
        self.load_dir(
            APPLICATIONS_DIR,
            ApplicationDeployment::KIND,
            ApplicationDeployment::validate,
            ApplicationDeployment::name,
        )
        .await
    }

    pub async fn load_assignments(&self) -> Result<Vec<Assignment>, StoreError> {
        self.load_dir(
            ASSIGNMENTS_DIR,
            Assignment::KIND,
            Assignment::validate,
            Assignment::name,
        )
        .await
    }

    pub async fn load_templates(&self) -> Result<Vec<ApplicationTemplate>, StoreError> {
        self.load_dir(
            TEMPLATES_DIR,
            ApplicationTemplate::KIND,
            ApplicationTemplate::validate,
            ApplicationTemplate::name,
        )
        .await
    }

    /// Persist the effects of a reconciliation pass: `create` writes a new
    /// assignment record, `delete` removes one, `keep` is a no-op.
    pub async fn apply_operations<'a>(
        &self,
        operations: impl IntoIterator<Item = &'a AssignmentOp>,
    ) -> Result<(), StoreError> {
        for op in operations {
            let assignment = &op.assignment;
            match op.action {
                OpAction::Create => {
                    info!(
                        application = assignment.application(),
                        cluster = assignment.cluster(),
                        "creating assignment"
                    );
                    self.write_assignment(assignment).await?;
                }
                OpAction::Delete => {
                    info!(
                        application = assignment.application(),
                        cluster = assignment.cluster(),
                        "deleting assignment"
                    );
                    self.delete_assignment(assignment.name()).await?;
                }
                OpAction::Keep => {
                    debug!(
                        application = assignment.application(),
                        cluster = assignment.cluster(),
                        "keeping assignment"
                    );
                }
            }
        }
        Ok(())
    }

    pub async fn write_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let dir = self.root.join(ASSIGNMENTS_DIR);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Write {
                path: dir.clone(),
                source,
            })?;
        let path = self.assignment_path(assignment.name());
        let contents = serde_yaml::to_string(assignment).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, contents)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })
    }

    pub async fn delete_assignment(&self, name: &str) -> Result<(), StoreError> {
        let path = self.assignment_path(name);
        fs::remove_file(&path)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })
    }

    fn assignment_path(&self, name: &str) -> PathBuf {
        self.root.join(ASSIGNMENTS_DIR).join(format!("{name}.yaml"))
    }

    /// Load every record file under `dir`, sorted by file name so record
    /// order (and with it scale-down order) is stable across runs. A missing
    /// directory is an empty set.
    async fn load_dir<T, V, N>(
        &self,
        dir: &str,
        kind: &'static str,
        validate: V,
        name_of: N,
    ) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), InvalidRecord>,
        N: Fn(&T) -> &str,
    {
        let dir = self.root.join(dir);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: dir.clone(),
                    source,
                })
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })? {
            let is_file = entry
                .file_type()
                .await
                .map_err(|source| StoreError::Io {
                    path: entry.path(),
                    source,
                })?
                .is_file();
            if is_file {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        let mut seen = std::collections::BTreeSet::new();
        for path in paths {
            let record: T = load_yaml(&path).await?;
            validate(&record).map_err(|source| StoreError::Invalid {
                path: path.clone(),
                source,
            })?;
            if !seen.insert(name_of(&record).to_string()) {
                return Err(StoreError::Duplicate {
                    kind,
                    name: name_of(&record).to_string(),
                    path,
                });
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn loads_records_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "clusters/b.yaml",
            "kind: Cluster\nmetadata:\n  name: b\n",
        );
        write(
            dir.path(),
            "clusters/a.yaml",
            "kind: Cluster\nmetadata:\n  name: a\n",
        );

        let store = ControlPlane::new(dir.path());
        let clusters = store.load_clusters().await.unwrap();
        let names: Vec<&str> = clusters.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = ControlPlane::new(dir.path());
        assert!(store.load_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_record_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "assignments/broken.yaml",
            "kind: ApplicationAssignment\nmetadata:\n  name: broken\nspec:\n  application: billing\n  cluster: east-1\n",
        );

        let store = ControlPlane::new(dir.path());
        let err = store.load_assignments().await.unwrap_err();
        match err {
            StoreError::Invalid { path, .. } => {
                assert!(path.ends_with("assignments/broken.yaml"))
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "clusters/one.yaml",
            "kind: Cluster\nmetadata:\n  name: east-1\n",
        );
        write(
            dir.path(),
            "clusters/two.yaml",
            "kind: Cluster\nmetadata:\n  name: east-1\n",
        );

        let store = ControlPlane::new(dir.path());
        assert!(matches!(
            store.load_clusters().await.unwrap_err(),
            StoreError::Duplicate { .. }
        ));
    }

    #[tokio::test]
    async fn apply_operations_round_trips_assignments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assignments")).unwrap();
        let store = ControlPlane::new(dir.path());

        let created = Assignment::new("billing", "east-1");
        let ops = vec![AssignmentOp::create(created.clone())];
        store.apply_operations(&ops).await.unwrap();

        let loaded = store.load_assignments().await.unwrap();
        assert_eq!(loaded, vec![created.clone()]);

        let ops = vec![AssignmentOp::delete(created)];
        store.apply_operations(&ops).await.unwrap();
        assert!(store.load_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconcile_then_apply_converges() {
        use fleet_assign::{ReconcileContext, Reconciler};

        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "clusters/east-1.yaml",
            "kind: Cluster\nmetadata:\n  name: east-1\n",
        );
        write(
            dir.path(),
            "clusters/west-2.yaml",
            "kind: Cluster\nmetadata:\n  name: west-2\n",
        );
        write(
            dir.path(),
            "applications/billing.yaml",
            "kind: ApplicationDeployment\nmetadata:\n  name: billing\nspec:\n  clusters: all\n  repo: https://git.example.com/billing.git\n  path: app.yaml\n  ref: main\n",
        );

        let store = ControlPlane::new(dir.path());
        let mut engine = Reconciler::new();

        // First pass creates one assignment per cluster.
        let clusters = store.load_clusters().await.unwrap();
        let assignments = store.load_assignments().await.unwrap();
        let applications = store.load_applications().await.unwrap();
        let fleet = engine.reconcile_all(
            ReconcileContext {
                clusters: &clusters,
                assignments: &assignments,
            },
            &applications,
        );
        assert!(fleet.failures().next().is_none());
        store.apply_operations(fleet.operations()).await.unwrap();
        assert_eq!(store.load_assignments().await.unwrap().len(), 2);

        // Second pass over the stored state only keeps.
        let assignments = store.load_assignments().await.unwrap();
        let fleet = engine.reconcile_all(
            ReconcileContext {
                clusters: &clusters,
                assignments: &assignments,
            },
            &applications,
        );
        assert!(fleet
            .operations()
            .all(|op| op.action == OpAction::Keep));
        store.apply_operations(fleet.operations()).await.unwrap();
        assert_eq!(store.load_assignments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn keep_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assignments")).unwrap();
        let store = ControlPlane::new(dir.path());

        // Keep must not require the record to exist on disk.
        let ops = vec![AssignmentOp::keep(Assignment::new("billing", "east-1"))];
        store.apply_operations(&ops).await.unwrap();
        assert!(store.load_assignments().await.unwrap().is_empty());
    }
}

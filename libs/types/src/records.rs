//! Control-plane record definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::InvalidRecord;

/// Free-form values carried by applications, templates, and deployments.
pub type Values = BTreeMap<String, serde_yaml::Value>;

/// Shared record metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// A deployment target registered with the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default = "Cluster::kind_name")]
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: ClusterSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<Vec<String>>,
}

impl Cluster {
    pub const KIND: &'static str = "Cluster";

    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.labels.as_ref()
    }

    pub fn environments(&self) -> Option<&[String]> {
        self.spec.environments.as_deref()
    }

    pub fn validate(&self) -> Result<(), InvalidRecord> {
        check_kind(&self.kind, Self::KIND, &self.metadata.name)?;
        check_name(Self::KIND, &self.metadata.name)
    }
}

/// Desired placement width for an application: an explicit count, or every
/// eligible cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementCount {
    Count(u32),
    All,
}

impl Serialize for PlacementCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PlacementCount::Count(n) => serializer.serialize_u32(*n),
            PlacementCount::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for PlacementCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountVisitor;

        impl Visitor<'_> for CountVisitor {
            type Value = PlacementCount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive integer or the string \"all\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                u32::try_from(v)
                    .map(PlacementCount::Count)
                    .map_err(|_| E::custom(format!("cluster count {v} out of range")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u32::try_from(v)
                    .map(PlacementCount::Count)
                    .map_err(|_| E::custom(format!("cluster count {v} out of range")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == "all" {
                    Ok(PlacementCount::All)
                } else {
                    Err(E::custom(format!("expected \"all\", found {v:?}")))
                }
            }
        }

        deserializer.deserialize_any(CountVisitor)
    }
}

/// A declared desired placement of one application across the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDeployment {
    #[serde(default = "ApplicationDeployment::kind_name")]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ApplicationDeploymentSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDeploymentSpec {
    pub clusters: PlacementCount,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,

    /// Git repository holding the application's `app.yaml`.
    pub repo: String,
    pub path: String,
    #[serde(rename = "ref")]
    pub git_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<DeploymentValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Values>,
}

impl ApplicationDeployment {
    pub const KIND: &'static str = "ApplicationDeployment";

    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn selector(&self) -> Option<&BTreeMap<String, String>> {
        self.spec.selector.as_ref()
    }

    pub fn validate(&self) -> Result<(), InvalidRecord> {
        check_kind(&self.kind, Self::KIND, &self.metadata.name)?;
        check_name(Self::KIND, &self.metadata.name)?;
        if self.spec.clusters == PlacementCount::Count(0) {
            return Err(InvalidRecord::ZeroPlacementCount {
                name: self.metadata.name.clone(),
            });
        }
        Ok(())
    }
}

/// A recorded placement of one application on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default = "Assignment::kind_name")]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: AssignmentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSpec {
    pub application: String,
    pub cluster: String,
}

impl Assignment {
    pub const KIND: &'static str = "ApplicationAssignment";

    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    /// Synthesize the assignment of `application` to `cluster`. The name is
    /// derived, which is what keeps (application, cluster) pairs unique.
    pub fn new(application: &str, cluster: &str) -> Self {
        Self {
            kind: Self::kind_name(),
            metadata: Metadata {
                name: format!("{application}-{cluster}"),
                labels: None,
            },
            spec: AssignmentSpec {
                application: application.to_string(),
                cluster: cluster.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn application(&self) -> &str {
        &self.spec.application
    }

    pub fn cluster(&self) -> &str {
        &self.spec.cluster
    }

    pub fn validate(&self) -> Result<(), InvalidRecord> {
        check_kind(&self.kind, Self::KIND, &self.metadata.name)?;
        check_name(Self::KIND, &self.metadata.name)?;
        check_field(Self::KIND, &self.metadata.name, "spec.application", &self.spec.application)?;
        check_field(Self::KIND, &self.metadata.name, "spec.cluster", &self.spec.cluster)?;
        let expected = format!("{}-{}", self.spec.application, self.spec.cluster);
        if self.metadata.name != expected {
            return Err(InvalidRecord::AssignmentNameMismatch {
                name: self.metadata.name.clone(),
                expected,
            });
        }
        Ok(())
    }
}

/// A pointer to a template repository that application manifests are rendered
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTemplate {
    #[serde(default = "ApplicationTemplate::kind_name")]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ApplicationTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTemplateSpec {
    pub repo: String,
    pub path: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl ApplicationTemplate {
    pub const KIND: &'static str = "ApplicationTemplate";

    fn kind_name() -> String {
        Self::KIND.to_string()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn validate(&self) -> Result<(), InvalidRecord> {
        check_kind(&self.kind, Self::KIND, &self.metadata.name)?;
        check_name(Self::KIND, &self.metadata.name)?;
        check_field(Self::KIND, &self.metadata.name, "spec.repo", &self.spec.repo)?;
        check_field(Self::KIND, &self.metadata.name, "spec.path", &self.spec.path)
    }
}

/// The `app.yaml` at the root of an application repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Name of the ApplicationTemplate this application renders through.
    pub template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Values>,
}

/// The `template.yaml` inside a template repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Directory of manifest files, relative to the template.yaml.
    pub manifests: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, TemplateParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
}

fn check_name(kind: &'static str, name: &str) -> Result<(), InvalidRecord> {
    if name.trim().is_empty() {
        return Err(InvalidRecord::EmptyName { kind });
    }
    Ok(())
}

fn check_field(
    kind: &'static str,
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<(), InvalidRecord> {
    if value.trim().is_empty() {
        return Err(InvalidRecord::EmptyField {
            kind,
            name: name.to_string(),
            field,
        });
    }
    Ok(())
}

fn check_kind(found: &str, expected: &'static str, name: &str) -> Result<(), InvalidRecord> {
    if found != expected {
        return Err(InvalidRecord::KindMismatch {
            name: name.to_string(),
            expected,
            found: found.to_string(),
        });
    }
    Ok(())
}

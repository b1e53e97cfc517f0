//! Manifest rendering: application deployments x templates -> gitops files.
//!
//! Each deployment names an application repository holding an `app.yaml`,
//! which in turn names an ApplicationTemplate. The template repository's
//! `template.yaml` declares a manifest directory and the parameters those
//! manifests take; parameter values are merged from template defaults,
//! application values, and per-deployment overrides, in that order.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use fleet_types::{Application, ApplicationDeployment, ApplicationTemplate, Template};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::git::{GitError, SparseCheckout};
use crate::store::{load_yaml, StoreError};

const APPLICATIONS_DIR: &str = "applications";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot find ApplicationTemplate {template} for ApplicationDeployment {application}")]
    TemplateNotFound {
        application: String,
        template: String,
    },

    #[error("there are multiple ApplicationDeployments with the name {name}")]
    DuplicateDeployment { name: String },

    #[error("cannot generate values for template {template}; missing parameters: {parameters:?}")]
    MissingParameters {
        template: String,
        parameters: Vec<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("io error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> RenderError + '_ {
    move |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Render every deployment into `{output}/applications/{name}/`.
///
/// The applications directory is reset first so removed deployments do not
/// linger in the gitops repository.
pub async fn render_all(
    deployments: &[ApplicationDeployment],
    templates: &[ApplicationTemplate],
    output: &Path,
) -> Result<(), RenderError> {
    let applications_dir = output.join(APPLICATIONS_DIR);
    match fs::remove_dir_all(&applications_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(io_err(&applications_dir)(source)),
    }
    fs::create_dir_all(&applications_dir)
        .await
        .map_err(io_err(&applications_dir))?;

    let template_map: BTreeMap<&str, &ApplicationTemplate> =
        templates.iter().map(|t| (t.name(), t)).collect();

    for deployment in deployments {
        render(deployment, &template_map, output).await?;
    }
    Ok(())
}

async fn render(
    deployment: &ApplicationDeployment,
    templates: &BTreeMap<&str, &ApplicationTemplate>,
    output: &Path,
) -> Result<(), RenderError> {
    info!(deployment = deployment.name(), "rendering");

    // Dereference the app.yaml named by the deployment.
    let app_checkout = SparseCheckout::clone(
        &deployment.spec.repo,
        &[&deployment.spec.path],
        &deployment.spec.git_ref,
    )
    .await?;
    let application: Application = load_yaml(&app_checkout.join(&deployment.spec.path)).await?;

    let app_template =
        templates
            .get(application.template.as_str())
            .ok_or_else(|| RenderError::TemplateNotFound {
                application: deployment.name().to_string(),
                template: application.template.clone(),
            })?;

    // Dereference the template.yaml, then widen the checkout to pull in the
    // manifest directory it points at.
    let template_checkout = SparseCheckout::clone(
        &app_template.spec.repo,
        &[&app_template.spec.path],
        &app_template.spec.git_ref,
    )
    .await?;
    let template: Template = load_yaml(&template_checkout.join(&app_template.spec.path)).await?;

    let manifest_dir_rel = Path::new(&app_template.spec.path)
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&template.manifests);
    let manifest_pattern = manifest_dir_rel.to_string_lossy();
    template_checkout
        .add_patterns(&[manifest_pattern.as_ref()])
        .await?;
    template_checkout.checkout(&app_template.spec.git_ref).await?;

    let values = generate_values(&template, &application, deployment)?;

    let out_dir = output.join(APPLICATIONS_DIR).join(deployment.name());
    if fs::try_exists(&out_dir).await.map_err(io_err(&out_dir))? {
        return Err(RenderError::DuplicateDeployment {
            name: deployment.name().to_string(),
        });
    }
    fs::create_dir_all(&out_dir).await.map_err(io_err(&out_dir))?;

    let manifest_dir = template_checkout.join(&manifest_dir_rel);
    let mut entries = fs::read_dir(&manifest_dir)
        .await
        .map_err(io_err(&manifest_dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_err(&manifest_dir))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(io_err(&path))?
            .is_file();
        if !is_file {
            continue;
        }

        let manifest = fs::read_to_string(&path).await.map_err(io_err(&path))?;
        let rendered = render_str(&manifest, &values);

        let out_file = out_dir.join(entry.file_name());
        fs::write(&out_file, rendered)
            .await
            .map_err(io_err(&out_file))?;
    }

    Ok(())
}

/// Merge parameter values: template defaults, then application values, then
/// deployment overrides. Every declared template parameter must be covered.
pub fn generate_values(
    template: &Template,
    application: &Application,
    deployment: &ApplicationDeployment,
) -> Result<BTreeMap<String, String>, RenderError> {
    let mut values: BTreeMap<String, String> = BTreeMap::new();

    for (key, parameter) in &template.parameters {
        if let Some(default) = &parameter.default {
            values.insert(key.clone(), value_to_string(default));
        }
    }
    if let Some(app_values) = &application.values {
        for (key, value) in app_values {
            values.insert(key.clone(), value_to_string(value));
        }
    }
    if let Some(overrides) = deployment
        .spec
        .values
        .as_ref()
        .and_then(|v| v.overrides.as_ref())
    {
        for (key, value) in overrides {
            values.insert(key.clone(), value_to_string(value));
        }
    }

    let missing: Vec<String> = template
        .parameters
        .keys()
        .filter(|p| !values.contains_key(*p))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(RenderError::MissingParameters {
            template: application.template.clone(),
            parameters: missing,
        });
    }

    Ok(values)
}

fn value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

/// Substitute `{{key}}` placeholders. Unknown keys are left verbatim so
/// manifests that carry their own templating syntax pass through untouched.
fn render_str(input: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match values.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

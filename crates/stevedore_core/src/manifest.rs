//! App manifest definitions.
//!
//! The manifest (`Appfile`) describes an app as a graph of components. Each
//! graph entry is either *local* (its artifacts live in the app directory) or
//! *external* (it points at another installable app and is deployed through a
//! nested run).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{DeployError, DeployResult};

/// Well-known manifest file name at the root of every app.
pub const MAIN_FILE: &str = "Appfile";

/// Scheme prefix stripped from artifact paths.
const FILE_SCHEME: &str = "file://";

/// Scheme prefix stripped from external source references.
const DOCKER_SCHEME: &str = "docker://";

/// A declared parameter with an optional default and description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// The default rendered as a string, if it is a scalar.
    pub fn default_value(&self) -> Option<String> {
        self.default.as_ref().and_then(scalar_to_string)
    }
}

/// One entry of a provider's artifact list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArtifactSpec {
    /// Splice in the artifact lists of other providers of the same component.
    Inherit { inherit: Vec<String> },
    /// Path to a template file, relative to the app directory.
    Path(String),
}

impl ArtifactSpec {
    /// Build a path entry.
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Build an inheritance directive.
    pub fn inherit<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Inherit {
            inherit: providers.into_iter().map(Into::into).collect(),
        }
    }
}

/// A component of the app graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphEntry {
    /// Source image of an external app (e.g. `docker://registry/app:1.0`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Provider override for this component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Artifact lists keyed by provider name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, Vec<ArtifactSpec>>,
    /// Parameters consumed by this component's artifacts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
}

impl GraphEntry {
    /// An entry is external when it names a source and carries no artifacts.
    pub fn is_external(&self) -> bool {
        self.source.is_some() && self.artifacts.is_empty()
    }

    /// The image reference of an external entry, without its scheme.
    pub fn source_image(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(|s| s.strip_prefix(DOCKER_SCHEME).unwrap_or(s))
    }

    /// Find a declared parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Parsed `Appfile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Default provider for all components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Global parameter declarations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<BTreeMap<String, GraphEntry>>,
}

impl Manifest {
    /// Load the manifest located at the root of an app directory.
    pub fn load_from_app(app_path: &Path) -> DeployResult<Self> {
        Self::load(&app_path.join(MAIN_FILE))
    }

    /// Load a manifest file. YAML and JSON are both accepted.
    pub fn load(path: &Path) -> DeployResult<Self> {
        if !path.exists() {
            return Err(DeployError::ManifestNotFound(path.to_path_buf()));
        }
        debug!("Loading manifest from {:?}", path);

        let content = fs::read_to_string(path)?;
        let manifest = Self::parse(&content).map_err(|e| DeployError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        manifest.validate().map_err(|e| DeployError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(manifest)
    }

    /// Parse manifest content.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// The component graph, or a configuration error if it is missing.
    pub fn graph(&self) -> DeployResult<&BTreeMap<String, GraphEntry>> {
        self.graph.as_ref().ok_or_else(|| {
            DeployError::Configuration(format!("Graph not specified in {}", MAIN_FILE))
        })
    }

    /// Check that component names and artifact paths stay inside the
    /// directories they are joined onto.
    ///
    /// A component name must be a single plain path segment; an artifact
    /// path must be relative and must not contain `..`.
    pub fn validate(&self) -> DeployResult<()> {
        let Some(graph) = &self.graph else {
            return Ok(());
        };

        for (component, entry) in graph {
            if !is_component_name(component) {
                return Err(DeployError::Configuration(format!(
                    "Invalid component name '{}' in {}",
                    component, MAIN_FILE
                )));
            }
            for artifact in entry.artifacts.values().flatten() {
                if let ArtifactSpec::Path(path) = artifact {
                    if !is_contained_path(&sanitize_path(path)) {
                        return Err(DeployError::Configuration(format!(
                            "Artifact path '{}' of component '{}' must be relative to the app directory",
                            path, component
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a single component.
    pub fn component(&self, name: &str) -> Option<&GraphEntry> {
        self.graph.as_ref().and_then(|g| g.get(name))
    }

    /// Find a global parameter declaration by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Display name used in logs.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("app")
    }
}

/// Strip the `file://` scheme from an artifact path.
pub fn sanitize_path(path: &str) -> PathBuf {
    PathBuf::from(path.strip_prefix(FILE_SCHEME).unwrap_or(path))
}

fn is_component_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == name
    )
}

fn is_contained_path(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Render a YAML scalar as a string. Sequences and mappings yield `None`.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

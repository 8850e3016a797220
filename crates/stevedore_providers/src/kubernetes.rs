//! Kubernetes provider driving `kubectl`.
//!
//! Every artifact must be a single Kubernetes object (YAML or JSON) with a
//! `kind`. Deployment creates the objects one by one in the configured
//! namespace.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::{debug, info};

use stevedore_core::{Provider, ProviderContext, ProviderError, ProviderResult};

use crate::command::CommandRunner;

pub const NAME: &str = "kubernetes";

const DEFAULT_NAMESPACE: &str = "default";

/// A validated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: PathBuf,
    pub kind: String,
}

#[derive(Debug)]
pub struct KubernetesProvider {
    context: ProviderContext,
    kubectl: CommandRunner,
    namespace: String,
    resources: Vec<Resource>,
}

impl KubernetesProvider {
    pub fn new(context: ProviderContext) -> Self {
        let kubectl = CommandRunner::new(context.config_or("kubectl", "kubectl"), context.dry_run);
        let namespace = context.config_or("namespace", DEFAULT_NAMESPACE);
        Self {
            context,
            kubectl,
            namespace,
            resources: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    async fn load_resource(path: PathBuf) -> ProviderResult<Resource> {
        let content = tokio::fs::read_to_string(&path).await?;
        let value: Value = serde_yaml::from_str(&content).map_err(|e| ProviderError::InvalidArtifact {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::InvalidArtifact {
                path: path.clone(),
                message: "missing 'kind'".to_string(),
            })?
            .to_string();

        Ok(Resource { path, kind })
    }
}

#[async_trait]
impl Provider for KubernetesProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn init(&mut self) -> ProviderResult<()> {
        self.resources.clear();
        for path in self.context.artifact_paths() {
            let resource = Self::load_resource(path).await?;
            debug!("Found {} in {:?}", resource.kind, resource.path);
            self.resources.push(resource);
        }

        self.kubectl
            .run(&["version".to_string(), "--client".to_string()])
            .await?;
        Ok(())
    }

    async fn deploy(&mut self) -> ProviderResult<()> {
        info!(
            "Deploying {} resource(s) of component {} to namespace {}",
            self.resources.len(),
            self.context.component,
            self.namespace
        );

        for resource in &self.resources {
            let args = vec![
                "create".to_string(),
                "-f".to_string(),
                resource.path.to_string_lossy().to_string(),
                format!("--namespace={}", self.namespace),
            ];
            let output = self.kubectl.run(&args).await?;
            if self.context.debug && !output.trim().is_empty() {
                info!("{}", output.trim());
            }
            info!("Created {} from {:?}", resource.kind, resource.path);
        }
        Ok(())
    }
}

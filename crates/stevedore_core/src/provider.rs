//! Provider contract and registry.
//!
//! A provider turns the rendered artifacts of one component into a running
//! deployment on some platform.
//!
//! # Lifecycle
//!
//! 1. **Construction**: the registered constructor is called with a
//!    [`ProviderContext`] once all artifacts of the component are written.
//! 2. **Init**: `init()` prepares and validates; called exactly once.
//! 3. **Deploy**: `deploy()` performs the deployment; called exactly once,
//!    after `init()` succeeded.
//!
//! Neither step is retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use stevedore_core::{Provider, ProviderContext, ProviderRegistry, ProviderResult};
//!
//! struct EchoProvider(ProviderContext);
//!
//! #[async_trait]
//! impl Provider for EchoProvider {
//!     fn name(&self) -> &str { "echo" }
//!     async fn init(&mut self) -> ProviderResult<()> { Ok(()) }
//!     async fn deploy(&mut self) -> ProviderResult<()> {
//!         println!("{:?}", self.0.artifacts);
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register_fn("echo", |ctx| Box::new(EchoProvider(ctx)));
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::answers::Values;
use crate::error::{DeployError, DeployResult, ProviderResult};

/// Everything a provider is constructed with.
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    /// Component the provider deploys.
    pub component: String,
    /// Resolved configuration of the component (global values included).
    pub config: Values,
    /// Directory holding the rendered artifacts; owned by this provider.
    pub destination: PathBuf,
    /// Only report what would be done.
    pub dry_run: bool,
    /// Log extra detail, such as the output of external commands.
    pub debug: bool,
    /// Rendered artifact paths, relative to `destination`.
    pub artifacts: Vec<PathBuf>,
}

impl ProviderContext {
    /// Absolute paths of the rendered artifacts.
    pub fn artifact_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.artifacts.iter().map(|a| self.destination.join(a))
    }

    /// A configuration value with a fallback.
    pub fn config_or(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// A deployment backend for one component.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registered name of the provider.
    fn name(&self) -> &str;

    /// Prepare the deployment.
    async fn init(&mut self) -> ProviderResult<()>;

    /// Deploy the rendered artifacts.
    async fn deploy(&mut self) -> ProviderResult<()>;
}

/// Builds a provider for one component.
pub type ProviderConstructor = Arc<dyn Fn(ProviderContext) -> Box<dyn Provider> + Send + Sync>;

/// A named provider constructor offered by a plugin.
#[derive(Clone)]
pub struct ProviderPlugin {
    pub name: String,
    pub description: String,
    pub constructor: ProviderConstructor,
}

impl ProviderPlugin {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(ProviderContext) -> Box<dyn Provider> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            constructor: Arc::new(constructor),
        }
    }
}

impl std::fmt::Debug for ProviderPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPlugin")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Maps provider names to constructors.
///
/// The registry is populated once at startup and shared with every run.
/// Registering a name twice replaces the earlier constructor.
#[derive(Default)]
pub struct ProviderRegistry {
    plugins: BTreeMap<String, ProviderPlugin>,
    loaded: bool,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set of plugins. Only the first call has an effect.
    pub fn load_plugins<I>(&mut self, plugins: I)
    where
        I: IntoIterator<Item = ProviderPlugin>,
    {
        if self.loaded {
            debug!("Provider plugins already loaded");
            return;
        }
        for plugin in plugins {
            self.register(plugin);
        }
        self.loaded = true;
    }

    /// Whether [`load_plugins`](Self::load_plugins) has run.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Register a plugin under its name, replacing any earlier one.
    pub fn register(&mut self, plugin: ProviderPlugin) {
        debug!("Registering provider: {}", plugin.name);
        if let Some(previous) = self.plugins.insert(plugin.name.clone(), plugin) {
            warn!("Provider '{}' registered twice, the later registration wins", previous.name);
        }
    }

    /// Register a constructor function under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(ProviderContext) -> Box<dyn Provider> + Send + Sync + 'static,
    {
        let name = name.into();
        self.register(ProviderPlugin::new(name.clone(), name, constructor));
    }

    /// Get a provider constructor by name.
    pub fn get(&self, name: &str) -> Option<ProviderConstructor> {
        self.plugins.get(name).map(|p| p.constructor.clone())
    }

    /// Get a provider constructor by name, returning an error if not found.
    pub fn get_required(&self, name: &str) -> DeployResult<ProviderConstructor> {
        self.get(name)
            .ok_or_else(|| DeployError::UnknownProvider(name.to_string()))
    }

    /// Check if a provider is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugins, sorted by name.
    pub fn plugins(&self) -> impl Iterator<Item = &ProviderPlugin> {
        self.plugins.values()
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("loaded", &self.loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider {
        name: &'static str,
    }

    #[async_trait]
    impl Provider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn init(&mut self) -> ProviderResult<()> {
            Ok(())
        }

        async fn deploy(&mut self) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn plugin(name: &'static str, built: &'static str) -> ProviderPlugin {
        ProviderPlugin::new(name, "test", move |_| Box::new(StaticProvider { name: built }))
    }

    #[test]
    fn test_registry_get() {
        let mut registry = ProviderRegistry::new();
        registry.register(plugin("noop", "noop"));

        let constructor = registry.get_required("noop").unwrap();
        assert_eq!(constructor(ProviderContext::default()).name(), "noop");

        let err = registry.get_required("openshift").err().unwrap();
        assert!(matches!(err, DeployError::UnknownProvider(ref n) if n == "openshift"));
    }

    #[test]
    fn test_load_plugins_is_idempotent() {
        let mut registry = ProviderRegistry::new();
        registry.load_plugins(vec![plugin("noop", "noop")]);
        registry.load_plugins(vec![plugin("docker", "docker")]);

        assert!(registry.is_loaded());
        assert_eq!(registry.names(), vec!["noop"]);
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        let mut registry = ProviderRegistry::new();
        registry.register(plugin("noop", "first"));
        registry.register(plugin("noop", "second"));

        assert_eq!(registry.len(), 1);
        let constructor = registry.get("noop").unwrap();
        assert_eq!(constructor(ProviderContext::default()).name(), "second");
    }

    #[test]
    fn test_context_artifact_paths() {
        let ctx = ProviderContext {
            destination: PathBuf::from("/work/web"),
            artifacts: vec![PathBuf::from("a/pod.json")],
            ..Default::default()
        };
        assert_eq!(ctx.artifact_paths().collect::<Vec<_>>(), vec![PathBuf::from("/work/web/a/pod.json")]);
        assert_eq!(ctx.config_or("namespace", "default"), "default");
    }
}

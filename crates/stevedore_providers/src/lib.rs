//! # stevedore_providers
//!
//! Built-in deployment providers for stevedore.
//!
//! - **kubernetes**: creates each rendered object with `kubectl create`
//! - **docker**: starts containers with `docker run`
//! - **noop**: logs the rendered artifacts and does nothing else
//!
//! All of them honor dry-run by logging the commands they would run.

pub mod command;
pub mod docker;
pub mod kubernetes;
pub mod noop;

pub use command::CommandRunner;
pub use docker::DockerProvider;
pub use kubernetes::KubernetesProvider;
pub use noop::NoopProvider;

use stevedore_core::{ProviderPlugin, ProviderRegistry};

/// The built-in provider plugins.
pub fn plugins() -> Vec<ProviderPlugin> {
    vec![
        ProviderPlugin::new(
            kubernetes::NAME,
            "Create objects with kubectl",
            |ctx| Box::new(KubernetesProvider::new(ctx)),
        ),
        ProviderPlugin::new(docker::NAME, "Run containers with docker", |ctx| {
            Box::new(DockerProvider::new(ctx))
        }),
        ProviderPlugin::new(noop::NAME, "Log artifacts without deploying", |ctx| {
            Box::new(NoopProvider::new(ctx))
        }),
    ]
}

/// A registry with every built-in provider loaded.
pub fn registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.load_plugins(plugins());
    registry
}

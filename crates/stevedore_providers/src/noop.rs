//! Provider that only logs what it is given.

use async_trait::async_trait;
use tracing::info;

use stevedore_core::{Provider, ProviderContext, ProviderResult};

pub const NAME: &str = "noop";

/// Logs each lifecycle step and artifact; never fails.
#[derive(Debug)]
pub struct NoopProvider {
    context: ProviderContext,
}

impl NoopProvider {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Provider for NoopProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn init(&mut self) -> ProviderResult<()> {
        info!(
            "noop: init for component {} in {:?}",
            self.context.component, self.context.destination
        );
        if self.context.debug {
            info!("noop: configuration {:?}", self.context.config);
        }
        Ok(())
    }

    async fn deploy(&mut self) -> ProviderResult<()> {
        for artifact in self.context.artifact_paths() {
            info!("noop: would deploy {:?}", artifact);
        }
        Ok(())
    }
}

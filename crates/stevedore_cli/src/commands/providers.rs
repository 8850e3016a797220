//! Providers command - List registered providers.

use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct ProvidersArgs {}

pub async fn execute(_args: ProvidersArgs) -> Result<()> {
    let registry = stevedore_providers::registry();

    println!("Available providers:");
    for plugin in registry.plugins() {
        println!("  {:<12} {}", plugin.name, plugin.description);
    }
    Ok(())
}

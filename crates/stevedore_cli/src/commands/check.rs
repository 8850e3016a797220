//! Check command - Validate an app without deploying it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stevedore_core::{ArtifactResolver, Manifest, WORKDIR};

#[derive(Args)]
pub struct CheckArgs {
    /// App directory
    #[arg(default_value = ".")]
    pub app: PathBuf,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    info!("Checking app in {:?}", args.app);

    let manifest = Manifest::load_from_app(&args.app)
        .with_context(|| format!("Failed to load app from {}", args.app.display()))?;
    let graph = manifest.graph()?;

    let workdir = args.app.join(WORKDIR);
    ArtifactResolver::new(&manifest, &workdir).check_all(&args.app)?;

    println!("App {} is valid", manifest.display_id());
    for (component, entry) in graph {
        match entry.source_image() {
            Some(image) if entry.is_external() => println!("  {} (external: {})", component, image),
            _ => {
                let providers: Vec<&str> = entry.artifacts.keys().map(String::as_str).collect();
                println!("  {} [{}]", component, providers.join(", "));
            }
        }
    }
    Ok(())
}

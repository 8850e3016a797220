//! Run command - Deploy an app.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stevedore_core::{
    DefaultInstaller, NonInteractive, Prompter, Run, RunEnvironment, RunOptions, StdinPrompter,
};

#[derive(Args)]
pub struct RunArgs {
    /// App directory, or where to install the app when `--image` is given
    #[arg(default_value = ".")]
    pub app: String,

    /// Answers file to read values from
    #[arg(short, long)]
    pub answers: Option<PathBuf>,

    /// Write the final answers to this file
    #[arg(long)]
    pub answers_output: Option<PathBuf>,

    /// Only report what would be deployed
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Fail instead of asking for missing values
    #[arg(long)]
    pub no_ask: bool,

    /// Directory for rendered artifacts (defaults to <APP>/.workdir)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Provider to use when the Appfile does not name one per component
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Image to install the app from
    #[arg(long, env = "IMAGE")]
    pub image: Option<String>,
}

impl RunArgs {
    fn options(&self) -> RunOptions {
        let mut options = RunOptions::new()
            .dry_run(self.dry_run)
            .debug(self.debug)
            .ask(!self.no_ask);

        if let Some(path) = &self.answers {
            options = options.with_answers_file(path);
        }
        if let Some(path) = &self.answers_output {
            options = options.with_answers_output(path);
        }
        if let Some(path) = &self.workdir {
            options = options.with_workdir(path);
        }
        if let Some(provider) = &self.provider {
            options = options.with_provider(provider);
        }
        if let Some(image) = &self.image {
            options = options.with_image(image);
        }
        options
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let prompter: Arc<dyn Prompter> = if args.no_ask {
        Arc::new(NonInteractive)
    } else {
        Arc::new(StdinPrompter)
    };
    let env = RunEnvironment::new(
        Arc::new(stevedore_providers::registry()),
        Arc::new(DefaultInstaller::default()),
        prompter,
    );

    if args.dry_run {
        info!("[DRY-RUN] No changes will be made");
    }

    let mut run = Run::new(&args.app, args.options(), env)
        .with_context(|| format!("Failed to prepare app {}", args.app))?;
    let app_id = run.manifest().display_id().to_string();
    run.execute()
        .await
        .with_context(|| format!("Failed to deploy app {}", app_id))?;

    println!("Deployed {}", app_id);
    if let Some(path) = &args.answers_output {
        println!("Answers written to {}", path.display());
    }
    Ok(())
}

//! CLI command definitions.
//!
//! Each subcommand maps to one operation on an app.

use clap::{Parser, Subcommand};

pub mod check;
pub mod providers;
pub mod run;

/// stevedore - deploy multi-component apps through pluggable providers
#[derive(Parser)]
#[command(name = "stevedore")]
#[command(version, about = "stevedore - deploy multi-component apps through pluggable providers")]
#[command(long_about = r#"
stevedore deploys an app described by an Appfile: a graph of components,
each with artifact templates per provider. Missing values are asked for,
artifacts are rendered into a working directory and handed to the selected
provider. Components may themselves be apps shipped as container images.

COMMANDS:
  run        → Render and deploy every component of an app
  check      → Verify the Appfile and its artifacts
  providers  → List the available providers

EXIT CODES:
  0 - Success
  1 - Provider failure
  2 - Configuration or manifest error
  3 - Missing value or template error
  4 - Install error
  5 - Other error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether the subcommand asked for debug output.
    pub fn debug_requested(&self) -> bool {
        matches!(&self.command, Commands::Run(args) if args.debug)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy an app from a directory or image
    Run(run::RunArgs),

    /// Validate an app without deploying it
    Check(check::CheckArgs),

    /// List registered providers
    Providers(providers::ProvidersArgs),
}

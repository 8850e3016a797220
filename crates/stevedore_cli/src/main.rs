//! stevedore CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Provider failure
//! - 2: Configuration or manifest error
//! - 3: Missing value or template error
//! - 4: Install error
//! - 5: Other error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stevedore_core::DeployError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const PROVIDER_FAILURE: u8 = 1;
    pub const CONFIGURATION_ERROR: u8 = 2;
    pub const VALUE_ERROR: u8 = 3;
    pub const INSTALL_ERROR: u8 = 4;
    pub const GENERAL_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "warn"
    } else if cli.verbose || cli.debug_requested() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,stevedore_cli={level},stevedore_core={level},stevedore_providers={level}"
        ))
    });

    // Logging may already be initialized
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Check(args) => commands::check::execute(args).await,
        Commands::Providers(args) => commands::providers::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map the first deployment error in the chain to an exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<DeployError>())
        .map(exit_code_for)
        .unwrap_or(ExitCodes::GENERAL_ERROR)
}

fn exit_code_for(error: &DeployError) -> u8 {
    match error {
        DeployError::ProviderFailed { .. } => ExitCodes::PROVIDER_FAILURE,
        DeployError::Configuration(_)
        | DeployError::ManifestNotFound(_)
        | DeployError::InvalidManifest { .. }
        | DeployError::InvalidAnswers { .. }
        | DeployError::UnknownProviderData { .. }
        | DeployError::InheritanceCycle { .. }
        | DeployError::MissingArtifact { .. }
        | DeployError::UnknownProvider(_)
        | DeployError::NestedAppCycle { .. }
        | DeployError::NestingTooDeep(_)
        | DeployError::Yaml(_)
        | DeployError::Json(_) => ExitCodes::CONFIGURATION_ERROR,
        DeployError::MissingValue { .. }
        | DeployError::UnresolvableArtifact { .. }
        | DeployError::InvalidPlaceholder { .. }
        | DeployError::Prompt(_) => ExitCodes::VALUE_ERROR,
        DeployError::InstallFailed { .. } => ExitCodes::INSTALL_ERROR,
        DeployError::Io(_) => ExitCodes::GENERAL_ERROR,
    }
}

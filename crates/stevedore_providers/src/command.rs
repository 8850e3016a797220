//! External command execution shared by CLI-backed providers.

use tokio::process::Command;
use tracing::{debug, info};

use stevedore_core::{ProviderError, ProviderResult};

/// Runs one program, or only logs what it would run in dry-run mode.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    dry_run: bool,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, dry_run: bool) -> Self {
        Self {
            program: program.into(),
            dry_run,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Format a command line for logging.
    pub fn format_command(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }

    /// Run the program and return its stdout. A non-zero exit is an error.
    pub async fn run(&self, args: &[String]) -> ProviderResult<String> {
        let command = self.format_command(args);

        if self.dry_run {
            info!("[DRY-RUN] Would run: {}", command);
            return Ok(String::new());
        }

        debug!("Executing: {}", command);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| ProviderError::Failed(format!("failed to run {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(ProviderError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

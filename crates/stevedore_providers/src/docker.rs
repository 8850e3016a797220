//! Docker provider running plain containers.
//!
//! Each non-empty, non-comment line of an artifact describes one container
//! as the arguments of `docker run`. A leading `docker run` is accepted and
//! stripped. Arguments are split on whitespace; quoting is not supported.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use stevedore_core::{Provider, ProviderContext, ProviderError, ProviderResult};

use crate::command::CommandRunner;

pub const NAME: &str = "docker";

/// One `docker run` invocation taken from an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    pub source: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct DockerProvider {
    context: ProviderContext,
    docker: CommandRunner,
    commands: Vec<RunCommand>,
}

impl DockerProvider {
    pub fn new(context: ProviderContext) -> Self {
        let docker = CommandRunner::new(context.config_or("docker", "docker"), context.dry_run);
        Self {
            context,
            docker,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[RunCommand] {
        &self.commands
    }

    /// Parse the run lines of one artifact.
    pub fn parse_artifact(path: &Path, content: &str) -> ProviderResult<Vec<RunCommand>> {
        let mut commands = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut args: Vec<String> = line.split_whitespace().map(String::from).collect();
            if args.len() >= 2 && args[0] == "docker" && args[1] == "run" {
                args.drain(..2);
            }
            if args.is_empty() {
                return Err(ProviderError::InvalidArtifact {
                    path: path.to_path_buf(),
                    message: format!("no arguments in '{}'", line),
                });
            }

            commands.push(RunCommand {
                source: path.to_path_buf(),
                args,
            });
        }
        Ok(commands)
    }
}

#[async_trait]
impl Provider for DockerProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn init(&mut self) -> ProviderResult<()> {
        self.commands.clear();
        for path in self.context.artifact_paths() {
            let content = tokio::fs::read_to_string(&path).await?;
            let parsed = Self::parse_artifact(&path, &content)?;
            debug!("{} container(s) in {:?}", parsed.len(), path);
            self.commands.extend(parsed);
        }
        Ok(())
    }

    async fn deploy(&mut self) -> ProviderResult<()> {
        info!(
            "Starting {} container(s) for component {}",
            self.commands.len(),
            self.context.component
        );
        for command in &self.commands {
            let mut args = vec!["run".to_string()];
            args.extend(command.args.iter().cloned());
            let container = self.docker.run(&args).await?;
            if self.context.debug && !container.trim().is_empty() {
                info!("Started container {}", container.trim());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_artifact() {
        let content = "# web tier\n\ndocker run -d --name web nginx\n-d redis\n";
        let commands = DockerProvider::parse_artifact(Path::new("run.txt"), content).unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].args, vec!["-d", "--name", "web", "nginx"]);
        assert_eq!(commands[1].args, vec!["-d", "redis"]);
    }

    #[test]
    fn test_parse_rejects_bare_docker_run() {
        let err = DockerProvider::parse_artifact(Path::new("run.txt"), "docker run\n").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArtifact { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_lifecycle() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("run.txt"), "-d -p 80:80 nginx\n").unwrap();

        let mut provider = DockerProvider::new(ProviderContext {
            component: "web".into(),
            destination: dir.path().to_path_buf(),
            dry_run: true,
            artifacts: vec![PathBuf::from("run.txt")],
            ..Default::default()
        });

        provider.init().await.unwrap();
        assert_eq!(provider.commands().len(), 1);
        provider.deploy().await.unwrap();
    }
}

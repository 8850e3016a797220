//! Fetching app content into a local directory.

use std::fs;
use std::path::Path;
use std::process::Command;

use fs_extra::dir::CopyOptions;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};

/// Directory inside an app image that holds the app content.
pub const APP_ENTITY_DIR: &str = "/application-entity";

/// Places the content of an app into a target directory.
#[cfg_attr(test, mockall::automock)]
pub trait Installer: Send + Sync {
    /// Fetch `reference` into `target`. After a successful install the
    /// target holds the app's manifest.
    fn install(&self, reference: &str, target: &Path, dry_run: bool) -> DeployResult<()>;
}

/// Copies an app from a local directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalInstaller;

impl Installer for LocalInstaller {
    fn install(&self, reference: &str, target: &Path, _dry_run: bool) -> DeployResult<()> {
        let source = Path::new(reference.strip_prefix("file://").unwrap_or(reference));
        if !source.is_dir() {
            return Err(install_failed(reference, "not a directory"));
        }
        if same_dir(source, target) {
            debug!("App {:?} already in place", source);
            return Ok(());
        }

        info!("Copying app from {:?} to {:?}", source, target);
        fs::create_dir_all(target)?;
        let options = CopyOptions::new().content_only(true).overwrite(true);
        fs_extra::dir::copy(source, target, &options)
            .map_err(|e| install_failed(reference, e.to_string()))?;
        Ok(())
    }
}

/// Extracts an app from a container image through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct ImageInstaller {
    command: String,
}

impl Default for ImageInstaller {
    fn default() -> Self {
        Self {
            command: "docker".to_string(),
        }
    }
}

impl ImageInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another docker-compatible CLI (e.g. `podman`).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn run(&self, reference: &str, args: &[&str]) -> DeployResult<String> {
        debug!("Executing: {} {}", self.command, args.join(" "));
        let output = Command::new(&self.command)
            .args(args)
            .output()
            .map_err(|e| install_failed(reference, format!("failed to run {}: {}", self.command, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(install_failed(
                reference,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

impl Installer for ImageInstaller {
    fn install(&self, reference: &str, target: &Path, dry_run: bool) -> DeployResult<()> {
        let image = reference.strip_prefix("docker://").unwrap_or(reference);
        let source = format!("{}/.", APP_ENTITY_DIR);
        let target_str = target.to_string_lossy();

        if dry_run {
            info!("[DRY-RUN] Would pull {} and copy {} to {}", image, APP_ENTITY_DIR, target_str);
            return Ok(());
        }

        info!("Installing {} into {:?}", image, target);
        fs::create_dir_all(target)?;
        self.run(reference, &["pull", image])?;
        let container = self.run(reference, &["create", image, "/bin/true"])?;

        let copied = self.run(reference, &["cp", &format!("{}:{}", container, source), &target_str]);
        let removed = self.run(reference, &["rm", &container]);
        copied?;
        removed?;
        Ok(())
    }
}

/// Local directories are copied, anything else is treated as an image.
#[derive(Debug, Default, Clone)]
pub struct DefaultInstaller {
    local: LocalInstaller,
    image: ImageInstaller,
}

impl Installer for DefaultInstaller {
    fn install(&self, reference: &str, target: &Path, dry_run: bool) -> DeployResult<()> {
        let local = Path::new(reference.strip_prefix("file://").unwrap_or(reference));
        if local.is_dir() {
            self.local.install(reference, target, dry_run)
        } else {
            self.image.install(reference, target, dry_run)
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn install_failed(reference: &str, message: impl Into<String>) -> DeployError {
    DeployError::InstallFailed {
        reference: reference.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_install_copies_content() {
        let source = tempdir().unwrap();
        fs::create_dir_all(source.path().join("artifacts")).unwrap();
        fs::write(source.path().join("Appfile"), "graph: {}\n").unwrap();
        fs::write(source.path().join("artifacts/pod.json"), "{}").unwrap();

        let target = tempdir().unwrap();
        let target_app = target.path().join("app");
        LocalInstaller
            .install(&source.path().to_string_lossy(), &target_app, false)
            .unwrap();

        assert!(target_app.join("Appfile").is_file());
        assert!(target_app.join("artifacts/pod.json").is_file());
    }

    #[test]
    fn test_local_install_missing_source() {
        let target = tempdir().unwrap();
        let err = LocalInstaller
            .install("/nonexistent/app", target.path(), false)
            .unwrap_err();
        assert!(matches!(err, DeployError::InstallFailed { .. }));
    }

    #[test]
    fn test_image_install_dry_run_runs_nothing() {
        let target = tempdir().unwrap();
        ImageInstaller::new()
            .with_command("/nonexistent/docker")
            .install("docker://example/app:1", &target.path().join("app"), true)
            .unwrap();
        assert!(!target.path().join("app").exists());
    }
}

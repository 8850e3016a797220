//! Error types for the deployment core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Result type alias for provider lifecycle steps.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while preparing or dispatching a deployment.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Invalid answers file {path}: {message}")]
    InvalidAnswers { path: PathBuf, message: String },

    #[error("Data for provider \"{provider}\" are not part of component '{component}'")]
    UnknownProviderData { component: String, provider: String },

    #[error("Artifact inheritance cycle in component '{component}': {}", chain.join(" -> "))]
    InheritanceCycle { component: String, chain: Vec<String> },

    #[error("Artifact {path} referenced by component '{component}' does not exist")]
    MissingArtifact { component: String, path: PathBuf },

    #[error("No value for parameter '{key}' of component '{component}' and prompting is disabled")]
    MissingValue { component: String, key: String },

    #[error("Artifact of component '{component}' contains unresolvable parameter '{key}'")]
    UnresolvableArtifact { component: String, key: String },

    #[error("Invalid placeholder in template at line {line}, column {column}")]
    InvalidPlaceholder { line: usize, column: usize },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider '{provider}' failed for component '{component}': {source}")]
    ProviderFailed {
        provider: String,
        component: String,
        #[source]
        source: ProviderError,
    },

    #[error("Nested app cycle detected: {}", chain.join(" -> "))]
    NestedAppCycle { chain: Vec<String> },

    #[error("Nested apps exceed the maximum depth of {0}")]
    NestingTooDeep(usize),

    #[error("Install of {reference} failed: {message}")]
    InstallFailed { reference: String, message: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a provider's `init` or `deploy` step.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error("Command `{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Invalid artifact {path}: {message}")]
    InvalidArtifact { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

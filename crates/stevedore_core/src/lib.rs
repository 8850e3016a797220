//! # stevedore_core
//!
//! Deployment graph dispatcher and artifact resolution for stevedore.
//!
//! An app is described by an `Appfile` manifest: a graph of components, each
//! with per-provider artifact templates. A [`Run`] resolves configuration
//! values (asking for missing ones), renders the artifacts of every
//! component and hands them to the selected [`Provider`]. Components that
//! are apps of their own are deployed through nested runs.
//!
//! # Architecture
//!
//! - **ConfigStore**: manifest defaults + answers, prompting for missing values
//! - **ArtifactResolver**: flattens per-provider artifact lists, following `inherit`
//! - **TemplateEngine**: `$name` / `${name}` substitution with a resolve-and-retry loop
//! - **ProviderRegistry**: maps provider names to constructors
//! - **Run**: walks the graph and drives providers through `init` and `deploy`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stevedore_core::{DefaultInstaller, ProviderRegistry, Run, RunEnvironment, RunOptions, StdinPrompter};
//!
//! let env = RunEnvironment::new(
//!     Arc::new(registry),
//!     Arc::new(DefaultInstaller::default()),
//!     Arc::new(StdinPrompter),
//! );
//! let options = RunOptions::new().with_answers_output("answers.out.yaml");
//! let mut run = Run::new("./helloapp", options, env)?;
//! let answers = run.execute().await?;
//! ```

pub mod answers;
pub mod artifacts;
pub mod dispatcher;
pub mod error;
pub mod install;
pub mod manifest;
pub mod prompt;
pub mod provider;
pub mod template;

pub use answers::{Answers, ConfigStore, Values, ANSWERS_FILE, GLOBAL_SCOPE};
pub use artifacts::{ArtifactResolver, ResolvedArtifacts};
pub use dispatcher::{
    Run, RunEnvironment, RunFuture, RunOptions, DEFAULT_PROVIDER, EXTERNAL_APP_DIR,
    MAX_NESTING_DEPTH, WORKDIR,
};
pub use error::{DeployError, DeployResult, ProviderError, ProviderResult};
pub use install::{DefaultInstaller, ImageInstaller, Installer, LocalInstaller, APP_ENTITY_DIR};
pub use manifest::{sanitize_path, ArtifactSpec, GraphEntry, Manifest, ParamSpec, MAIN_FILE};
pub use prompt::{NonInteractive, Prompter, Question, StdinPrompter};
pub use provider::{Provider, ProviderConstructor, ProviderContext, ProviderPlugin, ProviderRegistry};
pub use template::{Substitution, TemplateEngine, ValueResolver};

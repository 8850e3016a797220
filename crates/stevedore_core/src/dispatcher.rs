//! Deployment graph dispatch.
//!
//! A [`Run`] deploys one app: it loads the manifest and answers, then walks
//! the component graph. Local components have their artifacts rendered into
//! the working directory and handed to a provider; external components are
//! deployed by a nested run of their own app.
//!
//! Components are processed one at a time and the first failure ends the
//! run. Values resolved while processing one component are visible to the
//! components processed after it.

use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::answers::{Answers, ConfigStore, ANSWERS_FILE, GLOBAL_SCOPE};
use crate::artifacts::ArtifactResolver;
use crate::error::{DeployError, DeployResult};
use crate::install::Installer;
use crate::manifest::{GraphEntry, Manifest};
use crate::prompt::Prompter;
use crate::provider::{ProviderContext, ProviderRegistry};
use crate::template::TemplateEngine;

/// Provider used when neither the component, the answers nor the manifest
/// select one.
pub const DEFAULT_PROVIDER: &str = "kubernetes";

/// Directory, relative to the app, where external apps are installed.
pub const EXTERNAL_APP_DIR: &str = "external";

/// Default working directory, relative to the app.
pub const WORKDIR: &str = ".workdir";

/// Maximum nesting of external apps.
pub const MAX_NESTING_DEPTH: usize = 16;

/// Future returned by [`Run::execute`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = DeployResult<Answers>> + Send + 'a>>;

/// Options of a run. Nested runs inherit them.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Render artifacts but let providers only report what they would do.
    pub dry_run: bool,
    /// Log the resolved configuration of every component and hand the flag
    /// to providers.
    pub debug: bool,
    /// Ask for missing values instead of failing.
    pub ask: bool,
    /// Answers file to load. Defaults to `answers.yaml` in the app directory.
    pub answers_file: Option<PathBuf>,
    /// Where to write the answers at the end of the run.
    pub answers_output: Option<PathBuf>,
    /// Working directory for rendered artifacts. Defaults to `<app>/.workdir`.
    pub workdir: Option<PathBuf>,
    /// Image to install into the app directory before running.
    pub image: Option<String>,
    /// Provider to use for every component without its own override.
    pub provider: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            debug: false,
            ask: true,
            answers_file: None,
            answers_output: None,
            workdir: None,
            image: None,
            provider: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn ask(mut self, enabled: bool) -> Self {
        self.ask = enabled;
        self
    }

    pub fn with_answers_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.answers_file = Some(path.into());
        self
    }

    pub fn with_answers_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.answers_output = Some(path.into());
        self
    }

    pub fn with_workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Options of a nested run installing `image` and rendering into `workdir`.
    fn nested(&self, image: &str, workdir: &Path) -> Self {
        Self {
            workdir: Some(workdir.to_path_buf()),
            image: Some(image.to_string()),
            ..self.clone()
        }
    }
}

/// Collaborators shared by a run and all of its nested runs.
#[derive(Clone)]
pub struct RunEnvironment {
    pub registry: Arc<ProviderRegistry>,
    pub installer: Arc<dyn Installer>,
    pub prompter: Arc<dyn Prompter>,
}

impl RunEnvironment {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        installer: Arc<dyn Installer>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            registry,
            installer,
            prompter,
        }
    }
}

impl std::fmt::Debug for RunEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEnvironment")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Deployment of one app.
pub struct Run {
    id: Uuid,
    app_path: PathBuf,
    workdir: PathBuf,
    manifest: Manifest,
    store: ConfigStore,
    options: RunOptions,
    env: RunEnvironment,
    engine: TemplateEngine,
    ancestry: Vec<String>,
}

impl Run {
    /// Prepare a run of `app`.
    ///
    /// With [`RunOptions::image`] set, the image is installed into the `app`
    /// directory first. Otherwise `app` is used when it is an existing
    /// directory, and installed into the current directory when it is not.
    pub fn new(app: &str, options: RunOptions, env: RunEnvironment) -> DeployResult<Self> {
        let identity = options.image.clone().unwrap_or_else(|| app.to_string());
        Self::prepare(Path::new(app), app, options, env, vec![identity])
    }

    fn prepare(
        app_dir: &Path,
        reference: &str,
        options: RunOptions,
        env: RunEnvironment,
        ancestry: Vec<String>,
    ) -> DeployResult<Self> {
        let app_path = if let Some(image) = &options.image {
            env.installer.install(image, app_dir, options.dry_run)?;
            app_dir.to_path_buf()
        } else if app_dir.is_dir() {
            app_dir.to_path_buf()
        } else {
            let target = std::env::current_dir()?;
            env.installer.install(reference, &target, options.dry_run)?;
            target
        };

        let manifest = Manifest::load_from_app(&app_path)?;
        let workdir = options
            .workdir
            .clone()
            .unwrap_or_else(|| app_path.join(WORKDIR));

        let mut store = ConfigStore::new(env.prompter.clone());
        store.set_ask(options.ask);

        Ok(Self {
            id: Uuid::new_v4(),
            app_path,
            workdir,
            manifest,
            store,
            options,
            env,
            engine: TemplateEngine::new(),
            ancestry,
        })
    }

    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Nesting depth; the root run has depth 0.
    pub fn depth(&self) -> usize {
        self.ancestry.len().saturating_sub(1)
    }

    /// Execute the run and return the resulting answers.
    pub fn execute(&mut self) -> RunFuture<'_> {
        let span = info_span!("run", id = %self.id, app = %self.manifest.display_id());
        Box::pin(self.execute_inner().instrument(span))
    }

    async fn execute_inner(&mut self) -> DeployResult<Answers> {
        info!("Deploying app from {:?}", self.app_path);

        self.store.seed_defaults(&self.manifest);
        if let Some(provider) = &self.options.provider {
            self.store.set(GLOBAL_SCOPE, "provider", provider.clone());
        }
        self.load_answers()?;

        ArtifactResolver::new(&self.manifest, &self.workdir).check_all(&self.app_path)?;
        self.dispatch_graph().await?;

        let answers = self.store.snapshot();
        if let Some(output) = &self.options.answers_output {
            answers.write(output)?;
        }
        Ok(answers)
    }

    fn load_answers(&mut self) -> DeployResult<()> {
        let path = match &self.options.answers_file {
            Some(path) => path.clone(),
            None => {
                let default = self.app_path.join(ANSWERS_FILE);
                if !default.is_file() {
                    debug!("No answers file at {:?}", default);
                    return Ok(());
                }
                default
            }
        };
        let added = self.store.load_file(&path)?;
        info!("Loaded {} answer(s) from {:?}", added, path);
        Ok(())
    }

    async fn dispatch_graph(&mut self) -> DeployResult<()> {
        let graph = self.manifest.graph()?.clone();

        for (component, entry) in &graph {
            if entry.is_external() {
                self.dispatch_external(component, entry).await?;
            } else {
                self.process_component(component, entry).await?;
            }
        }
        Ok(())
    }

    async fn dispatch_external(&mut self, component: &str, entry: &GraphEntry) -> DeployResult<()> {
        let image = entry.source_image().ok_or_else(|| {
            DeployError::Configuration(format!("Component '{}' has no source image", component))
        })?;
        info!("Component {} is external app {}", component, image);

        let answers = self.run_nested_app(component, image).await?;
        if self.options.answers_output.is_some() {
            let added = self.store.merge(&answers);
            debug!("Merged {} answer(s) from external app {}", added, image);
        }
        Ok(())
    }

    /// Deploy the external app `image` as component `component` and return
    /// its answers.
    pub async fn run_nested_app(&mut self, component: &str, image: &str) -> DeployResult<Answers> {
        if self.ancestry.iter().any(|a| a == image) {
            let mut chain = self.ancestry.clone();
            chain.push(image.to_string());
            return Err(DeployError::NestedAppCycle { chain });
        }
        if self.depth() >= MAX_NESTING_DEPTH {
            return Err(DeployError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        let app_dir = self.app_path.join(EXTERNAL_APP_DIR).join(component);
        let options = self.options.nested(image, &self.workdir.join(component));
        let mut ancestry = self.ancestry.clone();
        ancestry.push(image.to_string());

        let mut nested = Run::prepare(&app_dir, image, options, self.env.clone(), ancestry)?;
        nested.execute().await
    }

    /// Provider for a component: its own override, then the answers, then
    /// the manifest, then [`DEFAULT_PROVIDER`].
    fn select_provider(&self, entry: &GraphEntry) -> String {
        entry
            .provider
            .as_deref()
            .or_else(|| self.store.answers().get(GLOBAL_SCOPE, "provider"))
            .or(self.manifest.provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string()
    }

    async fn process_component(&mut self, component: &str, entry: &GraphEntry) -> DeployResult<()> {
        debug!("Processing component {}", component);

        let provider_name = self.select_provider(entry);
        let resolved = ArtifactResolver::new(&self.manifest, &self.workdir)
            .resolve(component, &provider_name)?;
        let constructor = self.env.registry.get_required(&provider_name)?;
        info!("Using provider {} for component {}", provider_name, component);

        let mut rendered = Vec::with_capacity(resolved.paths.len());
        for artifact in &resolved.paths {
            let source = self.app_path.join(artifact);
            debug!("Templating artifact {:?}", source);
            let raw = fs::read_to_string(&source)?;
            let output = self.engine.render(&raw, component, &mut self.store)?;
            rendered.push((artifact.clone(), output));
        }

        reset_dir(&resolved.destination)?;
        for (artifact, output) in &rendered {
            write_artifact(&resolved.destination, artifact, output)?;
        }

        let config = self.store.values(component);
        if self.options.debug {
            info!("Configuration of component {}: {:?}", component, config);
        }

        let context = ProviderContext {
            component: component.to_string(),
            config,
            destination: resolved.destination,
            dry_run: self.options.dry_run,
            debug: self.options.debug,
            artifacts: resolved.paths,
        };
        let mut provider = constructor(context);

        let outcome = match provider.init().await {
            Ok(()) => provider.deploy().await,
            Err(e) => Err(e),
        };
        outcome.map_err(|source| {
            error!("Provider {} failed for component {}: {}", provider_name, component, source);
            DeployError::ProviderFailed {
                provider: provider_name.clone(),
                component: component.to_string(),
                source,
            }
        })?;

        info!("Component {} deployed", component);
        Ok(())
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("id", &self.id)
            .field("app_path", &self.app_path)
            .field("workdir", &self.workdir)
            .field("ancestry", &self.ancestry)
            .finish_non_exhaustive()
    }
}

/// Remove and recreate a component's destination directory.
fn reset_dir(dir: &Path) -> DeployResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Write through a temporary file in the target directory and rename it into
/// place, so a reader never sees a partial artifact.
fn write_artifact(destination: &Path, artifact: &Path, content: &str) -> DeployResult<PathBuf> {
    let target = destination.join(artifact);
    let parent = target.parent().unwrap_or(destination);
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(&target).map_err(|e| e.error)?;

    debug!("Wrote artifact {:?}", target);
    Ok(target)
}

//! Answers and configuration value resolution.
//!
//! Values come from two layers: defaults declared in the manifest and answers
//! supplied by the user (answers file, command line, interactive prompts).
//! Answers always take precedence over defaults, and within each layer the
//! component scope takes precedence over the global scope.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::manifest::{scalar_to_string, Manifest, MAIN_FILE};
use crate::prompt::{Prompter, Question};
use crate::template::ValueResolver;

/// Name of the scope holding values shared by all components.
pub const GLOBAL_SCOPE: &str = "general";

/// Default answers file name looked up in the app directory.
pub const ANSWERS_FILE: &str = "answers.yaml";

/// Key → value mapping of one scope.
pub type Values = BTreeMap<String, String>;

/// Configuration values keyed by scope (component name or [`GLOBAL_SCOPE`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<String, Values>);

impl Answers {
    /// Create a new empty set of answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mainly for fixtures.
    pub fn with(mut self, scope: &str, key: &str, value: impl Into<String>) -> Self {
        self.insert_if_absent(scope, key, value.into());
        self
    }

    /// Value of `key` in `scope`.
    pub fn get(&self, scope: &str, key: &str) -> Option<&str> {
        self.0.get(scope)?.get(key).map(String::as_str)
    }

    /// All values of one scope.
    pub fn scope(&self, scope: &str) -> Option<&Values> {
        self.0.get(scope)
    }

    /// All scopes with their values, sorted by scope name.
    pub fn scopes(&self) -> impl Iterator<Item = (&String, &Values)> {
        self.0.iter()
    }

    /// Whether no scope holds a value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Set a value unless one already exists. Returns whether it was set.
    pub fn insert_if_absent(&mut self, scope: &str, key: &str, value: String) -> bool {
        let values = self.0.entry(scope.to_string()).or_default();
        if values.contains_key(key) {
            return false;
        }
        values.insert(key.to_string(), value);
        true
    }

    /// Fill-only merge: existing values are never overwritten.
    /// Returns the number of values added.
    pub fn merge(&mut self, other: &Answers) -> usize {
        let mut added = 0;
        for (scope, values) in &other.0 {
            for (key, value) in values {
                if self.insert_if_absent(scope, key, value.clone()) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Parse answers from YAML or JSON content.
    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let raw: BTreeMap<String, Option<BTreeMap<String, Value>>> =
            serde_yaml::from_str(content).map_err(|e| e.to_string())?;

        let mut answers = Self::new();
        for (scope, values) in raw {
            let scope_values = answers.0.entry(scope.clone()).or_default();
            for (key, value) in values.unwrap_or_default() {
                let value = scalar_to_string(&value).ok_or_else(|| {
                    format!("value of '{}' in scope '{}' is not a scalar", key, scope)
                })?;
                scope_values.insert(key, value);
            }
        }
        Ok(answers)
    }

    /// Load an answers file.
    pub fn load(path: &Path) -> DeployResult<Self> {
        debug!("Loading answers from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|message| DeployError::InvalidAnswers {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Write answers to a file. A `.json` extension selects JSON, anything
    /// else YAML.
    pub fn write(&self, path: &Path) -> DeployResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let content = if is_json {
            serde_json::to_string_pretty(self)?
        } else {
            format!(
                "# Answers written by stevedore at {}\n{}",
                Utc::now().to_rfc3339(),
                serde_yaml::to_string(self)?
            )
        };

        fs::write(path, content)?;
        info!("Answers written to {:?}", path);
        Ok(())
    }
}

/// Merged view of manifest defaults and answers, able to ask for missing
/// values.
pub struct ConfigStore {
    answers: Answers,
    defaults: Answers,
    descriptions: BTreeMap<(String, String), String>,
    ask: bool,
    prompter: Arc<dyn Prompter>,
}

impl ConfigStore {
    /// Create an empty store that asks `prompter` for missing values.
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            answers: Answers::new(),
            defaults: Answers::new(),
            descriptions: BTreeMap::new(),
            ask: true,
            prompter,
        }
    }

    /// Enable or disable interactive prompting.
    pub fn set_ask(&mut self, ask: bool) {
        self.ask = ask;
    }

    pub fn ask(&self) -> bool {
        self.ask
    }

    /// Record the defaults and descriptions declared by the manifest.
    pub fn seed_defaults(&mut self, manifest: &Manifest) {
        for param in &manifest.params {
            self.seed_param(GLOBAL_SCOPE, param);
        }
        if let Some(graph) = &manifest.graph {
            for (component, entry) in graph {
                for param in &entry.params {
                    self.seed_param(component, param);
                }
            }
        }
    }

    fn seed_param(&mut self, scope: &str, param: &crate::manifest::ParamSpec) {
        if let Some(default) = param.default_value() {
            self.defaults.insert_if_absent(scope, &param.name, default);
        }
        if let Some(description) = &param.description {
            self.descriptions
                .entry((scope.to_string(), param.name.clone()))
                .or_insert_with(|| description.clone());
        }
    }

    /// Load an answers file into the store (fill-only).
    pub fn load_file(&mut self, path: &Path) -> DeployResult<usize> {
        let answers = Answers::load(path)?;
        Ok(self.merge(&answers))
    }

    /// Fill-only merge of partial answers.
    pub fn merge(&mut self, partial: &Answers) -> usize {
        let added = self.answers.merge(partial);
        debug!("Merged {} answer(s)", added);
        added
    }

    /// Set a single answer unless one already exists.
    pub fn set(&mut self, scope: &str, key: &str, value: impl Into<String>) -> bool {
        self.answers.insert_if_absent(scope, key, value.into())
    }

    /// Global values.
    pub fn get(&self) -> Values {
        let mut values = self.defaults.scope(GLOBAL_SCOPE).cloned().unwrap_or_default();
        if let Some(answers) = self.answers.scope(GLOBAL_SCOPE) {
            values.extend(answers.clone());
        }
        values
    }

    /// Global values merged with the values of `component`.
    pub fn values(&self, component: &str) -> Values {
        let mut values = Values::new();
        for layer in [&self.defaults, &self.answers] {
            for scope in [GLOBAL_SCOPE, component] {
                if let Some(scoped) = layer.scope(scope) {
                    values.extend(scoped.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        values
    }

    /// Look up a known value without prompting.
    pub fn lookup(&self, component: &str, key: &str) -> Option<&str> {
        self.answers
            .get(component, key)
            .or_else(|| self.answers.get(GLOBAL_SCOPE, key))
            .or_else(|| self.defaults.get(component, key))
            .or_else(|| self.defaults.get(GLOBAL_SCOPE, key))
    }

    /// Resolve a value, prompting when it is unknown.
    ///
    /// A non-empty prompted value is stored so later lookups do not ask
    /// again. An empty answer is returned as-is for the caller to reject.
    pub fn resolve(&mut self, component: &str, key: &str) -> DeployResult<String> {
        if let Some(value) = self.lookup(component, key) {
            return Ok(value.to_string());
        }

        if !self.ask {
            return Err(DeployError::MissingValue {
                component: component.to_string(),
                key: key.to_string(),
            });
        }

        let question = Question {
            component: component.to_string(),
            key: key.to_string(),
            description: self.describe(component, key),
        };
        debug!("Asking for '{}' of component '{}'", key, component);
        let value = self.prompter.ask(&question)?;

        if !value.is_empty() {
            self.answers.insert_if_absent(component, key, value.clone());
        }
        Ok(value)
    }

    fn describe(&self, component: &str, key: &str) -> String {
        let missing = format!(
            "Missing parameter '{}', provide the value or fix your {}",
            key, MAIN_FILE
        );
        let declared = self
            .descriptions
            .get(&(component.to_string(), key.to_string()))
            .or_else(|| self.descriptions.get(&(GLOBAL_SCOPE.to_string(), key.to_string())));
        match declared {
            Some(description) => format!("{} ({})", description, missing),
            None => missing,
        }
    }

    /// Answers supplied during this run, without defaults.
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// Answers filled with manifest defaults; this is what gets persisted.
    pub fn snapshot(&self) -> Answers {
        let mut snapshot = self.answers.clone();
        snapshot.merge(&self.defaults);
        snapshot
    }

    /// Persist [`snapshot`](Self::snapshot) to `path`.
    pub fn write_file(&self, path: &Path) -> DeployResult<()> {
        self.snapshot().write(path)
    }
}

impl ValueResolver for ConfigStore {
    fn values(&self, component: &str) -> Values {
        ConfigStore::values(self, component)
    }

    fn resolve(&mut self, component: &str, key: &str) -> DeployResult<String> {
        ConfigStore::resolve(self, component, key)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("answers", &self.answers)
            .field("defaults", &self.defaults)
            .field("ask", &self.ask)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::NonInteractive;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    /// Answers every question with a fixed value and records the questions.
    struct FixedPrompter {
        value: String,
        asked: Mutex<Vec<Question>>,
    }

    impl FixedPrompter {
        fn new(value: &str) -> Arc<Self> {
            Arc::new(Self {
                value: value.to_string(),
                asked: Mutex::new(Vec::new()),
            })
        }
    }

    impl Prompter for FixedPrompter {
        fn ask(&self, question: &Question) -> DeployResult<String> {
            self.asked.lock().push(question.clone());
            Ok(self.value.clone())
        }
    }

    #[test]
    fn test_answers_merge_is_fill_only() {
        let mut answers = Answers::new().with("web", "port", "80");
        let added = answers.merge(&Answers::new().with("web", "port", "90").with("web", "host", "a"));
        assert_eq!(added, 1);
        assert_eq!(answers.get("web", "port"), Some("80"));
        assert_eq!(answers.get("web", "host"), Some("a"));
    }

    #[test]
    fn test_answers_parse_scalars() {
        let answers = Answers::parse("general:\n  replicas: 3\n  debug: true\nweb:\n").unwrap();
        assert_eq!(answers.get(GLOBAL_SCOPE, "replicas"), Some("3"));
        assert_eq!(answers.get(GLOBAL_SCOPE, "debug"), Some("true"));
        assert!(answers.scope("web").unwrap().is_empty());
    }

    #[test]
    fn test_answers_parse_rejects_nested_values() {
        let err = Answers::parse("web:\n  ports: [1, 2]\n").unwrap_err();
        assert!(err.contains("ports"));
    }

    #[test]
    fn test_answers_write_and_load() {
        let dir = tempdir().unwrap();
        let answers = Answers::new().with(GLOBAL_SCOPE, "provider", "noop").with("web", "port", "8080");

        for name in ["out/answers.yaml", "answers.json"] {
            let path = dir.path().join(name);
            answers.write(&path).unwrap();
            assert_eq!(Answers::load(&path).unwrap(), answers);
        }
    }

    #[test]
    fn test_values_precedence() {
        let manifest = Manifest::parse(
            r#"
params:
  - name: namespace
    default: default
graph:
  web:
    params:
      - name: port
        default: 80
"#,
        )
        .unwrap();

        let mut store = ConfigStore::new(Arc::new(NonInteractive));
        store.seed_defaults(&manifest);
        assert_eq!(store.values("web")["port"], "80");
        assert_eq!(store.get()["namespace"], "default");

        store.merge(&Answers::new().with("web", "port", "8080").with(GLOBAL_SCOPE, "namespace", "prod"));
        let values = store.values("web");
        assert_eq!(values["port"], "8080");
        assert_eq!(values["namespace"], "prod");
        assert!(!store.values("db").contains_key("port"));
    }

    #[test]
    fn test_resolve_prompts_once() {
        let prompter = FixedPrompter::new("8080");
        let mut store = ConfigStore::new(prompter.clone());

        assert_eq!(store.resolve("web", "port").unwrap(), "8080");
        assert_eq!(store.resolve("web", "port").unwrap(), "8080");

        let asked = prompter.asked.lock();
        assert_eq!(asked.len(), 1);
        assert!(asked[0].description.contains("'port'"));
        assert!(asked[0].description.contains(MAIN_FILE));
        assert_eq!(store.answers().get("web", "port"), Some("8080"));
    }

    #[test]
    fn test_resolve_uses_declared_description() {
        let manifest = Manifest::parse(
            "graph:\n  web:\n    params:\n      - name: port\n        description: HTTP port\n",
        )
        .unwrap();
        let prompter = FixedPrompter::new("1");
        let mut store = ConfigStore::new(prompter.clone());
        store.seed_defaults(&manifest);

        store.resolve("web", "port").unwrap();
        assert!(prompter.asked.lock()[0].description.starts_with("HTTP port"));
    }

    #[test]
    fn test_resolve_without_prompting_fails() {
        let prompter = FixedPrompter::new("8080");
        let mut store = ConfigStore::new(prompter.clone());
        store.set_ask(false);

        let err = store.resolve("web", "port").unwrap_err();
        assert!(matches!(err, DeployError::MissingValue { .. }));
        assert!(prompter.asked.lock().is_empty());
    }

    #[test]
    fn test_empty_answer_not_persisted() {
        let prompter = FixedPrompter::new("");
        let mut store = ConfigStore::new(prompter.clone());

        assert_eq!(store.resolve("web", "port").unwrap(), "");
        assert!(store.answers().get("web", "port").is_none());
    }

    #[test]
    fn test_snapshot_includes_defaults() {
        let manifest = Manifest::parse("params:\n  - name: namespace\n    default: dev\ngraph: {}\n").unwrap();
        let mut store = ConfigStore::new(Arc::new(NonInteractive));
        store.seed_defaults(&manifest);
        store.set("web", "port", "8080");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(GLOBAL_SCOPE, "namespace"), Some("dev"));
        assert_eq!(snapshot.get("web", "port"), Some("8080"));
    }
}

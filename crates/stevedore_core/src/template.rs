//! Artifact template rendering.
//!
//! Placeholders use `$name` or `${name}`; `$$` is a literal dollar sign.
//! Rendering is a bounded loop: substitute against the known values, and
//! when a placeholder has no value, resolve it (which may prompt) and start
//! the substitution over.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::debug;

use crate::answers::Values;
use crate::error::{DeployError, DeployResult};

const PLACEHOLDER_PATTERN: &str = r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))";

/// Supplies configuration values to the renderer.
pub trait ValueResolver {
    /// Values currently known for `component`.
    fn values(&self, component: &str) -> Values;

    /// Resolve a value that is not yet known. May block on user input.
    fn resolve(&mut self, component: &str, key: &str) -> DeployResult<String>;
}

/// Outcome of one substitution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Every placeholder had a value.
    Rendered(String),
    /// The first placeholder without a value.
    Missing(String),
}

/// Renders artifact templates against component configuration.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    pattern: Regex,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"),
        }
    }

    /// Distinct placeholder names used by a template.
    pub fn placeholder_names(&self, raw: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(raw)
            .filter_map(|caps| caps.name("named").or_else(|| caps.name("braced")))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// One whole-template substitution pass. Never returns partial output.
    pub fn substitute(&self, raw: &str, values: &Values) -> DeployResult<Substitution> {
        let mut output = String::with_capacity(raw.len());
        let mut last = 0;

        for caps in self.pattern.captures_iter(raw) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&raw[last..whole.start()]);

            if caps.name("escaped").is_some() {
                output.push('$');
            } else if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
                match values.get(name.as_str()) {
                    Some(value) => output.push_str(value),
                    None => return Ok(Substitution::Missing(name.as_str().to_string())),
                }
            } else {
                return Err(invalid_placeholder(raw, whole.start()));
            }

            last = whole.end();
        }

        output.push_str(&raw[last..]);
        Ok(Substitution::Rendered(output))
    }

    /// Render `raw` for `component`, resolving missing values one at a time.
    ///
    /// Fails with [`DeployError::UnresolvableArtifact`] as soon as a missing
    /// value resolves to an empty string.
    pub fn render<R>(&self, raw: &str, component: &str, resolver: &mut R) -> DeployResult<String>
    where
        R: ValueResolver + ?Sized,
    {
        let mut values = resolver.values(component);
        let max_passes = self.placeholder_names(raw).len() + 1;
        let mut last_missing = None;

        for _ in 0..max_passes {
            match self.substitute(raw, &values)? {
                Substitution::Rendered(output) => return Ok(output),
                Substitution::Missing(name) => {
                    debug!("Artifact contains unknown parameter {}, asking for it", name);
                    let value = resolver.resolve(component, &name)?;
                    if value.is_empty() {
                        return Err(DeployError::UnresolvableArtifact {
                            component: component.to_string(),
                            key: name,
                        });
                    }
                    values.insert(name.clone(), value);
                    last_missing = Some(name);
                }
            }
        }

        Err(DeployError::UnresolvableArtifact {
            component: component.to_string(),
            key: last_missing.unwrap_or_default(),
        })
    }
}

fn invalid_placeholder(raw: &str, offset: usize) -> DeployError {
    let before = &raw[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    DeployError::InvalidPlaceholder {
        line,
        column: before[line_start..].chars().count() + 1,
    }
}

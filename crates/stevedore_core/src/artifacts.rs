//! Artifact list resolution.
//!
//! A component declares one artifact list per provider. Entries are either
//! template paths or `inherit` directives that splice in the lists of other
//! providers of the same component.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::manifest::{sanitize_path, ArtifactSpec, GraphEntry, Manifest};

/// Flattened artifact list of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifacts {
    /// Artifact paths relative to the app directory, in declared order.
    pub paths: Vec<PathBuf>,
    /// Directory the rendered artifacts are written to.
    pub destination: PathBuf,
}

/// Resolves artifact lists of the components of one manifest.
pub struct ArtifactResolver<'a> {
    manifest: &'a Manifest,
    workdir: &'a Path,
}

impl<'a> ArtifactResolver<'a> {
    pub fn new(manifest: &'a Manifest, workdir: &'a Path) -> Self {
        Self { manifest, workdir }
    }

    /// Destination directory of a component's rendered artifacts.
    pub fn destination_dir(&self, component: &str) -> PathBuf {
        self.workdir.join(component)
    }

    /// Resolve the artifacts of `component` for `provider`, expanding
    /// inheritance directives in place.
    pub fn resolve(&self, component: &str, provider: &str) -> DeployResult<ResolvedArtifacts> {
        let entry = self.entry(component)?;

        let mut paths = Vec::new();
        let mut chain = Vec::new();
        self.expand(component, entry, provider, &mut chain, &mut paths)?;

        debug!(
            "Resolved {} artifact(s) for component {} with provider {}",
            paths.len(),
            component,
            provider
        );

        Ok(ResolvedArtifacts {
            paths,
            destination: self.destination_dir(component),
        })
    }

    fn entry(&self, component: &str) -> DeployResult<&'a GraphEntry> {
        self.manifest.graph()?.get(component).ok_or_else(|| {
            DeployError::Configuration(format!("Component '{}' is not part of the graph", component))
        })
    }

    fn expand(
        &self,
        component: &str,
        entry: &GraphEntry,
        provider: &str,
        chain: &mut Vec<String>,
        paths: &mut Vec<PathBuf>,
    ) -> DeployResult<()> {
        if chain.iter().any(|p| p == provider) {
            let mut cycle = chain.clone();
            cycle.push(provider.to_string());
            return Err(DeployError::InheritanceCycle {
                component: component.to_string(),
                chain: cycle,
            });
        }

        let artifacts = entry
            .artifacts
            .get(provider)
            .ok_or_else(|| DeployError::UnknownProviderData {
                component: component.to_string(),
                provider: provider.to_string(),
            })?;

        chain.push(provider.to_string());
        for artifact in artifacts {
            match artifact {
                ArtifactSpec::Inherit { inherit } => {
                    debug!("Inheriting from {:?}", inherit);
                    for parent in inherit {
                        self.expand(component, entry, parent, chain, paths)?;
                    }
                }
                ArtifactSpec::Path(path) => paths.push(sanitize_path(path)),
            }
        }
        chain.pop();

        Ok(())
    }

    /// Verify that every artifact path of every local component is inside
    /// and exists in the app directory.
    pub fn check_all(&self, app_path: &Path) -> DeployResult<()> {
        self.manifest.validate()?;
        for (component, entry) in self.manifest.graph()? {
            if entry.is_external() {
                continue;
            }
            for artifact in entry.artifacts.values().flatten() {
                if let ArtifactSpec::Path(path) = artifact {
                    let path = sanitize_path(path);
                    if !app_path.join(&path).is_file() {
                        return Err(DeployError::MissingArtifact {
                            component: component.clone(),
                            path,
                        });
                    }
                }
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

    const LAYERED: &str = r#"
graph:
  web:
    artifacts:
      a:
        - inherit: [b]
        - a/one
        - a/two
      b:
        - inherit: [c]
        - b/one
      c:
        - c/one
        - c/two
      multi:
        - inherit: [c, b]
        - file://multi/one
"#;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_three_level_inheritance() {
        let manifest = Manifest::parse(LAYERED).unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        let resolved = resolver.resolve("web", "a").unwrap();
        assert_eq!(
            resolved.paths,
            paths(&["c/one", "c/two", "b/one", "a/one", "a/two"])
        );
        assert_eq!(resolved.destination, PathBuf::from("/work/web"));
    }

    #[test]
    fn test_multiple_inherited_providers_in_order() {
        let manifest = Manifest::parse(LAYERED).unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        let resolved = resolver.resolve("web", "multi").unwrap();
        assert_eq!(
            resolved.paths,
            paths(&["c/one", "c/two", "c/one", "c/two", "b/one", "multi/one"])
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let manifest = Manifest::parse(LAYERED).unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        assert_eq!(resolver.resolve("web", "a").unwrap(), resolver.resolve("web", "a").unwrap());
    }

    #[test]
    fn test_unknown_provider_data() {
        let manifest = Manifest::parse(LAYERED).unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        let err = resolver.resolve("web", "noop").unwrap_err();
        assert!(
            matches!(err, DeployError::UnknownProviderData { ref component, ref provider } if component == "web" && provider == "noop")
        );
    }

    #[test]
    fn test_inherit_missing_provider() {
        let manifest =
            Manifest::parse("graph:\n  web:\n    artifacts:\n      a:\n        - inherit: [ghost]\n").unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        let err = resolver.resolve("web", "a").unwrap_err();
        assert!(matches!(err, DeployError::UnknownProviderData { ref provider, .. } if provider == "ghost"));
    }

    #[test]
    fn test_inheritance_cycle() {
        let manifest = Manifest::parse(
            "graph:\n  web:\n    artifacts:\n      a:\n        - inherit: [b]\n      b:\n        - inherit: [a]\n",
        )
        .unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));

        let err = resolver.resolve("web", "a").unwrap_err();
        match err {
            DeployError::InheritanceCycle { chain, .. } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_component() {
        let manifest = Manifest::parse(LAYERED).unwrap();
        let resolver = ArtifactResolver::new(&manifest, Path::new("/work"));
        assert!(matches!(resolver.resolve("db", "a"), Err(DeployError::Configuration(_))));
    }

    #[test]
    fn test_check_all() {
        let app = tempdir().unwrap();
        let manifest = Manifest::parse(
            "graph:\n  web:\n    artifacts:\n      noop:\n        - file://tmpl/deploy.tmpl\n  db:\n    source: docker://db\n",
        )
        .unwrap();
        let resolver = ArtifactResolver::new(&manifest, app.path());

        let err = resolver.check_all(app.path()).unwrap_err();
        assert!(matches!(err, DeployError::MissingArtifact { ref component, .. } if component == "web"));

        fs::create_dir_all(app.path().join("tmpl")).unwrap();
        fs::write(app.path().join("tmpl/deploy.tmpl"), "x").unwrap();
        resolver.check_all(app.path()).unwrap();
    }

    #[test]
    fn test_check_all_rejects_absolute_artifact() {
        let app = tempdir().unwrap();
        let outside = app.path().join("outside.txt");
        fs::write(&outside, "x").unwrap();
        let manifest = Manifest::parse(&format!(
            "graph:\n  web:\n    artifacts:\n      noop:\n        - {}\n",
            outside.display()
        ))
        .unwrap();

        let err = ArtifactResolver::new(&manifest, app.path())
            .check_all(app.path())
            .unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }
}

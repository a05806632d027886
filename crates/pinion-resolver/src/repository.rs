//! Lookup collaborators consumed by the resolver, plus an in-memory registry.
//!
//! The resolver only ever asks two questions: which versions of a library
//! exist, and what a given version of a library depends on. Anything that can
//! answer both (a registry index, a lockfile mirror, a test fixture) can drive
//! a resolution.

use std::path::Path;

use indexmap::IndexMap;
use miette::Diagnostic;
use pinion_util::errors::{PinionError, PinionResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a lookup collaborator.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum RepositoryError {
    /// The library (or the requested version of it) does not exist.
    #[error("No such library: {library}")]
    NotFound { library: String },

    /// The collaborator could not answer for another reason.
    #[error("Lookup for {library} failed: {message}")]
    Unavailable { library: String, message: String },
}

/// Answers which versions exist for a library.
pub trait VersionRepository {
    fn versions(&self, library: &str) -> Result<Vec<Version>, RepositoryError>;
}

/// Answers what a specific library version depends on, as child -> range.
pub trait DependencyRepository {
    fn dependencies(
        &self,
        library: &str,
        version: &Version,
    ) -> Result<IndexMap<String, String>, RepositoryError>;
}

/// A registry held entirely in memory: library -> version -> { child: range }.
///
/// Deserializes from the same shape, so fixture files can be written as
///
/// ```json
/// { "test2": { "0.1.0": { "test1": "^0.1.0" } }, "test1": { "0.1.0": {} } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryRepository {
    libraries: IndexMap<String, IndexMap<Version, IndexMap<String, String>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `library@version` with its dependency ranges.
    pub fn insert<I, K, R>(&mut self, library: &str, version: Version, dependencies: I)
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: Into<String>,
    {
        let dependencies = dependencies
            .into_iter()
            .map(|(k, r)| (k.into(), r.into()))
            .collect();
        self.libraries
            .entry(library.to_string())
            .or_default()
            .insert(version, dependencies);
    }

    pub fn from_json_str(content: &str) -> Result<Self, PinionError> {
        serde_json::from_str(content).map_err(|e| PinionError::Registry {
            message: format!("invalid JSON registry: {e}"),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PinionError> {
        toml::from_str(content).map_err(|e| PinionError::Registry {
            message: format!("invalid TOML registry: {e}"),
        })
    }

    /// Load a registry file, choosing the format from its extension.
    pub fn from_path(path: &Path) -> PinionResult<Self> {
        let content = pinion_util::fs::read_to_string(path)?;
        let repo = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => {
                return Err(PinionError::Registry {
                    message: format!(
                        "unsupported registry format: {} (expected .json or .toml)",
                        path.display()
                    ),
                }
                .into())
            }
        };
        tracing::debug!(
            "Loaded registry {} with {} libraries",
            path.display(),
            repo.len()
        );
        Ok(repo)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl VersionRepository for MemoryRepository {
    fn versions(&self, library: &str) -> Result<Vec<Version>, RepositoryError> {
        self.libraries
            .get(library)
            .map(|versions| versions.keys().cloned().collect())
            .ok_or_else(|| RepositoryError::NotFound {
                library: library.to_string(),
            })
    }
}

impl DependencyRepository for MemoryRepository {
    fn dependencies(
        &self,
        library: &str,
        version: &Version,
    ) -> Result<IndexMap<String, String>, RepositoryError> {
        self.libraries
            .get(library)
            .and_then(|versions| versions.get(version))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                library: library.to_string(),
            })
    }
}

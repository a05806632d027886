//! Per-run lookup caches.
//!
//! Both caches live exactly as long as one resolution run. Version lists are
//! fetched once per library; dependency maps once per library version, so a
//! version re-selected after backtracking reuses what was fetched before.

use std::collections::HashMap;

use indexmap::IndexMap;
use semver::Version;

use crate::range::sort_descending;

/// Known versions per library, newest first.
#[derive(Debug, Default)]
pub struct VersionCache {
    versions: HashMap<String, Vec<Version>>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, library: &str) -> bool {
        self.versions.contains_key(library)
    }

    /// Store a library's versions, sorting them newest first.
    pub fn insert(&mut self, library: &str, mut versions: Vec<Version>) {
        sort_descending(&mut versions);
        self.versions.insert(library.to_string(), versions);
    }

    pub fn get(&self, library: &str) -> Option<&[Version]> {
        self.versions.get(library).map(Vec::as_slice)
    }
}

/// Dependency ranges per library version.
#[derive(Debug, Default)]
pub struct DependencyCache {
    entries: HashMap<String, HashMap<Version, IndexMap<String, String>>>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, library: &str, version: &Version) -> bool {
        self.get(library, version).is_some()
    }

    pub fn insert(&mut self, library: &str, version: Version, dependencies: IndexMap<String, String>) {
        self.entries
            .entry(library.to_string())
            .or_default()
            .insert(version, dependencies);
    }

    pub fn get(&self, library: &str, version: &Version) -> Option<&IndexMap<String, String>> {
        self.entries.get(library)?.get(version)
    }
}

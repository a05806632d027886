//! The resolution engine.
//!
//! A run repeats passes until no library is waiting for a version:
//! 1. fetch the version list of every queued library not seen before
//! 2. for each queued library, take the lowest of the maxima its parents'
//!    ranges allow and commit it, unless another parent's range rejects it,
//!    in which case that parent is backtracked to an older version
//! 3. fetch the dependency ranges of every newly committed version
//! 4. attach those ranges, dropping and re-queuing the children they touch
//! 5. forget queued libraries that nothing live refers to any more
//!
//! Lookups only happen in steps 1 and 3, and each one is cached for the rest
//! of the run.

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use semver::Version;

use crate::cache::{DependencyCache, VersionCache};
use crate::config::ResolverConfig;
use crate::conflict::{Backtrack, BacktrackReport, ResolveError};
use crate::graph::DependencyGraph;
use crate::range::Range;
use crate::repository::{DependencyRepository, VersionRepository};
use crate::state::{describe, Edge, NodeId, ResolutionState};

/// One resolution run over a fixed set of root demands.
///
/// All state, queues and caches belong to this instance, so independent
/// resolvers can run in parallel. [`Resolver::resolve`] consumes the
/// resolver; a run cannot be repeated on the same instance.
pub struct Resolver<'a, V: ?Sized, D: ?Sized> {
    versions_repo: &'a V,
    dependencies_repo: &'a D,
    config: ResolverConfig,
    state: ResolutionState,
    version_cache: VersionCache,
    dependency_cache: DependencyCache,
    calculation_queue: Vec<String>,
    constraint_update_queue: Vec<String>,
    backtracks: BacktrackReport,
}

impl<'a, V, D> Resolver<'a, V, D>
where
    V: VersionRepository + ?Sized,
    D: DependencyRepository + ?Sized,
{
    /// Create a resolver for `demands` (library -> range) with default settings.
    pub fn new<I, K, R>(
        demands: I,
        versions_repo: &'a V,
        dependencies_repo: &'a D,
    ) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: AsRef<str>,
    {
        Self::with_config(demands, versions_repo, dependencies_repo, ResolverConfig::default())
    }

    pub fn with_config<I, K, R>(
        demands: I,
        versions_repo: &'a V,
        dependencies_repo: &'a D,
        config: ResolverConfig,
    ) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: AsRef<str>,
    {
        let mut root = IndexMap::new();
        for (library, range) in demands {
            let library: String = library.into();
            let range = parse_range(&library, range.as_ref())?;
            root.insert(library, Edge::new(range));
        }
        let calculation_queue = root.keys().cloned().collect();

        Ok(Self {
            versions_repo,
            dependencies_repo,
            config,
            state: ResolutionState::new(root),
            version_cache: VersionCache::new(),
            dependency_cache: DependencyCache::new(),
            calculation_queue,
            constraint_update_queue: Vec::new(),
            backtracks: BacktrackReport::new(),
        })
    }

    /// Run passes until every reachable library has a version.
    pub fn resolve(mut self) -> Result<Resolution, ResolveError> {
        self.settle()?;
        Ok(Resolution::from_state(self.state, self.backtracks))
    }

    /// Repeat passes until the calculation queue is empty, returning how many ran.
    fn settle(&mut self) -> Result<usize, ResolveError> {
        let mut passes = 0;
        while !self.calculation_queue.is_empty() {
            if passes == self.config.max_passes {
                return Err(ResolveError::PassLimitExceeded {
                    limit: self.config.max_passes,
                });
            }
            passes += 1;
            tracing::debug!(
                "Resolution pass {passes}: {} libraries queued",
                self.calculation_queue.len()
            );

            self.cache_versions()?;
            self.resolve_versions()?;
            self.cache_dependencies()?;
            self.propagate_constraints()?;
        }

        tracing::debug!(
            "Resolution settled after {passes} passes with {} backtracks",
            self.backtracks.len()
        );
        Ok(passes)
    }

    fn cache_versions(&mut self) -> Result<(), ResolveError> {
        for library in &self.calculation_queue {
            if self.version_cache.contains(library) {
                continue;
            }
            tracing::trace!("Fetching versions of {library}");
            let versions = self.versions_repo.versions(library)?;
            self.version_cache.insert(library, versions);
        }
        Ok(())
    }

    fn resolve_versions(&mut self) -> Result<(), ResolveError> {
        let batch: IndexSet<String> = std::mem::take(&mut self.calculation_queue)
            .into_iter()
            .collect();

        for library in &batch {
            // Already re-queued by a backtrack in this batch: whatever we
            // would compute now is about to be invalidated.
            if self.calculation_queue.contains(library) {
                continue;
            }
            if let Some(version) = self.max_satisfying(library)? {
                tracing::debug!("Selected {library}@{version}");
                self.state.commit(library, version);
                self.constraint_update_queue.push(library.clone());
            }
        }

        // Later backtracks in the batch may have dropped earlier commits.
        let state = &self.state;
        self.constraint_update_queue
            .retain(|library| state.contains_library(library));
        Ok(())
    }

    /// Pick the version for `library`, or backtrack and return `None`.
    fn max_satisfying(&mut self, library: &str) -> Result<Option<Version>, ResolveError> {
        let versions = self.version_cache.get(library).unwrap_or_default();

        let mut constraints: Vec<(NodeId, Edge)> = Vec::new();
        for (parent, node) in self.state.iter_mut() {
            let Some(edge) = node.dependencies.get_mut(library) else {
                continue;
            };
            if edge.max_satisfying.is_none() {
                let Some(max) = edge.range.max_satisfying(versions) else {
                    return Err(unsatisfiable(
                        library,
                        edge,
                        describe(parent, node.version.as_ref()),
                    ));
                };
                edge.max_satisfying = Some(max);
            }
            constraints.push((parent.clone(), edge.clone()));
        }

        // Lowest maximum wins; on a tie the earlier parent keeps it.
        let mut tightest: Option<(&NodeId, &Version)> = None;
        for (parent, edge) in &constraints {
            let Some(max) = edge.max_satisfying.as_ref() else {
                continue;
            };
            match tightest {
                Some((_, lowest)) if max >= lowest => {}
                _ => tightest = Some((parent, max)),
            }
        }
        let Some((constraining, candidate)) = tightest else {
            return Ok(None);
        };

        // The first parent in state order whose range rejects the candidate
        // gets backtracked; any further conflicts surface on a later pass.
        for (parent, edge) in &constraints {
            if parent == constraining || edge.range.satisfied_by(candidate) {
                continue;
            }
            let displaced = match (parent.as_library(), self.state.version_of(parent)) {
                (Some(name), Some(version)) => (name.to_string(), version.clone()),
                _ => {
                    return Err(ResolveError::RootUnsatisfiable {
                        library: library.to_string(),
                        range: edge.range.to_string(),
                        constraining_parent: constraining.to_string(),
                        constraining_version: self
                            .state
                            .version_of(constraining)
                            .map(ToString::to_string)
                            .unwrap_or_default(),
                    })
                }
            };
            self.backtrack(library, constraining, &displaced.0, displaced.1);
            return Ok(None);
        }

        Ok(Some(candidate.clone()))
    }

    /// Make `constraining` demand an older `displaced`, then drop and re-queue it.
    fn backtrack(
        &mut self,
        library: &str,
        constraining: &NodeId,
        displaced: &str,
        displaced_version: Version,
    ) {
        let range = Range::below(&displaced_version);
        let constraining_name = self.state.describe(constraining);
        tracing::debug!(
            "Backtracking {displaced}@{displaced_version}: {constraining_name} now requires {range} over {library}"
        );

        self.backtracks.add(Backtrack {
            library: library.to_string(),
            constraining: constraining_name,
            displaced: displaced.to_string(),
            displaced_version,
            range: range.to_string(),
        });

        if let Some(node) = self.state.get_mut(constraining) {
            node.dependencies
                .insert(displaced.to_string(), Edge::backtracked(range, library));
        }
        self.state.drop_library(displaced, &mut self.calculation_queue);
        self.calculation_queue.push(displaced.to_string());
    }

    fn cache_dependencies(&mut self) -> Result<(), ResolveError> {
        for library in &self.constraint_update_queue {
            let Some(version) = self.state.version_of(&NodeId::library(library)) else {
                continue;
            };
            if self.dependency_cache.contains(library, version) {
                continue;
            }
            tracing::trace!("Fetching dependencies of {library}@{version}");
            let dependencies = self.dependencies_repo.dependencies(library, version)?;
            self.dependency_cache
                .insert(library, version.clone(), dependencies);
        }
        Ok(())
    }

    fn propagate_constraints(&mut self) -> Result<(), ResolveError> {
        let updates: IndexSet<String> = std::mem::take(&mut self.constraint_update_queue)
            .into_iter()
            .collect();
        for library in &updates {
            self.update_constraints(library)?;
        }

        let state = &self.state;
        self.calculation_queue
            .retain(|library| state.is_referenced(library));
        Ok(())
    }

    /// Attach the cached ranges of `library`'s committed version and re-queue
    /// its children from scratch.
    fn update_constraints(&mut self, library: &str) -> Result<(), ResolveError> {
        let id = NodeId::library(library);
        // Dropped by an earlier update in this pass.
        let Some(version) = self.state.version_of(&id) else {
            return Ok(());
        };
        let Some(ranges) = self.dependency_cache.get(library, version) else {
            return Ok(());
        };

        let mut edges = IndexMap::with_capacity(ranges.len());
        for (child, range) in ranges {
            edges.insert(child.clone(), Edge::new(parse_range(child, range)?));
        }
        let children: Vec<String> = edges.keys().cloned().collect();
        if let Some(node) = self.state.get_mut(&id) {
            node.dependencies = edges;
        }

        for child in children {
            self.state.drop_library(&child, &mut self.calculation_queue);
            self.calculation_queue.push(child);
        }
        Ok(())
    }
}

fn parse_range(library: &str, range: &str) -> Result<Range, ResolveError> {
    Range::parse(range).map_err(|source| ResolveError::InvalidRange {
        library: library.to_string(),
        range: range.to_string(),
        source,
    })
}

fn unsatisfiable(library: &str, edge: &Edge, constraining: String) -> ResolveError {
    match &edge.backtracked_due_to {
        Some(due_to) => ResolveError::UnsatisfiableBacktrackedConstraint {
            library: library.to_string(),
            range: edge.range.to_string(),
            constraining,
            backtracked_due_to: due_to.clone(),
        },
        None => ResolveError::UnsatisfiableConstraint {
            library: library.to_string(),
            range: edge.range.to_string(),
            constraining,
        },
    }
}

/// The outcome of a successful run: one version per library reachable from
/// the root demands.
#[derive(Debug)]
pub struct Resolution {
    versions: IndexMap<String, Version>,
    graph: DependencyGraph,
    backtracks: BacktrackReport,
}

impl Resolution {
    fn from_state(state: ResolutionState, backtracks: BacktrackReport) -> Self {
        let graph = DependencyGraph::from_state(&state);
        let versions = state
            .libraries()
            .filter_map(|(name, node)| node.version.clone().map(|v| (name.to_string(), v)))
            .collect();
        Self {
            versions,
            graph,
            backtracks,
        }
    }

    /// Resolved versions in the order they were last committed.
    pub fn versions(&self) -> &IndexMap<String, Version> {
        &self.versions
    }

    pub fn get(&self, library: &str) -> Option<&Version> {
        self.versions.get(library)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn backtracks(&self) -> &BacktrackReport {
        &self.backtracks
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Resolved versions sorted by library name.
    pub fn into_versions(self) -> BTreeMap<String, Version> {
        self.versions.into_iter().collect()
    }
}

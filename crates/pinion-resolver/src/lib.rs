//! Dependency resolution engine: picks one semver version per library so that
//! every range imposed by the dependency graph holds, using iterative
//! constraint propagation with backtracking and cascading invalidation.

pub mod cache;
pub mod config;
pub mod conflict;
pub mod graph;
pub mod range;
pub mod repository;
pub mod resolver;
pub mod state;

pub use config::ResolverConfig;
pub use conflict::{BacktrackReport, ResolveError};
pub use repository::{DependencyRepository, MemoryRepository, RepositoryError, VersionRepository};
pub use resolver::{Resolution, Resolver};

//! Resolution failures and the record of backtracks taken on the way to a
//! successful resolution.

use std::fmt;

use miette::Diagnostic;
use semver::Version;
use thiserror::Error;

use crate::repository::RepositoryError;

/// Why a resolution run aborted. The first failure wins; no partial result is
/// produced.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// A lookup collaborator failed, surfaced unchanged.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Repository(#[from] RepositoryError),

    /// No known version of `library` satisfies `range`.
    #[error("Unable to satisfy version constraint: {library}@{range} from {constraining}")]
    UnsatisfiableConstraint {
        library: String,
        range: String,
        /// `root` or `<parent>@<version>`.
        constraining: String,
    },

    /// Like [`ResolveError::UnsatisfiableConstraint`], for a range that an
    /// earlier backtrack wrote.
    #[error(
        "Unable to satisfy backtracked version constraint: {library}@{range} from {constraining} \
         due to shared constraint on {backtracked_due_to}"
    )]
    UnsatisfiableBacktrackedConstraint {
        library: String,
        range: String,
        constraining: String,
        backtracked_due_to: String,
    },

    /// A root demand conflicts with the tightest bound, and the root cannot be
    /// backtracked.
    #[error(
        "Unable to satisfy version constraint: {library}@{range} from root due to shared \
         constraint from {constraining_parent}@{constraining_version}"
    )]
    #[diagnostic(help("Relax the direct requirement on {library}"))]
    RootUnsatisfiable {
        library: String,
        range: String,
        constraining_parent: String,
        constraining_version: String,
    },

    #[error("Invalid version range for {library}: {range}")]
    InvalidRange {
        library: String,
        range: String,
        #[source]
        source: semver::Error,
    },

    #[error("Resolution did not settle within {limit} passes")]
    #[diagnostic(help(
        "Raise max-passes in the [resolver] table of pinion.toml, or look for circular dependencies"
    ))]
    PassLimitExceeded { limit: usize },
}

/// A single backtrack: `displaced@displaced_version` conflicted with the
/// tightest bound on `library`, so `constraining` now requires `range` of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backtrack {
    pub library: String,
    pub constraining: String,
    pub displaced: String,
    pub displaced_version: Version,
    pub range: String,
}

/// All backtracks performed during a resolution, in the order they happened.
#[derive(Debug, Default, Clone)]
pub struct BacktrackReport {
    pub backtracks: Vec<Backtrack>,
}

impl BacktrackReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, backtrack: Backtrack) {
        self.backtracks.push(backtrack);
    }

    pub fn is_empty(&self) -> bool {
        self.backtracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backtracks.len()
    }
}

impl fmt::Display for BacktrackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.backtracks.is_empty() {
            return write!(f, "No backtracking.");
        }
        writeln!(f, "Backtracks ({}):", self.backtracks.len())?;
        for b in &self.backtracks {
            writeln!(f, "  {b}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Backtrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} displaced by {} over {} (now {})",
            self.displaced, self.displaced_version, self.constraining, self.library, self.range
        )
    }
}

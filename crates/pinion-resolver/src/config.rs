use std::path::Path;

use pinion_util::errors::{PinionError, PinionResult};
use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "pinion.toml";

/// Resolver settings from the `[resolver]` table of `pinion.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Upper bound on resolution passes before giving up.
    ///
    /// Some registries never settle: circular dependencies, and backtracks
    /// whose `<version` edge lands on a descendant of the displaced library.
    /// Dropping the displaced library drops that edge too, so the same
    /// conflict comes back every few passes.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
        }
    }
}

fn default_max_passes() -> usize {
    10_000
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    resolver: ResolverConfig,
}

impl ResolverConfig {
    pub fn from_toml_str(content: &str) -> PinionResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| PinionError::Config {
            message: format!("Failed to parse {CONFIG_FILE}: {e}"),
        })?;
        let config = file.resolver;
        if config.max_passes == 0 {
            return Err(PinionError::Config {
                message: "max-passes must be at least 1".to_string(),
            }
            .into());
        }
        Ok(config)
    }

    /// Load from a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> PinionResult<Self> {
        if path.is_file() {
            let content = pinion_util::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from the nearest `pinion.toml` at or above `start`.
    pub fn discover(start: &Path) -> PinionResult<Self> {
        match pinion_util::fs::find_ancestor_with(start, CONFIG_FILE) {
            Some(dir) => {
                tracing::debug!("Using resolver config from {}", dir.display());
                Self::load(&dir.join(CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }
}

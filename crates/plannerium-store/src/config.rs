use std::env;
use std::path::PathBuf;

/// Project storage configuration.
///
/// Reads from the `PLANNERIUM_STORAGE_DIR` environment variable, falling back
/// to `./storage` when unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding one `<project>.json` file per saved project.
    pub dir: PathBuf,
}

impl StoreConfig {
    /// The directory used when no environment variable is set.
    pub const DEFAULT_DIR: &str = "storage";

    /// Environment variable consulted by [`StoreConfig::from_env`].
    pub const ENV_VAR: &str = "PLANNERIUM_STORAGE_DIR";

    /// Build a config from the environment.
    ///
    /// Priority: `PLANNERIUM_STORAGE_DIR` env var, then the default.
    pub fn from_env() -> Self {
        let dir = env::var_os(Self::ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_DIR));
        Self { dir }
    }

    /// Build a config from an explicit directory (useful for tests and CLI flags).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `project`. The name must already be validated.
    pub fn project_path(&self, project: &str) -> PathBuf {
        self.dir.join(format!("{project}.json"))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

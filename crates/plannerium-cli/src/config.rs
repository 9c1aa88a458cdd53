//! Configuration file management for plannerium.
//!
//! Provides a TOML-based config file at `~/.config/plannerium/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use plannerium_core::generator::{self, Generator, GeneratorSettings, Provider};
use plannerium_store::StoreConfig;

pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 120;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub generator: GeneratorSection,
    pub storage: StorageSection,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSection {
    /// `gemini` or `openai`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plannerium config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plannerium` or
/// `~/.config/plannerium`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plannerium");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plannerium")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file, or `None` when there is none. A file that exists
/// but does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file holds an API key, so it is owner-only (0600) on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given as global CLI flags. Each one beats every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub stage_timeout_secs: Option<u64>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlanneriumConfig {
    pub generator: GeneratorSettings,
    pub store: StoreConfig,
    pub stage_timeout: Duration,
}

impl PlanneriumConfig {
    /// Resolve against the real config file.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        Self::resolve_with(overrides, load_config()?)
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `--api-key` > `PLANNERIUM_API_KEY` > `GEMINI_API_KEY` > `generator.api_key`
    /// - Model: `--model` > `PLANNERIUM_MODEL` > `generator.model` > `gemini-2.5-flash`
    /// - Provider: `PLANNERIUM_PROVIDER` > `generator.provider` > `gemini`
    /// - Base URL: `PLANNERIUM_BASE_URL` > `generator.base_url` > provider default
    /// - Storage dir: `--storage-dir` > `PLANNERIUM_STORAGE_DIR` > `storage.dir` > `./storage`
    /// - Stage timeout: `--timeout` > `PLANNERIUM_STAGE_TIMEOUT_SECS` > `pipeline.stage_timeout_secs` > 120s
    ///
    /// A missing API key is not an error here; see [`Self::build_generator`].
    pub fn resolve_with(overrides: &Overrides, file: Option<ConfigFile>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let provider_name = env("PLANNERIUM_PROVIDER").or(file.generator.provider);
        let provider = match provider_name {
            Some(name) => name.parse::<Provider>()?,
            None => Provider::default(),
        };

        let api_key = overrides
            .api_key
            .clone()
            .or_else(|| env("PLANNERIUM_API_KEY"))
            .or_else(|| env("GEMINI_API_KEY"))
            .or(file.generator.api_key);

        let model = overrides
            .model
            .clone()
            .or_else(|| env("PLANNERIUM_MODEL"))
            .or(file.generator.model)
            .unwrap_or_else(|| generator::gemini::DEFAULT_MODEL.to_string());

        let base_url = env("PLANNERIUM_BASE_URL").or(file.generator.base_url);

        let storage_dir = if let Some(ref dir) = overrides.storage_dir {
            dir.clone()
        } else if let Some(dir) = env(StoreConfig::ENV_VAR) {
            PathBuf::from(dir)
        } else if let Some(dir) = file.storage.dir {
            dir
        } else {
            PathBuf::from(StoreConfig::DEFAULT_DIR)
        };

        let timeout_secs = match overrides.stage_timeout_secs {
            Some(secs) => secs,
            None => match env("PLANNERIUM_STAGE_TIMEOUT_SECS") {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("PLANNERIUM_STAGE_TIMEOUT_SECS is not a number: {raw}"))?,
                None => file
                    .pipeline
                    .stage_timeout_secs
                    .unwrap_or(DEFAULT_STAGE_TIMEOUT_SECS),
            },
        };
        if timeout_secs == 0 {
            bail!("stage timeout must be at least one second");
        }
        let stage_timeout = Duration::from_secs(timeout_secs);

        Ok(Self {
            generator: GeneratorSettings {
                provider,
                model,
                api_key,
                base_url,
                request_timeout: Some(stage_timeout),
            },
            store: StoreConfig::new(storage_dir),
            stage_timeout,
        })
    }

    /// Construct the configured backend. Gemini without a key is an error.
    pub fn build_generator(&self) -> Result<Box<dyn Generator>> {
        if self.generator.provider == Provider::Gemini && self.generator.api_key.is_none() {
            bail!(
                "API key not found; set PLANNERIUM_API_KEY (or GEMINI_API_KEY), pass --api-key, or run `plannerium init`"
            );
        }
        let generator = generator::build_generator(&self.generator)
            .context("failed to construct the text generator")?;
        tracing::debug!(
            provider = %self.generator.provider,
            model = %self.generator.model,
            "generator ready"
        );
        Ok(generator)
    }
}

/// Non-empty env var value.
fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::FallbackPlan;
use crate::errors::{KvFetchError, Result};

/// Tool configuration, loaded from `.kvfetch.toml`.
///
/// Every field has a sensible default so kvfetch works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Global timeout for every HTTP call, in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Key Vault REST API version sent with each request.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Which tier list the token acquirer walks.
    #[serde(default)]
    pub fallback: FallbackPlan,

    /// Whether the identity provider keeps a local token cache.
    #[serde(default = "default_true")]
    pub token_cache: bool,

    /// Token cache location (default: `~/.config/kvfetch/token-cache.json`).
    #[serde(default)]
    pub token_cache_path: Option<PathBuf>,

    /// Azure CLI executable used for the ambient tier.
    #[serde(default = "default_azure_cli")]
    pub azure_cli: String,

    /// Reject bearer challenges whose resource is not a parent domain
    /// of the vault host.
    #[serde(default = "default_true")]
    pub verify_challenge_resource: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_version() -> String {
    "7.4".to_string()
}

fn default_azure_cli() -> String {
    "az".to_string()
}

fn default_true() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            api_version: default_api_version(),
            fallback: FallbackPlan::default(),
            token_cache: true,
            token_cache_path: None,
            azure_cli: default_azure_cli(),
            verify_challenge_resource: true,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the working directory.
    const FILE_NAME: &'static str = ".kvfetch.toml";

    /// Load settings from `<dir>/.kvfetch.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_file(&config_path)
    }

    /// Load settings from an explicit path. The file must exist.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            KvFetchError::Config(format!("Failed to read {}: {e}", config_path.display()))
        })?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            KvFetchError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.timeout_secs == 0 {
            return Err(KvFetchError::Config(format!(
                "{}: timeout_secs must be greater than zero",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// HTTP timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the token cache path, or `None` when caching is disabled
    /// or no home directory can be found.
    pub fn resolved_token_cache_path(&self) -> Option<PathBuf> {
        if !self.token_cache {
            return None;
        }
        if let Some(path) = &self.token_cache_path {
            return Some(path.clone());
        }
        // Use $HOME/.config/kvfetch on all platforms.
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("kvfetch")
                .join("token-cache.json"),
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────────

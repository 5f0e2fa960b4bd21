//! On-disk settings for the CLI.
//!
//! Lives in `$XDG_CONFIG_HOME/kbase/config.toml` on Linux (the platform
//! equivalent elsewhere):
//!
//! ```toml
//! [auth]
//! token = "..."
//!
//! [server]
//! api_url = "https://kb.example.com"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use kbase_business::BusinessConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for the knowledge API
    pub token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL; `/api` is appended by the client
    pub api_url: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "kbase", "kbase")
            .context("Failed to determine config directory")?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Missing files yield the default configuration.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn token(&self) -> Option<&str> {
        self.auth.token.as_deref()
    }

    pub fn set_token(&mut self, token: &str) {
        self.auth.token = Some(token.trim().to_owned());
    }

    pub fn clear_token(&mut self) {
        self.auth.token = None;
    }

    /// Library configuration, with `api_url_override` (flag or env) taking
    /// precedence over the saved server.
    pub fn business_config(&self, api_url_override: Option<&str>) -> BusinessConfig {
        let mut config = match api_url_override.or(self.server.api_url.as_deref()) {
            Some(url) => BusinessConfig::new(url.to_owned()),
            None => BusinessConfig::default(),
        };
        config.token = self.auth.token.clone();
        config
    }
}

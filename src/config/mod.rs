//! Configuration loading
//!
//! Settings come from an optional `config.toml` in the platform config
//! directory, then the environment, then command-line overrides.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "TOKEN";
/// Environment variable overriding the store location
pub const CHATS_FILE_ENV: &str = "CHATS_FILE";

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Optional settings read from `config.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Path of the JSON store
    pub data_file: Option<PathBuf>,
    /// Long-poll timeout for getUpdates, in seconds
    pub poll_timeout_secs: Option<u64>,
    /// Bot API server base URL
    pub api_base: Option<String>,
}

impl FileConfig {
    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }
}

/// Resolved runtime configuration
pub struct Config {
    pub token: String,
    pub data_file: PathBuf,
    pub poll_timeout: Duration,
    pub api_base: url::Url,
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "everyone-tagger", "everyone-tagger")
            .context("Could not determine config directory")
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn default_data_file() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("chats.json"))
    }

    /// Load the config file and environment. `data_file` overrides both.
    pub fn load(data_file: Option<PathBuf>) -> Result<Self> {
        let file = FileConfig::load_from(&Self::config_path()?)?;
        let token = std::env::var(TOKEN_ENV).ok();
        let env_data_file = std::env::var_os(CHATS_FILE_ENV).map(PathBuf::from);
        Self::resolve(file, token, data_file.or(env_data_file))
    }

    /// Merge file settings with already-read environment values.
    pub fn resolve(
        file: FileConfig,
        token: Option<String>,
        data_file: Option<PathBuf>,
    ) -> Result<Self> {
        let token = match token.filter(|t| !t.trim().is_empty()) {
            Some(t) => t,
            None => bail!("{} environment variable not set", TOKEN_ENV),
        };

        let data_file = match data_file.or(file.data_file) {
            Some(p) => p,
            None => Self::default_data_file()?,
        };

        let api_base = file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let api_base = url::Url::parse(api_base)
            .with_context(|| format!("Invalid api_base '{}'", api_base))?;

        Ok(Self {
            token,
            data_file,
            poll_timeout: Duration::from_secs(
                file.poll_timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            ),
            api_base,
        })
    }

    /// Store location without requiring a token (for offline commands).
    pub fn data_file_only(data_file: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(p) = data_file.or_else(|| std::env::var_os(CHATS_FILE_ENV).map(PathBuf::from)) {
            return Ok(p);
        }
        let file = FileConfig::load_from(&Self::config_path()?)?;
        match file.data_file {
            Some(p) => Ok(p),
            None => Self::default_data_file(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &mask(&self.token))
            .field("data_file", &self.data_file)
            .field("poll_timeout_secs", &self.poll_timeout.as_secs())
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

fn mask(s: &str) -> String {
    match s.split_once(':') {
        Some((bot_id, _)) => format!("{}:***", bot_id),
        None => "***".to_string(),
    }
}

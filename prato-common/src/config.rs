//! Configuration loading and root folder resolution
//!
//! Every setting resolves in priority order:
//! 1. Command-line argument (highest priority; clap also folds in the env var)
//! 2. TOML config file
//! 3. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it logs a warning and
//! the defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Downstream API used when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://your-api.com";
/// HTTP listen port of prato-sync
pub const DEFAULT_PORT: u16 = 5780;
/// Scheduled reconciliation interval (every 5 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
/// Database file inside the root folder
pub const DATABASE_FILE: &str = "prato.db";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub api_url: Option<String>,
    pub port: Option<u16>,
    pub sync_interval_secs: Option<u64>,
    pub api_timeout_secs: Option<u64>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load from `explicit` or the platform config location, falling back to defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_file() {
                Some(path) => path,
                None => {
                    info!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Values supplied on the command line (or via their env vars)
#[derive(Debug, Clone, Default)]
pub struct SettingOverrides {
    pub root_folder: Option<PathBuf>,
    pub api_url: Option<String>,
    pub port: Option<u16>,
    pub sync_interval_secs: Option<u64>,
    pub api_timeout_secs: Option<u64>,
}

/// Fully resolved settings for prato-sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub root_folder: PathBuf,
    /// Base URL of the downstream API, without trailing slash
    pub api_url: String,
    pub port: u16,
    pub sync_interval_secs: u64,
    /// Outbound request timeout; `None` keeps the client default
    pub api_timeout_secs: Option<u64>,
}

impl SyncSettings {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(overrides: SettingOverrides, toml: &TomlConfig) -> Result<Self> {
        let root_folder = overrides
            .root_folder
            .or_else(|| toml.root_folder.clone())
            .unwrap_or_else(default_root_folder);

        let api_url = overrides
            .api_url
            .or_else(|| toml.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API URL must start with http:// or https://, got '{}'",
                api_url
            )));
        }

        let sync_interval_secs = overrides
            .sync_interval_secs
            .or(toml.sync_interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        if sync_interval_secs == 0 {
            return Err(Error::Config(
                "Sync interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            root_folder,
            api_url,
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            sync_interval_secs,
            api_timeout_secs: overrides.api_timeout_secs.or(toml.api_timeout_secs),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Create the root folder if missing
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}

/// Platform config file location, if one exists
pub fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("prato").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/prato/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/prato (or /var/lib/prato for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("prato"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/prato"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/prato
        dirs::data_dir()
            .map(|d| d.join("prato"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/prato"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\prato
        dirs::data_local_dir()
            .map(|d| d.join("prato"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\prato"))
    } else {
        PathBuf::from("./prato_data")
    }
}

//! Configuration management for the armor extractor.
//!
//! Loads configuration from a TOML file and provides runtime defaults.

use crate::locator::{VIEW_CLASS_NAME, WEB_VIEW_CLASS_NAME};
use crate::temp_storage::DEFAULT_TTL_SECONDS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "ARMOR_EXTRACTOR_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub locator: LocatorConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub decrypt: DecryptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocatorConfig {
    /// Class name of the web content container
    #[serde(default = "default_web_view_class")]
    pub web_view_class: String,

    /// Class name of a plain text run inside the web view
    #[serde(default = "default_text_run_class")]
    pub text_run_class: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            web_view_class: default_web_view_class(),
            text_run_class: default_text_run_class(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory of the temporary store (defaults to the user data dir)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Authority part of the `content://` URIs handed out
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Seconds a temporary file is kept
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            authority: default_authority(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl StorageConfig {
    /// The configured directory, or `<data dir>/armor-extractor/tempstorage`.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("armor-extractor")
                .join("tempstorage")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecryptConfig {
    /// Intent action understood by the decrypting application
    #[serde(default = "default_action")]
    pub action: String,

    /// Program that receives the intent; `None` disables launching
    #[serde(default)]
    pub program: Option<String>,

    /// Extra arguments placed before the intent arguments
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            action: default_action(),
            program: None,
            args: Vec::new(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_web_view_class() -> String {
    WEB_VIEW_CLASS_NAME.to_string()
}

fn default_text_run_class() -> String {
    VIEW_CLASS_NAME.to_string()
}

fn default_authority() -> String {
    "org.sufficientlysecure.keychain.tempstorage".to_string()
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_action() -> String {
    "org.sufficientlysecure.keychain.action.DECRYPT_DATA".to_string()
}

/// Where a loaded configuration came from.
///
/// Binaries read the config before their logger exists, so the outcome is
/// kept and logged once logging is set up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    /// Parsed from this file
    File(PathBuf),
    /// No readable file at this path; defaults used
    Missing(PathBuf),
    /// The file did not parse; defaults used
    Invalid(PathBuf, String),
}

impl ConfigOrigin {
    /// Log how the configuration was obtained.
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => log::info!("Loaded configuration from {:?}", path),
            ConfigOrigin::Missing(path) => log::info!("No config file found at {:?}, using defaults", path),
            ConfigOrigin::Invalid(path, e) => {
                log::warn!("Failed to parse config file {:?}: {}, using defaults", path, e)
            }
        }
    }
}

impl Config {
    /// Path from `$ARMOR_EXTRACTOR_CONFIG`, or the default path
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path)
    }

    /// Load configuration from `$ARMOR_EXTRACTOR_CONFIG`, or the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        let (config, origin) = Self::read_from_path(path);
        origin.log();
        config
    }

    /// Like [`Config::load`], but leaves logging of the outcome to the caller.
    pub fn read() -> (Self, ConfigOrigin) {
        Self::read_from_path(Self::config_path())
    }

    /// Read configuration from `path` without logging, falling back to defaults.
    pub fn read_from_path(path: PathBuf) -> (Self, ConfigOrigin) {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, ConfigOrigin::File(path)),
                Err(e) => (Self::default(), ConfigOrigin::Invalid(path, e.to_string())),
            },
            Err(_) => (Self::default(), ConfigOrigin::Missing(path)),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("armor-extractor")
            .join("config.toml")
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

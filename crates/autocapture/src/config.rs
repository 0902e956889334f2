//! Configuration management for autocapture.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. Field
//! names are snake_case; the camelCase names used by browser option objects
//! are accepted as aliases.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::host::SelectorList;
use crate::privacy::{ScrubMode, TextScrubber};
use crate::storage::PersistenceKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "autocapture";

/// Default `localStorage` database file name.
const LOCAL_STORAGE_FILE_NAME: &str = "local-storage.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "AUTOCAPTURE_";

/// Tag names eligible for capture by default.
pub const DEFAULT_ELEMENTS: &[&str] =
    &["a", "button", "form", "input", "select", "textarea", "label"];

/// Attributes recorded by default.
pub const DEFAULT_ATTRIBUTES: &[&str] = &[
    "text",
    "className",
    "value",
    "type",
    "tagName",
    "href",
    "src",
    "id",
    "name",
    "placeholder",
    "title",
    "alt",
    "role",
];

/// Capture categories enabled by default.
pub const DEFAULT_CAPTURE: &[&str] = &["tap", "form", "page-view"];

/// Default number of retained events.
pub const DEFAULT_MAX_EVENTS: usize = 100;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

/// Capture configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `AUTOCAPTURE_`, `__` separates sections)
/// 2. TOML config file at `~/.config/autocapture/config.toml`
/// 3. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tag names eligible for capture.
    pub elements: Vec<String>,
    /// Attributes recorded on the payload target.
    pub attributes: Vec<String>,
    /// Selectors whose matching elements are never captured.
    pub safelist: Vec<String>,
    /// Enabled capture categories (plugin keys and direct listener categories).
    pub capture: Vec<String>,
    /// Where captured events are stored.
    pub persistence: PersistenceKind,
    /// Fixed session id instead of the stored visitor id.
    #[serde(alias = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Static fields attached to every payload.
    pub payload: Map<String, Value>,
    /// Maximum number of retained events.
    #[serde(alias = "maxEvents")]
    pub max_events: usize,
    /// Replace recorded text and values with `*`.
    #[serde(alias = "maskTextContent")]
    pub mask_text_content: bool,
    /// Text scrubbing configuration.
    pub privacy: PrivacyConfig,
    /// Storage locations for the command-line host.
    pub storage: StorageConfig,
}

/// Privacy-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// What to do with sensitive matches.
    pub mode: ScrubMode,
    /// Use the built-in sensitive-data patterns.
    #[serde(alias = "builtinPatterns")]
    pub builtin_patterns: bool,
    /// Additional patterns (regex).
    pub patterns: Vec<String>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the `localStorage` database.
    /// Defaults to `~/.local/share/autocapture/local-storage.db`
    #[serde(alias = "localStoragePath", skip_serializing_if = "Option::is_none")]
    pub local_storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elements: strings(DEFAULT_ELEMENTS),
            attributes: strings(DEFAULT_ATTRIBUTES),
            safelist: Vec::new(),
            capture: strings(DEFAULT_CAPTURE),
            persistence: PersistenceKind::Memory,
            session_id: None,
            payload: Map::new(),
            max_events: DEFAULT_MAX_EVENTS,
            mask_text_content: false,
            privacy: PrivacyConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            mode: ScrubMode::Redact,
            builtin_patterns: true,
            patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a browser-style JSON options object over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result is invalid.
    pub fn from_json(options: &Value) -> Result<Self> {
        let config: Config = serde_json::from_value(options.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_events == 0 {
            return Err(Error::validation("max_events must be greater than 0"));
        }

        if self.elements.is_empty() {
            return Err(Error::validation("elements must name at least one tag"));
        }

        if let Some(key) = self.capture.iter().find(|k| k.trim().is_empty()) {
            return Err(Error::validation(format!("empty capture category: '{key}'")));
        }

        self.safelist_selectors()?;
        self.scrubber()?;
        Ok(())
    }

    /// Whether a capture category is enabled.
    #[must_use]
    pub fn is_capture_enabled(&self, key: &str) -> bool {
        self.capture.iter().any(|k| k == key)
    }

    /// Compile the safelist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] for the first invalid selector.
    pub fn safelist_selectors(&self) -> Result<SelectorList> {
        SelectorList::from_sources(&self.safelist)
    }

    /// Build the text scrubber described by the privacy section.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid custom pattern.
    pub fn scrubber(&self) -> Result<TextScrubber> {
        TextScrubber::with_patterns(
            self.privacy.mode,
            self.privacy.builtin_patterns,
            &self.privacy.patterns,
        )
    }

    /// Get the `localStorage` database path, resolving defaults if not set.
    #[must_use]
    pub fn local_storage_path(&self) -> PathBuf {
        self.storage
            .local_storage_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOCAL_STORAGE_FILE_NAME))
    }
}

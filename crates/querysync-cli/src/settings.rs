//! Layered settings for the binary.
//!
//! Sources, lowest precedence first: `querysync.toml` in the working
//! directory, `--config-file`, `QUERYSYNC__*` environment variables, and
//! finally command-line flags.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use querysync_cache::CacheConfig;
use querysync_core::StaticIdentity;
use querysync_http::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
use serde::Deserialize;

use crate::cli::Cli;

const DEFAULT_CONFIG_BASENAME: &str = "querysync";
const ENV_PREFIX: &str = "QUERYSYNC";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Settings of the binary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL every endpoint path is resolved against
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Page size sent when a feed sets none
    pub page_size: u32,
    /// Signed-in viewer, sent as `viewerId`
    pub viewer_id: Option<i64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            page_size: DEFAULT_PAGE_SIZE,
            viewer_id: None,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn identity(&self) -> StaticIdentity {
        self.viewer_id
            .map(StaticIdentity::new)
            .unwrap_or_else(StaticIdentity::anonymous)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Parses settings from a TOML document, without other sources.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = cli.api_url.as_ref() {
            self.api.base_url = url.clone();
        }
        if let Some(viewer) = cli.viewer_id {
            self.api.viewer_id = Some(viewer);
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = level.clone();
        }
        if cli.log_json {
            self.logging.json = true;
        }
    }
}

/// Loads settings from every source.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    settings.apply_cli(cli);
    Ok(settings)
}

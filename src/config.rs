use std::fmt;
use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

pub const CONFIG_FILE_NAME: &str = "city-weather.json";
pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";
pub const DEFAULT_KEY_FILE: &str = "assets/key.txt";
pub const DEFAULT_FAVORITES_FILE: &str = "favorites.txt";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub key_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub favorites_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub key_file: Utf8PathBuf,
    pub favorites_file: Utf8PathBuf,
    pub base_url: String,
    pub request_timeout: Option<Duration>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            key_file: Utf8PathBuf::from(DEFAULT_KEY_FILE),
            favorites_file: Utf8PathBuf::from(DEFAULT_FAVORITES_FILE),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist and parse. Without one, `city-weather.json`
    /// in the working directory is tried, then the user config directory, and
    /// finally built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, WeatherError> {
        let config_path = match path {
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Ok(ResolvedConfig::default());
        };

        tracing::debug!(path = %config_path, "loading config");
        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| WeatherError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ResolvedConfig, WeatherError> {
        let config: Config = serde_json::from_str(content)
            .map_err(|err| WeatherError::ConfigParse(err.to_string()))?;
        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = ResolvedConfig::default();
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            key_file: config.key_file.unwrap_or(defaults.key_file),
            favorites_file: config.favorites_file.unwrap_or(defaults.favorites_file),
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.as_std_path().exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir().join("city-weather").join(CONFIG_FILE_NAME),
                )
                .ok()
            })
            .filter(|path| path.as_std_path().exists())
    }
}

/// OpenWeatherMap API key. The value never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Reads the first line of `path`. A missing, unreadable or blank file
    /// is a credential error; the caller decides whether that is fatal.
    pub fn from_file(path: &Utf8Path) -> Result<Self, WeatherError> {
        let content =
            fs::read_to_string(path.as_std_path()).map_err(|err| WeatherError::Credential {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let key = content.lines().next().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(WeatherError::Credential {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

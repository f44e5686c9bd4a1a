use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum WeatherError {
    #[error("failed to read API key from {path}: {reason}")]
    #[diagnostic(help("put a single-line OpenWeatherMap key into the file or set key_file in the config"))]
    Credential { path: Utf8PathBuf, reason: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("weather request failed: {0}")]
    WeatherHttp(String),

    #[error("weather service returned status {status}: {message}")]
    WeatherStatus { status: u16, message: String },

    #[error("unexpected weather payload: {0}")]
    WeatherParse(String),

    #[error("geocoding request failed: {0}")]
    GeocodeHttp(String),

    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("a fetch round is already in flight ({finished}/{launched} finished)")]
    RoundInFlight { finished: usize, launched: usize },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

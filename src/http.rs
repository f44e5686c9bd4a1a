use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::WeatherError;

/// Blocking client shared by the weather and geocoding lookups. `None`
/// leaves requests without a deadline.
pub fn build_client(timeout: Option<Duration>) -> Result<Client, WeatherError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("city-weather/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| WeatherError::WeatherHttp(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| WeatherError::WeatherHttp(err.to_string()))
}

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{ApiKey, ResolvedConfig};
use crate::domain::Coordinates;
use crate::error::WeatherError;
use crate::http::build_client;

/// Resolves a free-text city name to coordinates.
pub trait Geocoder: Send + Sync {
    fn validate(&self, name: &str) -> Result<Coordinates, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: f64,
    lon: f64,
}

#[derive(Clone)]
pub struct OpenWeatherGeocoder {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenWeatherGeocoder {
    pub fn new(config: &ResolvedConfig, api_key: ApiKey) -> Result<Self, WeatherError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    pub fn lookup_url(base_url: &str) -> String {
        format!("{base_url}/geo/1.0/direct")
    }
}

impl Geocoder for OpenWeatherGeocoder {
    fn validate(&self, name: &str) -> Result<Coordinates, WeatherError> {
        let url = Self::lookup_url(&self.base_url);
        tracing::debug!(city = name, "geocoding request");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", name),
                ("limit", "1"),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .map_err(|err| WeatherError::GeocodeHttp(err.to_string()))?;
        if response.status() != StatusCode::OK {
            tracing::debug!(city = name, status = response.status().as_u16(), "geocoding rejected");
            return Err(WeatherError::CityNotFound(name.to_string()));
        }
        let body = response
            .text()
            .map_err(|err| WeatherError::GeocodeHttp(err.to_string()))?;
        parse_geocode_body(name, &body)
    }
}

/// First hit of a direct-geocoding response. An empty list, or a body that is
/// not a list of hits, means the name did not resolve.
pub fn parse_geocode_body(name: &str, body: &str) -> Result<Coordinates, WeatherError> {
    let hits: Vec<GeocodeHit> = serde_json::from_str(body)
        .map_err(|_| WeatherError::CityNotFound(name.to_string()))?;
    hits.first()
        .map(|hit| Coordinates::new(hit.lon, hit.lat))
        .ok_or_else(|| WeatherError::CityNotFound(name.to_string()))
}

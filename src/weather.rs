use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{ApiKey, ResolvedConfig};
use crate::domain::{Coordinates, Weather};
use crate::error::WeatherError;
use crate::http::build_client;

/// Current-conditions lookup keyed by coordinates. Implementations are called
/// from many fetch threads at once.
pub trait WeatherClient: Send + Sync {
    fn current(&self, coordinates: Coordinates) -> Result<Weather, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    weather: Vec<ConditionEntry>,
    main: MainBlock,
    wind: WindBlock,
    sys: SysBlock,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct SysBlock {
    sunrise: i64,
    sunset: i64,
}

impl TryFrom<CurrentResponse> for Weather {
    type Error = WeatherError;

    fn try_from(response: CurrentResponse) -> Result<Self, Self::Error> {
        let description = response
            .weather
            .into_iter()
            .next()
            .map(|entry| entry.description)
            .ok_or_else(|| WeatherError::WeatherParse("empty weather list".to_string()))?;
        Ok(Weather {
            description,
            temperature_kelvin: response.main.temp,
            humidity: response.main.humidity,
            wind_speed: response.wind.speed,
            sunrise: response.sys.sunrise,
            sunset: response.sys.sunset,
        })
    }
}

pub fn parse_weather_body(body: &str) -> Result<Weather, WeatherError> {
    let response: CurrentResponse =
        serde_json::from_str(body).map_err(|err| WeatherError::WeatherParse(err.to_string()))?;
    Weather::try_from(response)
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl OpenWeatherClient {
    pub fn new(config: &ResolvedConfig, api_key: ApiKey) -> Result<Self, WeatherError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    pub fn current_url(base_url: &str) -> String {
        format!("{base_url}/data/2.5/weather")
    }
}

impl WeatherClient for OpenWeatherClient {
    fn current(&self, coordinates: Coordinates) -> Result<Weather, WeatherError> {
        let url = Self::current_url(&self.base_url);
        let lat = coordinates.lat.to_string();
        let lon = coordinates.lon.to_string();
        tracing::debug!(%coordinates, "weather request");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .map_err(|err| WeatherError::WeatherHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "weather request failed".to_string());
            return Err(WeatherError::WeatherStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| WeatherError::WeatherHttp(err.to_string()))?;
        parse_weather_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PARIS: &str = r#"{
        "coord": {"lon": 2.3522, "lat": 48.8566},
        "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
        "main": {"temp": 291.15, "feels_like": 290.5, "pressure": 1015, "humidity": 62},
        "wind": {"speed": 3.6, "deg": 240},
        "sys": {"country": "FR", "sunrise": 1700030000, "sunset": 1700063000},
        "name": "Paris",
        "cod": 200
    }"#;

    #[test]
    fn decodes_current_conditions() {
        let weather = parse_weather_body(PARIS).unwrap();
        assert_eq!(weather.description, "clear sky");
        assert_eq!(weather.humidity, 62);
        assert_eq!(weather.sunset, 1_700_063_000);
        assert!((weather.temperature_celsius() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn missing_block_is_parse_error() {
        let err = parse_weather_body(r#"{"weather": [], "main": {"temp": 1.0}}"#).unwrap_err();
        assert_matches!(err, WeatherError::WeatherParse(_));
    }

    #[test]
    fn empty_condition_list_is_parse_error() {
        let body = r#"{"weather": [], "main": {"temp": 280.0, "humidity": 10},
            "wind": {"speed": 1.0}, "sys": {"sunrise": 1, "sunset": 2}}"#;
        let err = parse_weather_body(body).unwrap_err();
        assert_matches!(err, WeatherError::WeatherParse(msg) if msg == "empty weather list");
    }
}

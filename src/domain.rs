use std::fmt;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinates {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lat={:.4} lon={:.4}", self.lat, self.lon)
    }
}

/// Current conditions for one city, decoded from the weather service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub description: String,
    pub temperature_kelvin: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub sunrise: i64,
    pub sunset: i64,
}

impl Weather {
    pub fn temperature_celsius(&self) -> f64 {
        kelvin_to_celsius(self.temperature_kelvin)
    }

    pub fn sunrise_local(&self) -> String {
        unix_to_hhmm(self.sunrise)
    }

    pub fn sunset_local(&self) -> String {
        unix_to_hhmm(self.sunset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct City {
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(skip)]
    pub selected: bool,
    pub weather: Option<Weather>,
}

impl City {
    pub fn new(name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            name: name.into(),
            coordinates: Coordinates::new(lon, lat),
            selected: false,
            weather: None,
        }
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn unix_to_hhmm(secs: i64) -> String {
    format_hhmm(secs, &Local)
}

pub fn format_hhmm<Tz>(secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match tz.timestamp_opt(secs, 0).single() {
        Some(time) => time.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

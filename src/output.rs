use std::io::{self, Write};

use serde::Serialize;

use crate::app::FetchReport;
use crate::domain::Coordinates;
use crate::favorites::Favorites;

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResult {
    pub name: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoritesResult {
    pub changed: usize,
    pub favorites: Vec<String>,
}

impl FavoritesResult {
    pub fn new(changed: usize, favorites: &Favorites) -> Self {
        Self {
            changed,
            favorites: favorites.iter().cloned().collect(),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_favorites(result: &FavoritesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_validate(result: &ValidateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, event: crate::app::ProgressEvent) {
        tracing::debug!(message = %event.message, "progress");
    }
}

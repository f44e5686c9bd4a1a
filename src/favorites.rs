use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::WeatherError;
use crate::geocode::Geocoder;
use crate::registry::CityRegistry;

/// Bookmarked city names. Sorted, so the file is written in the same order
/// every time.
pub type Favorites = BTreeSet<String>;

/// Flat-file persistence for [`Favorites`]: one name per line, rewritten in
/// full after every change.
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    path: Utf8PathBuf,
}

impl FavoritesStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the file and re-validates every line. Names that validate are
    /// returned and added to `registry` when missing; the rest are dropped.
    /// A missing or unreadable file yields an empty set.
    pub fn load<G>(&self, registry: &mut CityRegistry, geocoder: &G) -> Favorites
    where
        G: Geocoder + ?Sized,
    {
        let mut favorites = Favorites::new();
        let content = match fs::read_to_string(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return favorites,
            Err(err) => {
                tracing::warn!(path = %self.path, error = %err, "favorites file unreadable");
                return favorites;
            }
        };

        for line in content.lines() {
            let name = line.trim_end_matches('\r');
            if name.is_empty() || favorites.contains(name) {
                continue;
            }
            match geocoder.validate(name) {
                Ok(coordinates) => {
                    registry.append_if_absent(name, coordinates);
                    favorites.insert(name.to_string());
                }
                Err(err) => {
                    tracing::warn!(city = name, error = %err, "dropping favorite that no longer validates");
                }
            }
        }
        tracing::info!(count = favorites.len(), path = %self.path, "favorites loaded");
        favorites
    }

    /// Replaces the file contents with `favorites`. The new contents are
    /// written to a sibling temp file first and renamed into place.
    pub fn save(&self, favorites: &Favorites) -> Result<(), WeatherError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| WeatherError::Filesystem(format!("{}: {err}", self.path)))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".favorites")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| WeatherError::Filesystem(format!("{}: {err}", self.path)))?;
        for name in favorites {
            writeln!(temp, "{name}")
                .map_err(|err| WeatherError::Filesystem(format!("{}: {err}", self.path)))?;
        }
        temp.flush()
            .map_err(|err| WeatherError::Filesystem(format!("{}: {err}", self.path)))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| WeatherError::Filesystem(format!("{}: {}", self.path, err.error)))?;
        Ok(())
    }

    /// Inserts every selected city and saves. Returns how many were new.
    pub fn add(
        &self,
        registry: &CityRegistry,
        favorites: &mut Favorites,
    ) -> Result<usize, WeatherError> {
        let mut added = 0;
        for city in registry.selected() {
            if favorites.insert(city.name.clone()) {
                added += 1;
            }
        }
        self.save(favorites)?;
        Ok(added)
    }

    /// Removes every selected city and saves. Names that were not favorites
    /// are ignored. Returns how many were removed.
    pub fn remove(
        &self,
        registry: &CityRegistry,
        favorites: &mut Favorites,
    ) -> Result<usize, WeatherError> {
        let mut removed = 0;
        for city in registry.selected() {
            if favorites.remove(&city.name) {
                removed += 1;
            }
        }
        self.save(favorites)?;
        Ok(removed)
    }
}

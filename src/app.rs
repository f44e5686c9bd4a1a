use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::{City, Weather};
use crate::error::WeatherError;
use crate::favorites::{Favorites, FavoritesStore};
use crate::fetch::{Orchestrator, RoundState, RoundSummary, SharedRegistry, lock_registry};
use crate::geocode::Geocoder;
use crate::registry::CityRegistry;
use crate::weather::WeatherClient;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct CityWeather {
    pub city: String,
    pub weather: Weather,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub summary: RoundSummary,
    pub results: Vec<CityWeather>,
}

/// One interactive session: the city list, the favorites set and the fetch
/// round currently in flight. Every user action goes through here.
pub struct App<G: Geocoder, W: WeatherClient + 'static> {
    registry: SharedRegistry,
    favorites: Favorites,
    store: FavoritesStore,
    geocoder: G,
    weather: Arc<W>,
    orchestrator: Orchestrator,
    favorites_only: bool,
    round_started: Option<Instant>,
}

impl<G: Geocoder, W: WeatherClient + 'static> App<G, W> {
    pub fn new(registry: CityRegistry, store: FavoritesStore, geocoder: G, weather: W) -> Self {
        Self {
            registry: Arc::new(Mutex::new(registry)),
            favorites: Favorites::new(),
            store,
            geocoder,
            weather: Arc::new(weather),
            orchestrator: Orchestrator::new(),
            favorites_only: false,
            round_started: None,
        }
    }

    /// Replaces the in-memory favorites with the validated contents of the
    /// favorites file.
    pub fn load_favorites(&mut self) -> usize {
        let mut registry = lock_registry(&self.registry);
        self.favorites = self.store.load(&mut registry, &self.geocoder);
        self.favorites.len()
    }

    pub fn registry(&self) -> MutexGuard<'_, CityRegistry> {
        lock_registry(&self.registry)
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn store(&self) -> &FavoritesStore {
        &self.store
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.contains(name)
    }

    pub fn favorites_only(&self) -> bool {
        self.favorites_only
    }

    /// Snapshot of the cities the list should show, in registry order.
    pub fn visible_cities(&self) -> Vec<City> {
        let registry = lock_registry(&self.registry);
        if self.favorites_only {
            let favorites = &self.favorites;
            registry
                .filter_by(|city: &City| favorites.contains(&city.name))
                .cloned()
                .collect()
        } else {
            registry.iter().cloned().collect()
        }
    }

    /// Cities holding weather from the last finished lookup, in registry order.
    pub fn fetched(&self) -> Vec<CityWeather> {
        lock_registry(&self.registry)
            .iter()
            .filter_map(|city| {
                city.weather.as_ref().map(|weather| CityWeather {
                    city: city.name.clone(),
                    weather: weather.clone(),
                })
            })
            .collect()
    }

    pub fn toggle_selected(&self, name: &str) -> bool {
        lock_registry(&self.registry).toggle_selected(name)
    }

    pub fn mark(&self, name: &str) -> bool {
        lock_registry(&self.registry).mark_selected(name.trim())
    }

    /// Checks every name, adding unknown ones through the geocoder first.
    /// Names that fail validation are skipped. Returns how many were checked.
    pub fn select_names<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut selected = 0;
        for name in names {
            let name = name.as_ref();
            if self.mark(name) {
                selected += 1;
                continue;
            }
            match self.add_city(name) {
                Ok(_) => {
                    if self.mark(name) {
                        selected += 1;
                    }
                }
                Err(err) => tracing::warn!(city = %name, error = %err, "skipping city"),
            }
        }
        selected
    }

    pub fn clear_selections(&self) {
        lock_registry(&self.registry).clear_all_selections();
    }

    pub fn round_state(&self) -> RoundState {
        self.orchestrator.state()
    }

    pub fn fetch(&mut self, sink: &dyn ProgressSink) -> Result<usize, WeatherError> {
        // A finished round nobody polled still gets reported.
        if let Some(summary) = self.orchestrator.poll() {
            self.report_round(&summary, sink);
        }
        let launched = self
            .orchestrator
            .start(&self.registry, Arc::clone(&self.weather))?;
        self.round_started = Some(Instant::now());
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {launched} lookups started"),
            elapsed: None,
        });
        Ok(launched)
    }

    pub fn poll_round(&mut self, sink: &dyn ProgressSink) -> Option<RoundSummary> {
        let summary = self.orchestrator.poll()?;
        self.report_round(&summary, sink);
        Some(summary)
    }

    pub fn wait_round(&mut self, sink: &dyn ProgressSink) -> Option<RoundSummary> {
        let summary = self.orchestrator.wait()?;
        self.report_round(&summary, sink);
        Some(summary)
    }

    /// Runs a full round over the selected cities and returns what it produced.
    pub fn fetch_blocking(&mut self, sink: &dyn ProgressSink) -> Result<FetchReport, WeatherError> {
        self.fetch(sink)?;
        let summary = self.wait_round(sink).unwrap_or_default();
        Ok(FetchReport {
            summary,
            results: self.fetched(),
        })
    }

    pub fn add_favorites(&mut self) -> Result<usize, WeatherError> {
        let mut registry = lock_registry(&self.registry);
        let result = self.store.add(&registry, &mut self.favorites);
        registry.clear_all_selections();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "favorites were not saved");
        }
        result
    }

    pub fn remove_favorites(&mut self) -> Result<usize, WeatherError> {
        let mut registry = lock_registry(&self.registry);
        let result = self.store.remove(&registry, &mut self.favorites);
        registry.clear_all_selections();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "favorites were not saved");
        }
        result
    }

    pub fn toggle_favorites_only(&mut self) -> bool {
        self.favorites_only = !self.favorites_only;
        self.clear_selections();
        self.favorites_only
    }

    /// Validates `name` with the geocoder and appends it to the registry.
    /// Returns false when the city was already listed.
    pub fn add_city(&mut self, name: &str) -> Result<bool, WeatherError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WeatherError::CityNotFound(name.to_string()));
        }
        if lock_registry(&self.registry).contains(name) {
            return Ok(false);
        }
        let coordinates = self.geocoder.validate(name)?;
        let added = lock_registry(&self.registry).append_if_absent(name, coordinates);
        if added {
            tracing::info!(city = name, %coordinates, "city added");
        }
        Ok(added)
    }

    fn report_round(&mut self, summary: &RoundSummary, sink: &dyn ProgressSink) {
        let elapsed = self.round_started.take().map(|start| start.elapsed());
        for failure in &summary.failed {
            sink.event(ProgressEvent {
                message: format!("fetch failed for {}: {}", failure.city, failure.reason),
                elapsed,
            });
        }
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {}/{} cities updated",
                summary.succeeded.len(),
                summary.launched
            ),
            elapsed,
        });
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::domain::Coordinates;
use crate::error::WeatherError;
use crate::registry::CityRegistry;
use crate::weather::WeatherClient;

pub type SharedRegistry = Arc<Mutex<CityRegistry>>;

/// Locks the registry, recovering the data if a fetch thread panicked while
/// holding the lock.
pub fn lock_registry(registry: &Mutex<CityRegistry>) -> MutexGuard<'_, CityRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub city: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundSummary {
    pub launched: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    InFlight { finished: usize, launched: usize },
}

type TaskOutcome = Result<String, FetchFailure>;

// Bumps the completion counter when the task exits, including by panic.
struct CompletionGuard(Arc<AtomicUsize>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// One batch of weather lookups, one thread per city that was selected when
/// the round started.
pub struct FetchRound {
    handles: Vec<(String, JoinHandle<TaskOutcome>)>,
    finished: Arc<AtomicUsize>,
    spawn_failures: Vec<FetchFailure>,
}

impl FetchRound {
    /// Clears all previous weather, starts a lookup for every selected city
    /// and then clears the selections.
    pub fn launch<C>(registry: &SharedRegistry, client: Arc<C>) -> Self
    where
        C: WeatherClient + ?Sized + 'static,
    {
        let targets: Vec<(String, Coordinates)> = {
            let mut guard = lock_registry(registry);
            guard.clear_weather();
            guard
                .selected()
                .map(|city| (city.name.clone(), city.coordinates))
                .collect()
        };

        let finished = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(targets.len());
        let mut spawn_failures = Vec::new();
        for (index, (name, coordinates)) in targets.into_iter().enumerate() {
            let registry = Arc::clone(registry);
            let client = Arc::clone(&client);
            let counter = Arc::clone(&finished);
            let city = name.clone();
            let spawned = thread::Builder::new()
                .name(format!("fetch-{index}"))
                .spawn(move || {
                    let _done = CompletionGuard(counter);
                    fetch_one(&registry, client.as_ref(), city, coordinates)
                });
            match spawned {
                Ok(handle) => handles.push((name, handle)),
                Err(err) => {
                    tracing::warn!(city = %name, error = %err, "could not start fetch thread");
                    spawn_failures.push(FetchFailure {
                        city: name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        lock_registry(registry).clear_all_selections();
        tracing::info!(launched = handles.len(), "fetch round started");

        Self {
            handles,
            finished,
            spawn_failures,
        }
    }

    pub fn launched(&self) -> usize {
        self.handles.len()
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished() >= self.launched()
    }

    /// Joins every task. Blocks until the slowest lookup returns.
    pub fn join(self) -> RoundSummary {
        let mut summary = RoundSummary {
            launched: self.handles.len(),
            succeeded: Vec::new(),
            failed: self.spawn_failures,
        };
        for (city, handle) in self.handles {
            match handle.join() {
                Ok(Ok(city)) => summary.succeeded.push(city),
                Ok(Err(failure)) => summary.failed.push(failure),
                Err(_) => summary.failed.push(FetchFailure {
                    city,
                    reason: "fetch thread panicked".to_string(),
                }),
            }
        }
        tracing::info!(
            launched = summary.launched,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "fetch round finished"
        );
        summary
    }
}

fn fetch_one<C>(
    registry: &Mutex<CityRegistry>,
    client: &C,
    city: String,
    coordinates: Coordinates,
) -> TaskOutcome
where
    C: WeatherClient + ?Sized,
{
    match client.current(coordinates) {
        Ok(weather) => {
            lock_registry(registry).set_weather(&city, weather);
            Ok(city)
        }
        Err(err) => {
            tracing::warn!(city = %city, error = %err, "weather fetch failed");
            Err(FetchFailure {
                city,
                reason: err.to_string(),
            })
        }
    }
}

/// Tracks at most one round at a time.
#[derive(Default)]
pub struct Orchestrator {
    round: Option<FetchRound>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RoundState {
        match &self.round {
            Some(round) => RoundState::InFlight {
                finished: round.finished(),
                launched: round.launched(),
            },
            None => RoundState::Idle,
        }
    }

    /// Starts a round over the currently selected cities and returns how many
    /// lookups were launched. Refused while an earlier round is still running.
    pub fn start<C>(
        &mut self,
        registry: &SharedRegistry,
        client: Arc<C>,
    ) -> Result<usize, WeatherError>
    where
        C: WeatherClient + ?Sized + 'static,
    {
        if let Some(round) = &self.round {
            if !round.is_finished() {
                return Err(WeatherError::RoundInFlight {
                    finished: round.finished(),
                    launched: round.launched(),
                });
            }
        }
        if let Some(stale) = self.round.take() {
            let summary = stale.join();
            for failure in &summary.failed {
                tracing::warn!(
                    city = %failure.city,
                    reason = %failure.reason,
                    "unreported failure from previous round"
                );
            }
        }

        let round = FetchRound::launch(registry, client);
        let launched = round.launched();
        self.round = Some(round);
        Ok(launched)
    }

    /// Non-blocking. Once every task of the current round has finished, joins
    /// them, returns to idle and hands back the summary.
    pub fn poll(&mut self) -> Option<RoundSummary> {
        if !self.round.as_ref().is_some_and(FetchRound::is_finished) {
            return None;
        }
        self.round.take().map(FetchRound::join)
    }

    /// Blocks until the current round finishes.
    pub fn wait(&mut self) -> Option<RoundSummary> {
        self.round.take().map(FetchRound::join)
    }
}

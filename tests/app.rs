use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use city_weather::app::{App, ProgressEvent, ProgressSink};
use city_weather::domain::{Coordinates, Weather};
use city_weather::error::WeatherError;
use city_weather::favorites::FavoritesStore;
use city_weather::fetch::RoundState;
use city_weather::geocode::Geocoder;
use city_weather::registry::CityRegistry;
use city_weather::weather::WeatherClient;

#[derive(Default)]
struct MockGeocoder {
    calls: Mutex<Vec<String>>,
}

impl Geocoder for MockGeocoder {
    fn validate(&self, name: &str) -> Result<Coordinates, WeatherError> {
        self.calls.lock().unwrap().push(name.to_string());
        match name {
            "Lyon" => Ok(Coordinates::new(4.8357, 45.764)),
            "Paris" | "Tokyo" => Ok(Coordinates::new(0.0, 0.0)),
            _ => Err(WeatherError::CityNotFound(name.to_string())),
        }
    }
}

struct MockWeather;

impl WeatherClient for MockWeather {
    fn current(&self, coordinates: Coordinates) -> Result<Weather, WeatherError> {
        if coordinates.lat < 0.0 {
            return Err(WeatherError::WeatherHttp("connection reset".to_string()));
        }
        Ok(Weather {
            description: "few clouds".to_string(),
            temperature_kelvin: 295.65,
            humidity: 55,
            wind_speed: 5.5,
            sunrise: 1_700_000_000,
            sunset: 1_700_040_000,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn new_app(dir: &tempfile::TempDir) -> App<MockGeocoder, MockWeather> {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("favorites.txt")).unwrap();
    App::new(
        CityRegistry::seeded(),
        FavoritesStore::new(path),
        MockGeocoder::default(),
        MockWeather,
    )
}

#[test]
fn add_city_validates_and_appends_once() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);

    assert!(app.add_city("Lyon").unwrap());
    assert!(!app.add_city(" Lyon ").unwrap());

    let registry = app.registry();
    assert_eq!(registry.iter().filter(|city| city.name == "Lyon").count(), 1);
    assert_eq!(
        registry.get("Lyon").unwrap().coordinates,
        Coordinates::new(4.8357, 45.764)
    );
}

#[test]
fn add_city_rejects_unknown_name() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    let before = app.registry().len();

    let err = app.add_city("Atlantis").unwrap_err();

    assert_matches!(err, WeatherError::CityNotFound(name) if name == "Atlantis");
    assert_eq!(app.registry().len(), before);
}

#[test]
fn favorites_actions_clear_selections_and_persist() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);

    assert!(app.mark("Paris"));
    assert_eq!(app.add_favorites().unwrap(), 1);
    assert!(app.is_favorite("Paris"));
    assert_eq!(app.registry().selected().count(), 0);
    let path = app.store().path().to_path_buf();
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "Paris\n");

    assert!(app.mark("Paris"));
    assert_eq!(app.remove_favorites().unwrap(), 1);
    assert!(app.favorites().is_empty());
    assert_eq!(app.registry().selected().count(), 0);
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "");
}

#[test]
fn favorites_only_view_filters_without_reordering() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    app.mark("Tokyo");
    app.mark("Madrid");
    app.add_favorites().unwrap();

    app.toggle_selected("Berlin");
    assert!(app.toggle_favorites_only());
    assert_eq!(app.registry().selected().count(), 0);

    let names: Vec<String> = app.visible_cities().into_iter().map(|city| city.name).collect();
    assert_eq!(names, vec!["Madrid".to_string(), "Tokyo".to_string()]);

    assert!(!app.toggle_favorites_only());
    assert_eq!(app.visible_cities().len(), 11);
}

#[test]
fn load_favorites_revalidates_file() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("favorites.txt"), "Lyon\nAtlantis\nParis\n").unwrap();
    let mut app = new_app(&temp);

    assert_eq!(app.load_favorites(), 2);

    assert!(app.is_favorite("Lyon"));
    assert!(!app.is_favorite("Atlantis"));
    assert!(app.registry().contains("Lyon"));
    assert_eq!(
        app.registry().get("Paris").unwrap().coordinates,
        Coordinates::new(2.3522, 48.8566)
    );
}

#[test]
fn fetch_blocking_reports_successes_and_failures() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    app.mark("London");
    app.mark("Sydney");
    let sink = RecordingSink::default();

    let report = app.fetch_blocking(&sink).unwrap();

    assert_eq!(report.summary.launched, 2);
    assert_eq!(report.summary.succeeded, vec!["London".to_string()]);
    assert_eq!(report.summary.failed.len(), 1);
    assert_eq!(report.summary.failed[0].city, "Sydney");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].city, "London");
    assert!((report.results[0].weather.temperature_celsius() - 22.5).abs() < 1e-9);
    assert_eq!(app.round_state(), RoundState::Idle);

    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("fetch failed for Sydney")));
    assert!(messages.iter().any(|m| m.ends_with("1/2 cities updated")));
}

#[test]
fn poll_round_reaches_idle() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    app.mark("Tokyo");
    let sink = RecordingSink::default();

    assert_eq!(app.fetch(&sink).unwrap(), 1);
    let summary = loop {
        if let Some(summary) = app.poll_round(&sink) {
            break summary;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    };

    assert_eq!(summary.succeeded, vec!["Tokyo".to_string()]);
    assert_eq!(app.fetched().len(), 1);
}

#[test]
fn select_names_skips_invalid_and_keeps_the_rest() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    let names = ["Atlantis", "Paris", "Lyon", ""].map(String::from);

    assert_eq!(app.select_names(&names), 2);

    let selected: Vec<String> = app.registry().selected().map(|city| city.name.clone()).collect();
    assert_eq!(selected, vec!["Paris".to_string(), "Lyon".to_string()]);
    assert!(!app.registry().contains("Atlantis"));

    assert_eq!(app.add_favorites().unwrap(), 2);
    assert!(app.is_favorite("Paris"));
    assert!(app.is_favorite("Lyon"));
}

#[test]
fn unpolled_round_is_reported_before_the_next_one() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = new_app(&temp);
    let sink = RecordingSink::default();
    app.mark("Sydney");
    app.fetch(&sink).unwrap();
    while app.round_state() != (RoundState::InFlight { finished: 1, launched: 1 }) {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    app.mark("London");
    assert_eq!(app.fetch(&sink).unwrap(), 1);
    app.wait_round(&sink);

    let messages = sink.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.starts_with("fetch failed for Sydney")));
    assert!(messages.iter().any(|m| m.ends_with("0/1 cities updated")));
    assert!(messages.iter().any(|m| m.ends_with("1/1 cities updated")));
}

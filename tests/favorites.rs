use std::collections::HashSet;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use city_weather::domain::Coordinates;
use city_weather::error::WeatherError;
use city_weather::favorites::{Favorites, FavoritesStore};
use city_weather::geocode::Geocoder;
use city_weather::registry::CityRegistry;

#[derive(Default)]
struct AcceptAll {
    calls: Mutex<usize>,
}

impl Geocoder for AcceptAll {
    fn validate(&self, _name: &str) -> Result<Coordinates, WeatherError> {
        let mut guard = self.calls.lock().unwrap();
        *guard += 1;
        Ok(Coordinates::new(1.0, 2.0))
    }
}

struct RejectSome {
    rejected: HashSet<&'static str>,
}

impl Geocoder for RejectSome {
    fn validate(&self, name: &str) -> Result<Coordinates, WeatherError> {
        if self.rejected.contains(name) {
            return Err(WeatherError::CityNotFound(name.to_string()));
        }
        Ok(Coordinates::new(3.0, 4.0))
    }
}

fn temp_store() -> (tempfile::TempDir, Utf8PathBuf, FavoritesStore) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("favorites.txt")).unwrap();
    let store = FavoritesStore::new(path.clone());
    (temp, path, store)
}

fn names(items: &[&str]) -> Favorites {
    items.iter().map(|name| name.to_string()).collect()
}

#[test]
fn save_then_load_round_trips() {
    let (_temp, _path, store) = temp_store();
    let favorites = names(&["Tokyo", "Paris", "Reykjavik"]);
    store.save(&favorites).unwrap();

    let mut registry = CityRegistry::seeded();
    let loaded = store.load(&mut registry, &AcceptAll::default());

    assert_eq!(loaded, favorites);
}

#[test]
fn load_appends_unknown_cities_once() {
    let (_temp, _path, store) = temp_store();
    store.save(&names(&["Reykjavik", "Paris"])).unwrap();
    let mut registry = CityRegistry::seeded();
    let before = registry.len();

    store.load(&mut registry, &AcceptAll::default());
    store.load(&mut registry, &AcceptAll::default());

    assert_eq!(registry.len(), before + 1);
    let reykjavik = registry.get("Reykjavik").unwrap();
    assert_eq!(reykjavik.coordinates, Coordinates::new(1.0, 2.0));
    assert_eq!(
        registry.get("Paris").unwrap().coordinates,
        Coordinates::new(2.3522, 48.8566)
    );
}

#[test]
fn load_drops_lines_that_fail_validation() {
    let (_temp, path, store) = temp_store();
    fs::write(path.as_std_path(), "Paris\nAtlantis\n\nTokyo\r\nParis\n").unwrap();
    let geocoder = RejectSome {
        rejected: ["Atlantis"].into_iter().collect(),
    };
    let mut registry = CityRegistry::seeded();

    let loaded = store.load(&mut registry, &geocoder);

    assert_eq!(loaded, names(&["Paris", "Tokyo"]));
    assert!(!registry.contains("Atlantis"));
}

#[test]
fn load_validates_each_distinct_line() {
    let (_temp, path, store) = temp_store();
    fs::write(path.as_std_path(), "Paris\nParis\nTokyo\n").unwrap();
    let geocoder = AcceptAll::default();

    store.load(&mut CityRegistry::seeded(), &geocoder);

    assert_eq!(*geocoder.calls.lock().unwrap(), 2);
}

#[test]
fn missing_file_loads_empty() {
    let (_temp, _path, store) = temp_store();
    let loaded = store.load(&mut CityRegistry::seeded(), &AcceptAll::default());
    assert!(loaded.is_empty());
}

#[test]
fn non_utf8_file_loads_empty() {
    let (_temp, path, store) = temp_store();
    fs::write(path.as_std_path(), [0xff, 0xfe, 0x00, b'\n']).unwrap();
    let loaded = store.load(&mut CityRegistry::seeded(), &AcceptAll::default());
    assert!(loaded.is_empty());
}

#[test]
fn add_selected_city_writes_single_line() {
    let (_temp, path, store) = temp_store();
    let mut registry = CityRegistry::new();
    registry.append_if_absent("Paris", Coordinates::new(2.3522, 48.8566));
    assert!(registry.mark_selected("Paris"));
    let mut favorites = Favorites::new();

    let added = store.add(&registry, &mut favorites).unwrap();

    assert_eq!(added, 1);
    assert!(favorites.contains("Paris"));
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "Paris\n");
}

#[test]
fn add_skips_existing_favorites() {
    let (_temp, path, store) = temp_store();
    let mut registry = CityRegistry::seeded();
    registry.mark_selected("Paris");
    registry.mark_selected("Berlin");
    let mut favorites = names(&["Paris"]);

    let added = store.add(&registry, &mut favorites).unwrap();

    assert_eq!(added, 1);
    assert_eq!(
        fs::read_to_string(path.as_std_path()).unwrap(),
        "Berlin\nParis\n"
    );
}

#[test]
fn remove_non_member_rewrites_identical_file() {
    let (_temp, path, store) = temp_store();
    let mut favorites = names(&["London", "Tokyo"]);
    store.save(&favorites).unwrap();
    let before = fs::read_to_string(path.as_std_path()).unwrap();
    fs::remove_file(path.as_std_path()).unwrap();

    let mut registry = CityRegistry::seeded();
    registry.mark_selected("Madrid");
    let removed = store.remove(&registry, &mut favorites).unwrap();

    assert_eq!(removed, 0);
    assert_eq!(favorites, names(&["London", "Tokyo"]));
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), before);
}

#[test]
fn remove_selected_member() {
    let (_temp, path, store) = temp_store();
    let mut favorites = names(&["London", "Tokyo"]);
    let mut registry = CityRegistry::seeded();
    registry.mark_selected("London");

    let removed = store.remove(&registry, &mut favorites).unwrap();

    assert_eq!(removed, 1);
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "Tokyo\n");
}

#[test]
fn save_into_unwritable_location_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();
    let path = Utf8PathBuf::from_path_buf(blocker.join("favorites.txt")).unwrap();
    let store = FavoritesStore::new(path);

    let err = store.save(&names(&["Paris"])).unwrap_err();

    assert_matches!(err, WeatherError::Filesystem(_));
}

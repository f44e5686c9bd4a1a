use crate::domain::{City, Coordinates, Weather};

const SEED_CITIES: &[(&str, f64, f64)] = &[
    ("New York", -74.0060, 40.7128),
    ("Los Angeles", -118.2437, 34.0522),
    ("Tel Aviv", 34.7818, 32.0853),
    ("Madrid", -3.7038, 40.4168),
    ("Moscow", 37.6173, 55.7558),
    ("London", -0.1276, 51.5074),
    ("Paris", 2.3522, 48.8566),
    ("Berlin", 13.4050, 52.5200),
    ("Tokyo", 139.6917, 35.6895),
    ("Sydney", 151.2093, -33.8688),
    ("Bangkok", 100.5018, 13.7563),
];

/// Ordered list of known cities. Entries are only ever appended, so
/// iteration order is stable for the whole session.
#[derive(Debug, Clone, Default)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded() -> Self {
        Self {
            cities: SEED_CITIES
                .iter()
                .map(|(name, lon, lat)| City::new(*name, *lon, *lat))
                .collect(),
        }
    }

    pub fn from_cities(cities: Vec<City>) -> Self {
        Self { cities }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> + Clone {
        self.cities.iter()
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|city| city.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Selects the first entry named exactly `name`. Returns false when no
    /// such entry exists.
    pub fn mark_selected(&mut self, name: &str) -> bool {
        match self.cities.iter_mut().find(|city| city.name == name) {
            Some(city) => {
                city.selected = true;
                true
            }
            None => false,
        }
    }

    pub fn toggle_selected(&mut self, name: &str) -> bool {
        match self.cities.iter_mut().find(|city| city.name == name) {
            Some(city) => {
                city.selected = !city.selected;
                true
            }
            None => false,
        }
    }

    pub fn clear_all_selections(&mut self) {
        for city in &mut self.cities {
            city.selected = false;
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &City> + Clone {
        self.filter_by(|city: &City| city.selected)
    }

    /// Lazy view over the entries matching `predicate`, in registry order.
    /// The returned iterator is `Clone`, so a caller can walk it more than once.
    pub fn filter_by<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a City> + Clone + 'a
    where
        P: Fn(&City) -> bool + Clone + 'a,
    {
        self.cities.iter().filter(move |city| predicate(*city))
    }

    /// Appends a new unselected entry without weather unless one with the
    /// same name is already present. Returns whether an entry was added.
    pub fn append_if_absent(&mut self, name: &str, coordinates: Coordinates) -> bool {
        if self.contains(name) {
            return false;
        }
        self.cities
            .push(City::new(name, coordinates.lon, coordinates.lat));
        true
    }

    pub fn clear_weather(&mut self) {
        for city in &mut self.cities {
            city.weather = None;
        }
    }

    pub fn set_weather(&mut self, name: &str, weather: Weather) -> bool {
        match self.cities.iter_mut().find(|city| city.name == name) {
            Some(city) => {
                city.weather = Some(weather);
                true
            }
            None => false,
        }
    }
}

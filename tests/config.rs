use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use city_weather::config::{ApiKey, Config, ConfigLoader, DEFAULT_FAVORITES_FILE};
use city_weather::error::WeatherError;

#[test]
fn parse_full_config() {
    let resolved = ConfigLoader::parse(
        r#"{
            "schema_version": 1,
            "key_file": "/etc/city-weather/key",
            "favorites_file": "data/favs.txt",
            "base_url": "http://localhost:8080/",
            "request_timeout_secs": 15
        }"#,
    )
    .unwrap();

    assert_eq!(resolved.key_file, Utf8PathBuf::from("/etc/city-weather/key"));
    assert_eq!(resolved.favorites_file, Utf8PathBuf::from("data/favs.txt"));
    assert_eq!(resolved.base_url, "http://localhost:8080");
    assert_eq!(resolved.request_timeout, Some(Duration::from_secs(15)));
}

#[test]
fn resolve_defaults() {
    let resolved = ConfigLoader::resolve_config(Config::default());
    assert_eq!(resolved.favorites_file, Utf8PathBuf::from(DEFAULT_FAVORITES_FILE));
    assert!(resolved.request_timeout.is_none());
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("nope.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, WeatherError::ConfigRead(_));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let err = ConfigLoader::parse("{ not json").unwrap_err();
    assert_matches!(err, WeatherError::ConfigParse(_));
}

#[test]
fn api_key_reads_first_line() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("key.txt")).unwrap();
    fs::write(path.as_std_path(), "  abc123  \nsecond line\n").unwrap();

    let key = ApiKey::from_file(&path).unwrap();

    assert_eq!(key.as_str(), "abc123");
}

#[test]
fn missing_api_key_is_a_credential_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("missing.txt")).unwrap();

    let err = ApiKey::from_file(&path).unwrap_err();

    assert_matches!(err, WeatherError::Credential { path: p, .. } if p == path);
}

#[test]
fn blank_api_key_is_a_credential_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("key.txt")).unwrap();
    fs::write(path.as_std_path(), "\n").unwrap();

    let err = ApiKey::from_file(&path).unwrap_err();

    assert_matches!(err, WeatherError::Credential { reason, .. } if reason == "file is empty");
}

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod favorites;
pub mod fetch;
pub mod geocode;
pub mod http;
pub mod output;
pub mod registry;
pub mod tui;
pub mod weather;

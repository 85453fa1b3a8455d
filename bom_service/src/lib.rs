//! BOM weather service.
//!
//! Reads current observations and précis forecasts published by the
//! Australian Bureau of Meteorology and exposes them as sensors and a
//! weather entity for a host home-automation platform.
//!
//! - `stations` — station ID validation and nearest-station lookup
//! - `ingest` — observations (HTTP/JSON) and forecast (FTP/XML) fetchers
//! - `conditions` — BOM icon code → condition category
//! - `sensor`, `weather` — host-facing entities and their setup

pub mod conditions;
pub mod config;
pub mod freshness;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod sensor;
pub mod stations;
pub mod throttle;
pub mod verify;
pub mod weather;

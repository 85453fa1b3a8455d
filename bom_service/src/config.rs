//! Configuration loading and validation.
//!
//! Settings are read from a TOML file:
//!
//! ```toml
//! name = "Home"
//! station = "IDN60901.94768"      # or zone_id + wmo_id, or latitude + longitude
//! cache_dir = "/var/lib/bom_service"
//! monitored_conditions = ["air_temp", "rel_hum", "weather"]
//! monitored_forecast = ["max", "min", "chance_of_rain"]
//! forecast_product_id = "IDN11060"
//! forecast_product_aac = "NSW_PT131"
//! forecast_days = 7
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ingest::transport::{FtpRetrieve, HttpGet};
use crate::logging::{self, DataSource};
use crate::model::{BomError, StationId};
use crate::sensor::{find_forecast_sensor_type, find_sensor_type};
use crate::stations::{closest_station, station_from_parts, validate_station};

pub const DEFAULT_CONFIG_PATH: &str = "./bom.toml";
pub const MAX_FORECAST_DAYS: u32 = 7;

fn default_forecast_days() -> u32 {
    MAX_FORECAST_DAYS
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BomConfig {
    pub name: Option<String>,
    pub station: Option<String>,
    /// Deprecated partial station ID; must be paired with `wmo_id`.
    pub zone_id: Option<String>,
    /// Deprecated partial station ID; must be paired with `zone_id`.
    pub wmo_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub monitored_conditions: Vec<String>,
    /// Forecast sensor keys (`max`, `summary`, ...); needs `forecast_product_id`.
    #[serde(default)]
    pub monitored_forecast: Vec<String>,
    pub forecast_product_id: Option<String>,
    #[serde(default)]
    pub forecast_product_aac: String,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
}

/// Checks that the forecast day count is within 1..=7.
pub fn validate_days(days: u32) -> Result<u32, BomError> {
    if !(1..=MAX_FORECAST_DAYS).contains(&days) {
        return Err(BomError::Configuration(format!(
            "Forecast days {} out of range 1..={}",
            days, MAX_FORECAST_DAYS
        )));
    }
    Ok(days)
}

/// Reads and validates a TOML configuration file.
pub fn load_config(path: &Path) -> Result<BomConfig, BomError> {
    let text = fs::read_to_string(path).map_err(|e| {
        BomError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<BomConfig, BomError> {
    let config: BomConfig = toml::from_str(text)
        .map_err(|e| BomError::Configuration(format!("invalid config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

impl BomConfig {
    /// Field-level checks that need no network access.
    pub fn validate(&self) -> Result<(), BomError> {
        if let Some(station) = &self.station {
            validate_station(station)?;
        }

        match (&self.zone_id, &self.wmo_id) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(BomError::Configuration(
                    "zone_id and wmo_id must be given together".to_string(),
                ));
            }
            _ => {}
        }

        validate_days(self.forecast_days)?;

        for condition in &self.monitored_conditions {
            if find_sensor_type(condition).is_none() {
                return Err(BomError::Configuration(format!(
                    "unknown monitored condition '{}'",
                    condition
                )));
            }
        }

        for key in &self.monitored_forecast {
            if find_forecast_sensor_type(key).is_none() {
                return Err(BomError::Configuration(format!(
                    "unknown monitored forecast element '{}'",
                    key
                )));
            }
        }
        if !self.monitored_forecast.is_empty() && self.forecast_product_id.is_none() {
            return Err(BomError::Configuration(
                "monitored_forecast requires forecast_product_id".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves the observation station.
    ///
    /// Order: explicit `station`, then `zone_id`.`wmo_id`, then the station
    /// nearest to `latitude`/`longitude`.
    pub fn resolve_station(
        &self,
        ftp: &impl FtpRetrieve,
        http: &impl HttpGet,
    ) -> Result<StationId, BomError> {
        if let Some(station) = &self.station {
            if self.zone_id.is_some() && self.wmo_id.is_some() {
                logging::warn(
                    DataSource::System,
                    None,
                    "Using config station, not zone_id and wmo_id, for BOM sensor",
                );
            }
            return validate_station(station);
        }

        if let (Some(zone_id), Some(wmo_id)) = (&self.zone_id, &self.wmo_id) {
            return station_from_parts(zone_id, wmo_id);
        }

        closest_station(self.latitude, self.longitude, &self.cache_dir, ftp, http)?.ok_or_else(|| {
            BomError::Configuration("Could not get BOM weather station from lat/lon".to_string())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Per-field sensors published to the host platform.
//!
//! One `CurrentSensor` per monitored observation field. Several sensors of
//! the same station share one `CurrentObservations`, so the host polls them
//! through `SensorGroup`, which updates the shared data once per pass.
//! `ForecastSensor`s read one element of one forecast day and are refreshed
//! by the weather entity's forecast fetcher.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::BomConfig;
use crate::ingest::forecast::ForecastData;
use crate::ingest::observations::CurrentObservations;
use crate::ingest::transport::{FtpRetrieve, HttpGet};
use crate::logging::{self, DataSource};
use crate::model::{ATTRIBUTION, BomError};

pub const ATTR_ATTRIBUTION: &str = "attribution";
pub const ATTR_LAST_UPDATE: &str = "last_update";
pub const ATTR_SENSOR_ID: &str = "sensor_id";
pub const ATTR_STATION_ID: &str = "station_id";
pub const ATTR_STATION_NAME: &str = "station_name";
pub const ATTR_ZONE_ID: &str = "zone_id";

pub const TEMP_CELSIUS: &str = "°C";

/// Attribute map published alongside an entity state.
pub type Attributes = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Sensor kinds
// ---------------------------------------------------------------------------

/// An observation field that can be published as a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorType {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
}

const fn sensor(key: &'static str, label: &'static str, unit: Option<&'static str>) -> SensorType {
    SensorType { key, label, unit }
}

pub static SENSOR_TYPES: &[SensorType] = &[
    sensor("wmo", "wmo", None),
    sensor("name", "Station Name", None),
    sensor("history_product", "Zone", None),
    sensor("local_date_time", "Local Time", None),
    sensor("local_date_time_full", "Local Time Full", None),
    sensor("aifstime_utc", "UTC Time Full", None),
    sensor("lat", "Lat", None),
    sensor("lon", "Long", None),
    sensor("apparent_t", "Feels Like C", Some(TEMP_CELSIUS)),
    sensor("cloud", "Cloud", None),
    sensor("cloud_base_m", "Cloud Base", None),
    sensor("cloud_oktas", "Cloud Oktas", None),
    sensor("cloud_type_id", "Cloud Type ID", None),
    sensor("cloud_type", "Cloud Type", None),
    sensor("delta_t", "Delta Temp C", Some(TEMP_CELSIUS)),
    sensor("gust_kmh", "Wind Gust kmh", Some("km/h")),
    sensor("gust_kt", "Wind Gust kt", Some("kt")),
    sensor("air_temp", "Air Temp C", Some(TEMP_CELSIUS)),
    sensor("dewpt", "Dew Point C", Some(TEMP_CELSIUS)),
    sensor("press", "Pressure mb", Some("mbar")),
    sensor("press_qnh", "Pressure qnh", Some("qnh")),
    sensor("press_msl", "Pressure msl", Some("msl")),
    sensor("press_tend", "Pressure Tend", None),
    sensor("rain_trace", "Rain Today", Some("mm")),
    sensor("rel_hum", "Relative Humidity", Some("%")),
    sensor("sea_state", "Sea State", None),
    sensor("swell_dir_worded", "Swell Direction", None),
    sensor("swell_height", "Swell Height", Some("m")),
    sensor("swell_period", "Swell Period", None),
    sensor("vis_km", "Visibility km", Some("km")),
    sensor("weather", "Weather", None),
    sensor("wind_dir", "Wind Direction", None),
    sensor("wind_spd_kmh", "Wind Speed kmh", Some("km/h")),
    sensor("wind_spd_kt", "Wind Speed kt", Some("kt")),
];

pub fn find_sensor_type(key: &str) -> Option<&'static SensorType> {
    SENSOR_TYPES.iter().find(|t| t.key == key)
}

/// A forecast element that can be published per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastSensorType {
    pub key: &'static str,
    /// `type` attribute of the element inside a forecast period.
    pub element: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
}

pub static FORECAST_SENSOR_TYPES: &[ForecastSensorType] = &[
    ForecastSensorType {
        key: "max",
        element: "air_temperature_maximum",
        label: "Max Temp C",
        unit: Some(TEMP_CELSIUS),
        icon: Some("mdi:thermometer"),
    },
    ForecastSensorType {
        key: "min",
        element: "air_temperature_minimum",
        label: "Min Temp C",
        unit: Some(TEMP_CELSIUS),
        icon: Some("mdi:thermometer"),
    },
    ForecastSensorType {
        key: "chance_of_rain",
        element: "probability_of_precipitation",
        label: "Chance of Rain",
        unit: Some("%"),
        icon: Some("mdi:water-percent"),
    },
    ForecastSensorType {
        key: "possible_rainfall",
        element: "precipitation_range",
        label: "Possible Rainfall",
        unit: Some("mm"),
        icon: Some("mdi:water"),
    },
    ForecastSensorType {
        key: "summary",
        element: "precis",
        label: "Summary",
        unit: None,
        icon: Some("mdi:text"),
    },
    ForecastSensorType {
        key: "icon",
        element: "forecast_icon_code",
        label: "Icon",
        unit: None,
        icon: None,
    },
];

pub fn find_forecast_sensor_type(key: &str) -> Option<&'static ForecastSensorType> {
    FORECAST_SENSOR_TYPES.iter().find(|t| t.key == key)
}

impl ForecastSensorType {
    /// State for `day_index` of the configured forecast area; "" if absent.
    pub fn state(&self, forecast: &ForecastData, day_index: u32) -> String {
        forecast.get_reading(self.element, day_index)
    }

    /// "BOM <label> <day>", e.g. "BOM Max Temp C 1".
    pub fn name(&self, day_index: u32) -> String {
        format!("BOM {} {}", self.label, day_index)
    }
}

/// One forecast element for one day of the configured area.
#[derive(Debug, Clone)]
pub struct ForecastSensor {
    kind: &'static ForecastSensorType,
    day_index: u32,
}

impl ForecastSensor {
    pub fn new(kind: &'static ForecastSensorType, day_index: u32) -> Self {
        Self { kind, day_index }
    }

    pub fn kind(&self) -> &'static ForecastSensorType {
        self.kind
    }

    pub fn day_index(&self) -> u32 {
        self.day_index
    }

    pub fn name(&self) -> String {
        self.kind.name(self.day_index)
    }

    pub fn state(&self, forecast: &ForecastData) -> String {
        self.kind.state(forecast, self.day_index)
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.kind.unit
    }

    pub fn icon(&self) -> Option<&'static str> {
        self.kind.icon
    }
}

/// Builds one sensor per monitored forecast element for each day in
/// `0..forecast_days`, grouped by element.
pub fn forecast_sensors(
    keys: &[String],
    forecast_days: u32,
) -> Result<Vec<ForecastSensor>, BomError> {
    let mut sensors = Vec::with_capacity(keys.len() * forecast_days as usize);
    for key in keys {
        let kind = find_forecast_sensor_type(key).ok_or_else(|| {
            BomError::Configuration(format!("unknown monitored forecast element '{}'", key))
        })?;
        sensors.extend((0..forecast_days).map(|day| ForecastSensor::new(kind, day)));
    }
    Ok(sensors)
}

// ---------------------------------------------------------------------------
// Current observation sensor
// ---------------------------------------------------------------------------

/// One monitored observation field of one station.
#[derive(Debug, Clone)]
pub struct CurrentSensor {
    kind: &'static SensorType,
    station_name: Option<String>,
}

impl CurrentSensor {
    pub fn new(kind: &'static SensorType, station_name: Option<String>) -> Self {
        Self { kind, station_name }
    }

    pub fn kind(&self) -> &'static SensorType {
        self.kind
    }

    pub fn name(&self) -> String {
        match &self.station_name {
            Some(station) => format!("BOM {} {}", station, self.kind.label),
            None => format!("BOM {}", self.kind.label),
        }
    }

    pub fn state(&self, data: &CurrentObservations) -> Option<String> {
        data.get_reading_text(self.kind.key)
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.kind.unit
    }

    /// Attribution, freshness and station metadata from the newest record.
    pub fn attributes(&self, data: &CurrentObservations) -> Attributes {
        let latest = data.latest();
        let meta = |field: &str| latest.and_then(|r| r.get(field)).cloned().unwrap_or(Value::Null);

        let mut attrs = Attributes::new();
        attrs.insert(ATTR_ATTRIBUTION.to_string(), Value::from(ATTRIBUTION));
        attrs.insert(
            ATTR_LAST_UPDATE.to_string(),
            data.last_updated()
                .map(|t| Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
        );
        attrs.insert(ATTR_SENSOR_ID.to_string(), Value::from(self.kind.key));
        attrs.insert(ATTR_STATION_ID.to_string(), meta("wmo"));
        attrs.insert(ATTR_STATION_NAME.to_string(), meta("name"));
        attrs.insert(ATTR_ZONE_ID.to_string(), meta("history_product"));
        attrs
    }
}

/// All sensors of one station sharing one data object.
#[derive(Debug)]
pub struct SensorGroup {
    pub data: CurrentObservations,
    pub sensors: Vec<CurrentSensor>,
}

impl SensorGroup {
    /// Refreshes the shared observations; failures are logged, never raised,
    /// and the previous snapshot stays in place.
    pub fn update(&mut self, http: &impl HttpGet) {
        if let Err(e) = self.data.update(http) {
            let id = self.data.station().to_string();
            logging::log_fetch_failure(DataSource::Observations, Some(&id), "update", &e);
        }
    }
}

/// Resolves the station, performs the initial fetch and builds one sensor
/// per monitored condition.
///
/// An initial fetch failure aborts setup.
pub fn setup(
    config: &BomConfig,
    http: &impl HttpGet,
    ftp: &impl FtpRetrieve,
) -> Result<SensorGroup, BomError> {
    let station = config.resolve_station(ftp, http)?;
    let id = station.to_string();

    let mut data = CurrentObservations::new(station);
    data.update(http).inspect_err(|e| {
        logging::log_fetch_failure(DataSource::Observations, Some(&id), "initial update", e);
    })?;

    let mut sensors = Vec::with_capacity(config.monitored_conditions.len());
    for condition in &config.monitored_conditions {
        let kind = find_sensor_type(condition).ok_or_else(|| {
            BomError::Configuration(format!("unknown monitored condition '{}'", condition))
        })?;
        sensors.push(CurrentSensor::new(kind, config.name.clone()));
    }

    Ok(SensorGroup { data, sensors })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

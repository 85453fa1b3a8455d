/// Core data types for the BOM weather service.
///
/// This module defines the shared domain model imported by all other modules:
/// station identifiers, observation records, coordinates and the error
/// taxonomy. It contains no I/O.

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Feed constants
// ---------------------------------------------------------------------------

/// Literal the observations feed publishes when a field has no measurement.
pub const PLACEHOLDER: &str = "-";

/// Attribution string published with every entity.
pub const ATTRIBUTION: &str = "Data provided by the Australian Bureau of Meteorology";

/// Field of each observation record holding its local timestamp.
pub const FIELD_LOCAL_DATE_TIME_FULL: &str = "local_date_time_full";

/// Format of `local_date_time_full`, e.g. "20230115143000".
pub const LOCAL_DATE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

// ---------------------------------------------------------------------------
// Station types
// ---------------------------------------------------------------------------

/// A fully qualified observation station, e.g. `IDN60801.94768`.
///
/// Only constructed through `stations::validate_station` (or its `FromStr`
/// impl), so every value matches `ID[A-Z]ddddd.ddddd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId {
    pub(crate) zone_id: String,
    pub(crate) wmo_id: String,
}

impl StationId {
    /// Regional product prefix, e.g. "IDN60801".
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Numeric site code within the zone, e.g. "94768".
    pub fn wmo_id(&self) -> &str {
        &self.wmo_id
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.zone_id, self.wmo_id)
    }
}

/// WGS84 position of a station, as published in the metadata archive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Flat-plane squared distance. Only meaningful for ranking candidates.
    pub fn squared_distance(&self, other: &Coordinate) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat * dlat + dlon * dlon
    }
}

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// One element of `observations.data`: field name to scalar value.
pub type ObservationRecord = serde_json::Map<String, serde_json::Value>;

/// Returns `true` for values that stand for "no measurement".
///
/// The feed uses the `"-"` placeholder for text fields and `null` for
/// numeric ones.
pub fn is_placeholder(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s == PLACEHOLDER,
        _ => false,
    }
}

/// Renders a scalar reading the way it is published as an entity state.
pub fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while configuring, fetching or reading BOM data.
#[derive(Debug, Error)]
pub enum BomError {
    /// Malformed station ID, out-of-range day count, unknown sensor kind.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Network or transport failure, including timeouts.
    #[error("Fetch error: {0}")]
    Fetch(String),
    /// The response did not have the expected shape.
    #[error("Data format error: {0}")]
    DataFormat(String),
    /// A requested field or forecast day is absent.
    #[error("Lookup error: {0}")]
    Lookup(String),
    /// The station directory cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl From<reqwest::Error> for BomError {
    fn from(err: reqwest::Error) -> Self {
        BomError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for BomError {
    fn from(err: serde_json::Error) -> Self {
        BomError::DataFormat(err.to_string())
    }
}

impl From<suppaftp::FtpError> for BomError {
    fn from(err: suppaftp::FtpError) -> Self {
        BomError::Fetch(format!("FTP: {}", err))
    }
}

impl From<zip::result::ZipError> for BomError {
    fn from(err: zip::result::ZipError) -> Self {
        BomError::DataFormat(format!("archive: {}", err))
    }
}

impl From<quick_xml::Error> for BomError {
    fn from(err: quick_xml::Error) -> Self {
        BomError::DataFormat(format!("XML: {}", err))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_and_null_are_missing() {
        assert!(is_placeholder(&json!("-")));
        assert!(is_placeholder(&json!(null)));
        assert!(!is_placeholder(&json!("rain")));
        assert!(!is_placeholder(&json!(0)));
    }

    #[test]
    fn test_value_text_unquotes_strings_only() {
        assert_eq!(value_text(&json!("Fine")), "Fine");
        assert_eq!(value_text(&json!(22.5)), "22.5");
        assert_eq!(value_text(&json!(94768)), "94768");
    }

    #[test]
    fn test_squared_distance_is_symmetric_and_zero_on_self() {
        let a = Coordinate::new(-33.86, 151.21);
        let b = Coordinate::new(-37.81, 144.96);
        assert_eq!(a.squared_distance(&a), 0.0);
        assert_eq!(a.squared_distance(&b), b.squared_distance(&a));
    }

    #[test]
    fn test_error_display_names_the_category() {
        let err = BomError::Configuration("Malformed station ID".to_string());
        assert_eq!(err.to_string(), "Configuration error: Malformed station ID");
        let err = BomError::Fetch("timed out".to_string());
        assert!(err.to_string().starts_with("Fetch error"));
    }
}

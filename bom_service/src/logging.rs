/// Structured logging for the BOM weather service
///
/// Every message carries the data source and, where there is one, the
/// station or product identifier. Output goes through the `log` facade;
/// `init_logger` installs `env_logger`, so `RUST_LOG` overrides the default
/// level.

use std::fmt;

use log::LevelFilter;

use crate::model::BomError;

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Observations,
    Forecast,
    StationDirectory,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Observations => write!(f, "OBS"),
            DataSource::Forecast => write!(f, "FCST"),
            DataSource::StationDirectory => write!(f, "STN"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - a field or forecast day is simply not published
    Expected,
    /// Unexpected failure - feed format changed or configuration is wrong
    Unexpected,
    /// Unknown - transient network trouble or local cache problems
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a failure by its error category.
///
/// Network failures are retried by the next scheduled poll, so they are not
/// treated as errors on their own.
pub fn classify_failure(err: &BomError) -> FailureType {
    match err {
        BomError::Lookup(_) => FailureType::Expected,
        BomError::DataFormat(_) | BomError::Configuration(_) => FailureType::Unexpected,
        BomError::Fetch(_) | BomError::Cache(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

/// Initialize the global logger. Safe to call more than once; later calls
/// are ignored.
pub fn init_logger(default_level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_secs()
        .try_init();
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn tagged(source: DataSource, id: Option<&str>, message: &str) -> String {
    match id {
        Some(id) => format!("{} [{}]: {}", source, id, message),
        None => format!("{}: {}", source, message),
    }
}

pub fn info(source: DataSource, id: Option<&str>, message: &str) {
    log::info!("{}", tagged(source, id, message));
}

pub fn warn(source: DataSource, id: Option<&str>, message: &str) {
    log::warn!("{}", tagged(source, id, message));
}

pub fn error(source: DataSource, id: Option<&str>, message: &str) {
    log::error!("{}", tagged(source, id, message));
}

pub fn debug(source: DataSource, id: Option<&str>, message: &str) {
    log::debug!("{}", tagged(source, id, message));
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure at the level its classification calls for.
pub fn log_fetch_failure(source: DataSource, id: Option<&str>, operation: &str, err: &BomError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, id, &message),
        FailureType::Unexpected => error(source, id, &message),
        FailureType::Unknown => warn(source, id, &message),
    }
}

//! Data Source Verification Module
//!
//! Checks a configuration against the live BOM feeds: is the observation
//! station publishing, which sensor fields does it actually fill, and does the
//! forecast product carry the configured area.
//!
//! Run this (`bom_service --verify`) before relying on a new station.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::BomConfig;
use crate::ingest::forecast::{FORECAST_FTP_DIR, parse_forecast};
use crate::ingest::observations::{build_observations_url, parse_observations};
use crate::ingest::transport::{FtpRetrieve, HttpGet};
use crate::model::is_placeholder;
use crate::sensor::SENSOR_TYPES;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub station: Option<StationVerification>,
    pub forecast: Option<ForecastVerification>,
    /// Set when the station could not be resolved from the configuration.
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationVerification {
    pub station_id: String,
    pub station_name: Option<String>,
    pub status: VerificationStatus,
    pub feed_responsive: bool,
    pub record_count: usize,
    pub newest_local_time: Option<String>,
    /// Sensor kinds with a real value in the newest record.
    pub fields_available: Vec<String>,
    /// Sensor kinds the config monitors that no record fills.
    pub fields_missing: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastVerification {
    pub product_id: String,
    pub product_aac: String,
    pub status: VerificationStatus,
    pub product_retrieved: bool,
    pub area_found: bool,
    pub period_count: usize,
    pub next_issue_time: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// Observation Station Verification
// ============================================================================

pub fn verify_station(
    http: &impl HttpGet,
    station: &crate::model::StationId,
    monitored: &[String],
) -> StationVerification {
    let mut result = StationVerification {
        station_id: station.to_string(),
        station_name: None,
        status: VerificationStatus::Failed,
        feed_responsive: false,
        record_count: 0,
        newest_local_time: None,
        fields_available: Vec::new(),
        fields_missing: Vec::new(),
        error_message: None,
    };

    let body = match http.get_text(&build_observations_url(station)) {
        Ok(body) => body,
        Err(e) => {
            result.error_message = Some(format!("Request failed: {}", e));
            return result;
        }
    };
    result.feed_responsive = true;

    let snapshot = match parse_observations(&body) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            result.error_message = Some(format!("Parse error: {}", e));
            return result;
        }
    };

    let records = snapshot.records();
    result.record_count = records.len();
    result.newest_local_time = Some(snapshot.newest_timestamp().to_string());

    let filled = |key: &str| {
        records
            .iter()
            .any(|record| record.get(key).is_some_and(|v| !is_placeholder(v)))
    };

    if let Some(newest) = records.first() {
        result.station_name = newest.get("name").and_then(|v| v.as_str()).map(str::to_string);
        for kind in SENSOR_TYPES {
            if newest.get(kind.key).is_some_and(|v| !is_placeholder(v)) {
                result.fields_available.push(kind.key.to_string());
            }
        }
    }

    for key in monitored {
        if !filled(key) {
            result.fields_missing.push(key.clone());
        }
    }

    result.status = if result.fields_missing.is_empty() {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };
    result
}

// ============================================================================
// Forecast Product Verification
// ============================================================================

pub fn verify_forecast_product(
    ftp: &impl FtpRetrieve,
    product_id: &str,
    product_aac: &str,
) -> ForecastVerification {
    let mut result = ForecastVerification {
        product_id: product_id.to_string(),
        product_aac: product_aac.to_string(),
        status: VerificationStatus::Failed,
        product_retrieved: false,
        area_found: false,
        period_count: 0,
        next_issue_time: None,
        error_message: None,
    };

    let bytes = match ftp.retrieve(FORECAST_FTP_DIR, &format!("{}.xml", product_id)) {
        Ok(bytes) => bytes,
        Err(e) => {
            result.error_message = Some(format!("Retrieval failed: {}", e));
            return result;
        }
    };
    result.product_retrieved = true;

    let document = match std::str::from_utf8(&bytes)
        .map_err(|e| e.to_string())
        .and_then(|xml| parse_forecast(xml).map_err(|e| e.to_string()))
    {
        Ok(document) => document,
        Err(e) => {
            result.error_message = Some(format!("Parse error: {}", e));
            return result;
        }
    };

    result.next_issue_time = document.next_issue_time.clone();
    match document.areas.get(product_aac) {
        Some(area) => {
            result.area_found = true;
            result.period_count = area.periods.len();
            result.status = if area.periods.is_empty() {
                VerificationStatus::PartialSuccess
            } else {
                VerificationStatus::Success
            };
        }
        None => {
            result.error_message = Some(format!("Area '{}' not in product", product_aac));
            result.status = VerificationStatus::PartialSuccess;
        }
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(
    config: &BomConfig,
    http: &impl HttpGet,
    ftp: &impl FtpRetrieve,
) -> VerificationReport {
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        station: None,
        forecast: None,
        error_message: None,
    };

    match config.resolve_station(ftp, http) {
        Ok(station) => {
            report.station = Some(verify_station(http, &station, &config.monitored_conditions));
        }
        Err(e) => report.error_message = Some(format!("Station resolution failed: {}", e)),
    }

    if let Some(product_id) = &config.forecast_product_id {
        let aac = &config.forecast_product_aac;
        report.forecast = Some(verify_forecast_product(ftp, product_id, aac));
    }

    report
}

fn status_line(status: &VerificationStatus, detail: &str, error: Option<&str>) -> String {
    match status {
        VerificationStatus::Success => format!("✓ OK ({})", detail),
        VerificationStatus::PartialSuccess => format!("⚠ Partial ({})", error.unwrap_or(detail)),
        VerificationStatus::Failed => format!("✗ FAILED: {}", error.unwrap_or("Unknown")),
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY ({})", report.timestamp);
    println!("═══════════════════════════════════════════════════════════");

    if let Some(error) = &report.error_message {
        println!("Station:   ✗ {}", error);
    }
    if let Some(station) = &report.station {
        let detail = format!(
            "{} records, {} fields",
            station.record_count,
            station.fields_available.len()
        );
        println!(
            "Station:   {} {}",
            station.station_id,
            status_line(&station.status, &detail, station.error_message.as_deref())
        );
        if !station.fields_missing.is_empty() {
            println!("           missing: {:?}", station.fields_missing);
        }
    }
    match &report.forecast {
        Some(forecast) => {
            let detail = format!("{} periods", forecast.period_count);
            println!(
                "Forecast:  {}/{} {}",
                forecast.product_id,
                forecast.product_aac,
                status_line(&forecast.status, &detail, forecast.error_message.as_deref())
            );
        }
        None => println!("Forecast:  not configured"),
    }
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================

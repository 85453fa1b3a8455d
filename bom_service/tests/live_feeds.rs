//! Live BOM feed checks
//!
//! These hit www.bom.gov.au and ftp.bom.gov.au directly, so they are ignored
//! by default. Run them before relying on a new station or product:
//!
//!   cargo test --test live_feeds -- --ignored --nocapture

use bom_service::ingest::forecast::ForecastData;
use bom_service::ingest::observations::CurrentObservations;
use bom_service::ingest::transport::{FtpClient, build_http_client};
use bom_service::stations::validate_station;
use bom_service::verify::*;

const STATION: &str = "IDN60901.94768"; // Sydney - Observatory Hill
const PRODUCT: &str = "IDN11060"; // NSW town forecasts
const AAC: &str = "NSW_PT131"; // Sydney

#[test]
#[ignore]
fn test_live_station_feed() {
    let http = build_http_client().unwrap();
    let station = validate_station(STATION).unwrap();

    let result = verify_station(&http, &station, &["air_temp".to_string(), "rel_hum".to_string()]);

    println!("\n🔍 {} ({:?})", result.station_id, result.station_name);
    println!("  Status: {:?}", result.status);
    println!("  Records: {}", result.record_count);
    println!("  Newest: {:?}", result.newest_local_time);
    println!("  Fields: {:?}", result.fields_available);
    if let Some(error) = &result.error_message {
        println!("  Error: {}", error);
    }

    assert_ne!(result.status, VerificationStatus::Failed, "observations feed is down");
}

#[test]
#[ignore]
fn test_live_current_observations_reading() {
    let http = build_http_client().unwrap();
    let mut data = CurrentObservations::new(validate_station(STATION).unwrap());

    data.update(&http).expect("live observations update failed");

    assert!(data.last_updated().is_some());
    println!("air_temp = {:?}", data.get_reading_text("air_temp"));
    assert!(data.get_reading("air_temp").is_some());
}

#[test]
#[ignore]
fn test_live_forecast_product() {
    let ftp = FtpClient::default();

    let result = verify_forecast_product(&ftp, PRODUCT, AAC);
    println!("\n🔍 {}/{}: {:?} ({} periods)", PRODUCT, AAC, result.status, result.period_count);
    assert_eq!(result.status, VerificationStatus::Success, "{:?}", result.error_message);

    let mut forecast = ForecastData::new(PRODUCT, AAC, 7);
    forecast.update(&ftp).expect("live forecast update failed");
    assert!(forecast.get_period_start(1).is_ok());
    println!("next issue: {}", forecast.get_issue_time());
}

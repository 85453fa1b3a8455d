/// BOM weather service entry point.
///
/// Usage:
///   bom_service            # setup, one update pass, log entity state as JSON
///   bom_service --verify   # check the configured station and forecast product
///
/// The config path comes from `BOM_CONFIG` (default `./bom.toml`); `.env` is
/// loaded first. Polling is the host's job, so this runs once and exits.

use std::env;
use std::path::PathBuf;
use std::process;

use dotenv::dotenv;
use log::LevelFilter;
use serde_json::json;

use bom_service::config::{BomConfig, DEFAULT_CONFIG_PATH, load_config};
use bom_service::ingest::transport::{FtpClient, build_http_client};
use bom_service::logging::{self, DataSource};
use bom_service::model::BomError;
use bom_service::{sensor, verify, weather};

fn config_path() -> PathBuf {
    env::var("BOM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn run_once(config: &BomConfig) -> Result<(), BomError> {
    let http = build_http_client()?;
    let ftp = FtpClient::default();

    let mut entity = weather::setup(config, &http, &ftp)?;
    entity.update(&http, &ftp);

    let state = json!({
        "name": entity.name(),
        "condition": entity.condition().map(|c| c.as_str()),
        "temperature": entity.temperature(),
        "temperature_unit": entity.temperature_unit(),
        "pressure": entity.pressure(),
        "humidity": entity.humidity(),
        "wind_speed": entity.wind_speed(),
        "wind_bearing": entity.wind_bearing(),
        "visibility": entity.visibility(),
        "attribution": entity.attribution(),
        "forecast": entity.forecast(),
    });
    logging::info(DataSource::System, None, &format!("weather: {}", state));

    if let Some(forecast) = entity.forecast_data() {
        let days = forecast.forecast_days();
        for s in sensor::forecast_sensors(&config.monitored_forecast, days)? {
            let state = json!({
                "name": s.name(),
                "state": s.state(forecast),
                "unit": s.unit(),
                "icon": s.icon(),
            });
            let message = format!("forecast sensor: {}", state);
            logging::info(DataSource::Forecast, Some(s.kind().key), &message);
        }
    }

    if !config.monitored_conditions.is_empty() {
        let mut group = sensor::setup(config, &http, &ftp)?;
        group.update(&http);
        for s in &group.sensors {
            let state = json!({
                "name": s.name(),
                "state": s.state(&group.data),
                "unit": s.unit(),
                "attributes": s.attributes(&group.data),
            });
            logging::info(DataSource::System, Some(s.kind().key), &format!("sensor: {}", state));
        }
    }

    Ok(())
}

fn run_verify(config: &BomConfig) -> Result<(), BomError> {
    let http = build_http_client()?;
    let ftp = FtpClient::default();

    println!("🔍 Verifying BOM data sources...");
    let report = verify::run_verification(config, &http, &ftp);
    verify::print_summary(&report);

    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

fn main() {
    dotenv().ok();
    logging::init_logger(LevelFilter::Info);

    let path = config_path();
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            process::exit(2);
        }
    };

    let result = if env::args().any(|arg| arg == "--verify") {
        run_verify(&config)
    } else {
        run_once(&config)
    };

    if let Err(e) = result {
        logging::log_fetch_failure(DataSource::System, None, "run", &e);
        process::exit(1);
    }
}

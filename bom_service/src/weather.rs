//! Composite weather entity.
//!
//! Combines a station's current observations with an optional précis
//! forecast into the summary the host renders as a weather card: a current
//! condition, headline readings, and a per-day forecast list.

use serde::Serialize;

use crate::conditions::{ConditionCategory, classify};
use crate::config::BomConfig;
use crate::ingest::forecast::ForecastData;
use crate::ingest::observations::CurrentObservations;
use crate::ingest::transport::{FtpRetrieve, HttpGet};
use crate::logging::{self, DataSource};
use crate::model::{ATTRIBUTION, BomError};
use crate::sensor::TEMP_CELSIUS;

const ICON_CODE: &str = "forecast_icon_code";
const TEMP_MAX: &str = "air_temperature_maximum";
const TEMP_MIN: &str = "air_temperature_minimum";
const RAIN_CHANCE: &str = "probability_of_precipitation";

/// Day index of today's forecast, issued separately from the outlook.
pub const TODAY: u32 = 0;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Degrees for a 16-point compass direction ("SSW" → 202.5).
pub fn wind_bearing_degrees(direction: &str) -> Option<f64> {
    COMPASS_POINTS
        .iter()
        .position(|p| *p == direction)
        .map(|idx| idx as f64 * 360.0 / 16.0)
}

/// One day of the published forecast list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub time: String,
    pub temperature: i64,
    pub templow: i64,
    pub precipitation: String,
    pub condition: Option<&'static str>,
}

pub struct BomWeather {
    data: CurrentObservations,
    forecast: Option<ForecastData>,
    station_name: Option<String>,
}

impl BomWeather {
    /// `station_name` falls back to the feed's station name when `None`.
    pub fn new(
        data: CurrentObservations,
        station_name: Option<String>,
        forecast: Option<ForecastData>,
    ) -> Self {
        let station_name = station_name.or_else(|| data.get_reading_text("name"));
        Self {
            data,
            forecast,
            station_name,
        }
    }

    pub fn observations(&self) -> &CurrentObservations {
        &self.data
    }

    pub fn forecast_data(&self) -> Option<&ForecastData> {
        self.forecast.as_ref()
    }

    /// Refreshes current observations, then the forecast if configured.
    /// Failures are logged and the previous data is kept.
    pub fn update(&mut self, http: &impl HttpGet, ftp: &impl FtpRetrieve) {
        if let Err(e) = self.data.update(http) {
            let id = self.data.station().to_string();
            logging::log_fetch_failure(DataSource::Observations, Some(&id), "update", &e);
        }
        if let Some(forecast) = self.forecast.as_mut() {
            if let Err(e) = forecast.update(ftp) {
                let id = forecast.product_id().to_string();
                logging::log_fetch_failure(DataSource::Forecast, Some(&id), "update", &e);
            }
        }
    }

    pub fn name(&self) -> String {
        format!("BOM {}", self.station_name.as_deref().unwrap_or("(unknown station)"))
    }

    /// Today's forecast icon when a forecast is configured, otherwise the
    /// station's current `weather` reading.
    pub fn condition(&self) -> Option<ConditionCategory> {
        match &self.forecast {
            Some(forecast) => classify(&forecast.get_reading(ICON_CODE, TODAY)),
            None => self.data.get_reading_text("weather").as_deref().and_then(classify),
        }
    }

    pub fn temperature(&self) -> Option<String> {
        self.data.get_reading_text("air_temp")
    }

    pub fn temperature_unit(&self) -> &'static str {
        TEMP_CELSIUS
    }

    /// Mean sea-level pressure.
    pub fn pressure(&self) -> Option<String> {
        self.data.get_reading_text("press_msl")
    }

    pub fn humidity(&self) -> Option<String> {
        self.data.get_reading_text("rel_hum")
    }

    pub fn wind_speed(&self) -> Option<String> {
        self.data.get_reading_text("wind_spd_kmh")
    }

    pub fn visibility(&self) -> Option<String> {
        self.data.get_reading_text("vis_km")
    }

    pub fn wind_bearing(&self) -> Option<f64> {
        self.data
            .get_reading_text("wind_dir")
            .as_deref()
            .and_then(wind_bearing_degrees)
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }

    /// Forecast list for days 1 through the configured day count.
    ///
    /// Day 0 is skipped here; it only drives `condition()`. Days that are
    /// missing from the product or carry non-numeric temperatures are logged
    /// and left out. `None` when no forecast is configured.
    pub fn forecast(&self) -> Option<Vec<ForecastEntry>> {
        let forecast = self.forecast.as_ref()?;

        let mut entries = Vec::new();
        for day in 1..=forecast.forecast_days() {
            match forecast_entry(forecast, day) {
                Ok(entry) => entries.push(entry),
                Err(e) => logging::log_fetch_failure(
                    DataSource::Forecast,
                    Some(forecast.product_id()),
                    &format!("forecast day {}", day),
                    &e,
                ),
            }
        }
        Some(entries)
    }
}

fn parse_temperature(forecast: &ForecastData, field: &str, day: u32) -> Result<i64, BomError> {
    let raw = forecast.get_reading(field, day);
    raw.trim()
        .parse::<i64>()
        .map_err(|_| {
            BomError::Lookup(format!("{} for day {} is '{}', not a whole number", field, day, raw))
        })
}

fn forecast_entry(forecast: &ForecastData, day: u32) -> Result<ForecastEntry, BomError> {
    Ok(ForecastEntry {
        time: forecast.get_period_start(day)?,
        temperature: parse_temperature(forecast, TEMP_MAX, day)?,
        templow: parse_temperature(forecast, TEMP_MIN, day)?,
        precipitation: forecast.get_reading(RAIN_CHANCE, day).trim_end_matches('%').to_string(),
        condition: classify(&forecast.get_reading(ICON_CODE, day)).map(|c| c.as_str()),
    })
}

/// Resolves the station, runs the initial updates and builds the entity.
///
/// A failed initial observations fetch aborts setup; a failed initial
/// forecast fetch is only logged. Without `forecast_product_id` the entity
/// carries no forecast at all.
pub fn setup(
    config: &BomConfig,
    http: &impl HttpGet,
    ftp: &impl FtpRetrieve,
) -> Result<BomWeather, BomError> {
    let station = config.resolve_station(ftp, http)?;
    let id = station.to_string();

    let forecast = match &config.forecast_product_id {
        Some(product_id) => {
            let aac = &config.forecast_product_aac;
            let mut forecast = ForecastData::new(product_id, aac, config.forecast_days);
            if let Err(e) = forecast.update(ftp) {
                let product = Some(product_id.as_str());
                logging::log_fetch_failure(DataSource::Forecast, product, "initial update", &e);
            }
            Some(forecast)
        }
        None => None,
    };

    let mut data = CurrentObservations::new(station);
    data.update(http).inspect_err(|e| {
        logging::log_fetch_failure(DataSource::Observations, Some(&id), "initial update", e);
    })?;

    Ok(BomWeather::new(data, config.name.clone(), forecast))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::ingest::forecast::tests::{SAMPLE_PRODUCT, sample_ftp};
    use crate::ingest::tests_support::{PanicFtp, StubFtp, StubHttp};
    use crate::stations::validate_station;
    use serde_json::json;

    fn observations(weather: &str) -> CurrentObservations {
        let body = json!({ "observations": { "data": [
            {
                "name": "Sydney - Observatory Hill", "local_date_time_full": "20230115143000",
                "air_temp": 22.5, "press_msl": 1012.3, "rel_hum": 64, "wind_spd_kmh": 17,
                "vis_km": "10", "wind_dir": "SSW", "weather": weather
            }
        ] } });
        let mut data = CurrentObservations::new(validate_station("IDN60901.94768").unwrap());
        data.ingest(&body.to_string()).unwrap();
        data
    }

    fn sydney_forecast(days: u32) -> ForecastData {
        let mut forecast = ForecastData::new("IDN11060", "NSW_PT131", days);
        forecast.ingest(SAMPLE_PRODUCT).unwrap();
        forecast
    }

    #[test]
    fn test_wind_bearing_points() {
        assert_eq!(wind_bearing_degrees("N"), Some(0.0));
        assert_eq!(wind_bearing_degrees("E"), Some(90.0));
        assert_eq!(wind_bearing_degrees("SSW"), Some(202.5));
        assert_eq!(wind_bearing_degrees("NNW"), Some(337.5));
        assert_eq!(wind_bearing_degrees("CALM"), None);
    }

    #[test]
    fn test_headline_readings() {
        let weather = BomWeather::new(observations("-"), None, None);
        assert_eq!(weather.name(), "BOM Sydney - Observatory Hill");
        assert_eq!(weather.temperature().as_deref(), Some("22.5"));
        assert_eq!(weather.pressure().as_deref(), Some("1012.3"));
        assert_eq!(weather.humidity().as_deref(), Some("64"));
        assert_eq!(weather.wind_speed().as_deref(), Some("17"));
        assert_eq!(weather.visibility().as_deref(), Some("10"));
        assert_eq!(weather.wind_bearing(), Some(202.5));
        assert_eq!(weather.temperature_unit(), "°C");
    }

    #[test]
    fn test_configured_name_overrides_feed_name() {
        let weather = BomWeather::new(observations("-"), Some("Home".to_string()), None);
        assert_eq!(weather.name(), "BOM Home");
    }

    #[test]
    fn test_condition_without_forecast_uses_current_weather_code() {
        assert_eq!(
            BomWeather::new(observations("9"), None, None).condition(),
            Some(ConditionCategory::Windy)
        );
        assert_eq!(BomWeather::new(observations("Fine"), None, None).condition(), None);
    }

    #[test]
    fn test_condition_with_forecast_uses_today_icon() {
        let weather = BomWeather::new(observations("9"), None, Some(sydney_forecast(7)));
        // Day 0 icon is 3 (partly cloudy), regardless of current weather.
        assert_eq!(weather.condition(), Some(ConditionCategory::PartlyCloudy));
    }

    #[test]
    fn test_no_forecast_configured_means_no_forecast_list() {
        assert_eq!(BomWeather::new(observations("-"), None, None).forecast(), None);
    }

    #[test]
    fn test_forecast_list_starts_at_day_one_and_skips_missing_days() {
        let weather = BomWeather::new(observations("-"), None, Some(sydney_forecast(7)));
        let days = weather.forecast().expect("forecast is configured");

        // Sample product only has days 1 and 2 after today.
        assert_eq!(days.len(), 2);
        assert_eq!(
            days[0],
            ForecastEntry {
                time: "2023-01-16T00:00:00+11:00".to_string(),
                temperature: 25,
                templow: 19,
                precipitation: "80".to_string(),
                condition: None,
            }
        );
        assert_eq!(days[1].condition, Some("sunny"));
        assert_eq!(days[1].precipitation, "5");
    }

    #[test]
    fn test_forecast_list_respects_day_count() {
        let weather = BomWeather::new(observations("-"), None, Some(sydney_forecast(1)));
        assert_eq!(weather.forecast().unwrap().len(), 1);
    }

    #[test]
    fn test_setup_without_forecast_never_touches_ftp() {
        let config = parse_config(r#"station = "IDN60901.94768""#).unwrap();
        let body = json!({ "observations": { "data": [
            {
                "name": "Sydney - Observatory Hill",
                "local_date_time_full": "20230115143000",
                "air_temp": 22.5
            }
        ] } });
        let weather = setup(&config, &StubHttp::new(&body.to_string()), &PanicFtp).unwrap();
        assert!(weather.forecast_data().is_none());
        assert_eq!(weather.temperature().as_deref(), Some("22.5"));
    }

    #[test]
    fn test_setup_tolerates_forecast_failure_but_not_observation_failure() {
        let config = parse_config(
            r#"
            station = "IDN60901.94768"
            forecast_product_id = "IDN11060"
            forecast_product_aac = "NSW_PT131"
            "#,
        )
        .unwrap();
        let body = json!({ "observations": { "data": [
            { "local_date_time_full": "20230115143000", "air_temp": 22.5 }
        ] } });

        let weather = setup(&config, &StubHttp::new(&body.to_string()), &StubFtp::new())
            .expect("forecast failure should not abort setup");
        assert!(weather.forecast_data().is_some());
        assert_eq!(weather.forecast(), Some(vec![]));

        let ftp = sample_ftp();
        let result = setup(&config, &StubHttp::failing("HTTP error: 404"), &ftp);
        assert!(matches!(result, Err(BomError::Fetch(_))));
    }

    #[test]
    fn test_forecast_failed_at_setup_is_fetched_on_next_update() {
        let config = parse_config(
            r#"
            station = "IDN60901.94768"
            forecast_product_id = "IDN11060"
            forecast_product_aac = "NSW_PT131"
            "#,
        )
        .unwrap();
        let body = json!({ "observations": { "data": [
            { "local_date_time_full": "20230115143000", "air_temp": 22.5 }
        ] } });
        let http = StubHttp::new(&body.to_string());

        let mut weather = setup(&config, &http, &StubFtp::new()).unwrap();
        assert_eq!(weather.forecast(), Some(vec![]));

        let ftp = sample_ftp();
        weather.update(&http, &ftp);
        assert_eq!(ftp.calls(), 1);
        assert_eq!(weather.forecast().map(|days| days.len()), Some(2));
    }
}

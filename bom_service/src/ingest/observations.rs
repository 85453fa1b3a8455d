/// BOM current observations client.
///
/// Retrieves the rolling 72-hour observation history of a single station as
/// JSON over HTTP and answers "latest usable value of field X" queries.
///
/// Endpoint: http://www.bom.gov.au/fwo/<zone>/<zone>.<wmo>.json
///
/// The feed is ordered newest first. Some fields (notably the `weather`
/// description) are only refreshed hourly while numeric fields refresh every
/// 10 minutes, so a reading is the newest value that is not a placeholder
/// rather than simply the newest record's value.

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::freshness::{STALENESS_WINDOW_MINUTES, fetch_due_at, local_now};
use crate::ingest::transport::HttpGet;
use crate::logging::{self, DataSource};
use crate::model::{
    BomError, FIELD_LOCAL_DATE_TIME_FULL, LOCAL_DATE_TIME_FORMAT, ObservationRecord, StationId,
    is_placeholder, value_text,
};
use crate::throttle::RateLimiter;

const BOM_BASE_URL: &str = "http://www.bom.gov.au";

/// Caller-side minimum interval between `update()` calls that do any work.
pub const MIN_TIME_BETWEEN_UPDATES_SECS: i64 = 60;

// ============================================================================
// Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: ObservationsBody,
}

#[derive(Debug, Deserialize)]
struct ObservationsBody {
    data: Vec<ObservationRecord>,
}

/// One complete fetch: every record, newest first, plus the newest record's
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    records: Vec<ObservationRecord>,
    newest: NaiveDateTime,
}

impl Snapshot {
    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn newest_timestamp(&self) -> NaiveDateTime {
        self.newest
    }
}

// ============================================================================
// Parsing
// ============================================================================

pub fn build_observations_url(station: &StationId) -> String {
    format!(
        "{}/fwo/{}/{}.{}.json",
        BOM_BASE_URL,
        station.zone_id(),
        station.zone_id(),
        station.wmo_id()
    )
}

/// Parses a `local_date_time_full` value such as "20230115143000".
pub fn parse_local_date_time(record: &ObservationRecord) -> Result<NaiveDateTime, BomError> {
    let raw = record
        .get(FIELD_LOCAL_DATE_TIME_FULL)
        .map(value_text)
        .ok_or_else(|| {
            BomError::DataFormat(format!("newest record has no {}", FIELD_LOCAL_DATE_TIME_FULL))
        })?;

    NaiveDateTime::parse_from_str(&raw, LOCAL_DATE_TIME_FORMAT).map_err(|e| {
        BomError::DataFormat(format!("bad {} '{}': {}", FIELD_LOCAL_DATE_TIME_FULL, raw, e))
    })
}

/// Parses a full observations response into a snapshot.
///
/// Fails with `DataFormat` if `observations.data` is missing or empty, or if
/// the newest record's timestamp cannot be parsed.
pub fn parse_observations(body: &str) -> Result<Snapshot, BomError> {
    let response: ObservationsResponse = serde_json::from_str(body)?;
    let records = response.observations.data;

    let newest = records
        .first()
        .ok_or_else(|| BomError::DataFormat("observations.data is empty".to_string()))
        .and_then(parse_local_date_time)?;

    Ok(Snapshot { records, newest })
}

// ============================================================================
// Current observations
// ============================================================================

/// Current observations for one station.
#[derive(Debug, Clone)]
pub struct CurrentObservations {
    station: StationId,
    snapshot: Option<Snapshot>,
    last_updated: Option<NaiveDateTime>,
    limiter: RateLimiter,
}

impl CurrentObservations {
    pub fn new(station: StationId) -> Self {
        Self {
            station,
            snapshot: None,
            last_updated: None,
            limiter: RateLimiter::new(Duration::seconds(MIN_TIME_BETWEEN_UPDATES_SECS)),
        }
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    /// Timestamp of the newest record of the last successful fetch.
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.last_updated
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Whether the 35-minute staleness window has lapsed at `now`.
    pub fn should_fetch_at(&self, now: NaiveDateTime) -> bool {
        fetch_due_at(self.last_updated, STALENESS_WINDOW_MINUTES, now)
    }

    pub fn should_fetch(&self) -> bool {
        self.should_fetch_at(local_now())
    }

    /// Fetches new observations if neither the rate limiter nor the
    /// staleness window says otherwise. A failed fetch is not recorded by the
    /// rate limiter, so the next call retries.
    pub fn update(&mut self, http: &impl HttpGet) -> Result<(), BomError> {
        self.update_at(http, Local::now())
    }

    /// `update` against an explicit clock.
    pub fn update_at(&mut self, http: &impl HttpGet, now: DateTime<Local>) -> Result<(), BomError> {
        let id = self.station.to_string();

        let utc_now = now.with_timezone(&Utc);
        if !self.limiter.ready_at(utc_now) {
            logging::debug(DataSource::Observations, Some(&id), "update throttled");
            return Ok(());
        }

        let local_now = now.naive_local();
        if !self.should_fetch_at(local_now) {
            if let Some(last) = self.last_updated {
                logging::debug(
                    DataSource::Observations,
                    Some(&id),
                    &format!(
                        "updated {} minutes ago, skipping as < {} minutes (now {}, last update {})",
                        (local_now - last).num_minutes(),
                        STALENESS_WINDOW_MINUTES,
                        local_now,
                        last
                    ),
                );
            }
            self.limiter.record(utc_now);
            return Ok(());
        }

        let url = build_observations_url(&self.station);
        logging::debug(DataSource::Observations, Some(&id), &format!("GET {}", url));

        let body = http.get_text(&url)?;
        self.ingest(&body)?;
        self.limiter.record(utc_now);
        Ok(())
    }

    /// Replaces the snapshot with a parsed response body.
    ///
    /// On a malformed body the parsed data is discarded and both the prior
    /// snapshot and `last_updated` are kept.
    pub fn ingest(&mut self, body: &str) -> Result<(), BomError> {
        let snapshot = parse_observations(body).inspect_err(|e| {
            logging::log_fetch_failure(
                DataSource::Observations,
                Some(&self.station.to_string()),
                "parse observations",
                e,
            );
        })?;

        self.last_updated = Some(snapshot.newest);
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Newest non-placeholder value of `field`, scanning newest to oldest.
    ///
    /// `None` if no snapshot exists yet or every record lacks a usable value.
    pub fn get_reading(&self, field: &str) -> Option<&serde_json::Value> {
        self.snapshot
            .as_ref()?
            .records
            .iter()
            .filter_map(|record| record.get(field))
            .find(|value| !is_placeholder(value))
    }

    /// `get_reading` rendered as published state text.
    pub fn get_reading_text(&self, field: &str) -> Option<String> {
        self.get_reading(field).map(value_text)
    }

    /// The newest record, used for station metadata (name, wmo, zone).
    pub fn latest(&self) -> Option<&ObservationRecord> {
        self.snapshot.as_ref()?.records.first()
    }
}

// ============================================================================
// Tests
// ============================================================================

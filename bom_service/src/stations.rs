/// Station identifiers and the station directory.
///
/// A station is addressed as `<zone_id>.<wmo_id>`, e.g. `IDN60801.94768`.
/// This module validates identifiers supplied by configuration and resolves
/// a latitude/longitude to the nearest known station.
///
/// The directory is built from two sources, since neither alone has both
/// halves of an identifier:
///   - the station metadata archive (`stations.zip` over FTP), which maps
///     WMO site codes to coordinates
///   - the per-state "all observations" pages, which map WMO site codes to
///     zone product IDs
///
/// Building it costs several MB of requests, so the result is cached as
/// gzip-compressed JSON in the configured directory and rebuilt only when
/// the cache file is missing.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use regex::Regex;

use crate::ingest::transport::{FtpRetrieve, HttpGet};
use crate::logging::{self, DataSource};
use crate::model::{BomError, Coordinate, StationId};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub const STATIONS_FTP_DIR: &str = "anon2/home/ncc/metadata/sitelists";
pub const STATIONS_ARCHIVE: &str = "stations.zip";
pub const STATIONS_TABLE: &str = "stations.txt";

/// Filename of the compressed directory cache inside the cache directory.
pub const CACHE_FILE_NAME: &str = ".bom-stations.json.gz";

/// States whose observation index pages are scraped for zone IDs.
pub const SCRAPED_STATES: &[&str] = &["nsw", "vic", "qld", "wa", "tas", "nt"];

// Fixed-width layout of stations.txt.
const TABLE_HEADER_LINES: usize = 4;
const TABLE_MIN_LINE_LEN: usize = 120;
const COL_WMO: (usize, usize) = (128, 134);
const COL_LAT: (usize, usize) = (70, 78);
const COL_LON: (usize, usize) = (79, 88);
const NO_WMO: &str = "..";

/// Station ID → coordinate, ordered by identifier.
pub type StationDirectory = BTreeMap<StationId, Coordinate>;

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

fn station_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<zone>ID[A-Z]\d{5})\.(?P<wmo>\d{5})$").expect("station pattern is valid")
    })
}

/// Checks that a configured station ID is well-formed.
///
/// A trailing `.shtml` (left over when the ID is copied from a BOM page URL)
/// is stripped first.
pub fn validate_station(raw: &str) -> Result<StationId, BomError> {
    let candidate = raw.strip_suffix(".shtml").unwrap_or(raw);

    let caps = station_pattern()
        .captures(candidate)
        .ok_or_else(|| BomError::Configuration(format!("Malformed station ID: '{}'", raw)))?;

    Ok(StationId {
        zone_id: caps["zone"].to_string(),
        wmo_id: caps["wmo"].to_string(),
    })
}

/// Builds a station ID from the deprecated separate `zone_id`/`wmo_id` options.
pub fn station_from_parts(zone_id: &str, wmo_id: &str) -> Result<StationId, BomError> {
    validate_station(&format!("{}.{}", zone_id, wmo_id))
}

impl FromStr for StationId {
    type Err = BomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_station(s)
    }
}

// ---------------------------------------------------------------------------
// Nearest station
// ---------------------------------------------------------------------------

/// Returns the station minimising flat-plane squared distance to the query.
///
/// Station spacing is coarse enough that no geodesic correction is applied.
/// Returns `None` for an empty directory.
pub fn resolve_nearest(target: Coordinate, directory: &StationDirectory) -> Option<StationId> {
    directory
        .iter()
        .min_by(|(_, a), (_, b)| {
            target
                .squared_distance(a)
                .total_cmp(&target.squared_distance(b))
        })
        .map(|(id, _)| id.clone())
}

/// Resolves the nearest station to `latitude`/`longitude`, loading (or
/// building) the cached directory in `cache_dir`.
///
/// Returns `Ok(None)` when either coordinate is absent or `cache_dir` is not
/// an existing directory.
pub fn closest_station(
    latitude: Option<f64>,
    longitude: Option<f64>,
    cache_dir: &Path,
    ftp: &impl FtpRetrieve,
    http: &impl HttpGet,
) -> Result<Option<StationId>, BomError> {
    let (Some(lat), Some(lon)) = (latitude, longitude) else {
        return Ok(None);
    };
    if !cache_dir.is_dir() {
        logging::warn(
            DataSource::StationDirectory,
            None,
            &format!("cache directory {} does not exist", cache_dir.display()),
        );
        return Ok(None);
    }

    let directory = load_directory(cache_dir, ftp, http)?;
    Ok(resolve_nearest(Coordinate::new(lat, lon), &directory))
}

// ---------------------------------------------------------------------------
// Directory cache
// ---------------------------------------------------------------------------

pub fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILE_NAME)
}

/// Returns the cached directory, building and caching it first if needed.
///
/// No locking: two processes starting cold may both rebuild, and the last
/// complete write wins.
pub fn load_directory(
    cache_dir: &Path,
    ftp: &impl FtpRetrieve,
    http: &impl HttpGet,
) -> Result<StationDirectory, BomError> {
    let path = cache_path(cache_dir);
    if path.is_file() {
        let message = format!("loading from {}", path.display());
        logging::debug(DataSource::StationDirectory, None, &message);
        return read_cache(&path);
    }

    logging::info(DataSource::StationDirectory, None, "cache missing, rebuilding from BOM");
    let directory = build_directory(ftp, http)?;
    write_cache(&path, &directory)?;
    logging::info(
        DataSource::StationDirectory,
        None,
        &format!("cached {} stations to {}", directory.len(), path.display()),
    );
    Ok(directory)
}

/// Reads a gzip JSON cache of `"ZONE.WMO": [lat, lon]` entries.
pub fn read_cache(path: &Path) -> Result<StationDirectory, BomError> {
    let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let raw: BTreeMap<String, (f64, f64)> = serde_json::from_reader(decoder)?;

    let mut directory = StationDirectory::new();
    for (key, (lat, lon)) in raw {
        match validate_station(&key) {
            Ok(id) => {
                directory.insert(id, Coordinate::new(lat, lon));
            }
            Err(_) => log::warn!("skipping malformed cache key '{}' in {}", key, path.display()),
        }
    }
    Ok(directory)
}

pub fn write_cache(path: &Path, directory: &StationDirectory) -> Result<(), BomError> {
    let raw: BTreeMap<String, (f64, f64)> = directory
        .iter()
        .map(|(id, c)| (id.to_string(), (c.latitude, c.longitude)))
        .collect();

    let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    serde_json::to_writer(&mut encoder, &raw)?;
    encoder.finish()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Directory rebuild
// ---------------------------------------------------------------------------

/// Fetches the metadata archive and the zone pages and joins them on WMO ID.
///
/// Stations present in only one source are dropped.
pub fn build_directory(
    ftp: &impl FtpRetrieve,
    http: &impl HttpGet,
) -> Result<StationDirectory, BomError> {
    let archive = ftp.retrieve(STATIONS_FTP_DIR, STATIONS_ARCHIVE)?;
    let coordinates = parse_station_archive(&archive)?;

    let mut zones = HashMap::new();
    for state in SCRAPED_STATES {
        let url = format!("http://www.bom.gov.au/{0}/observations/{0}all.shtml", state);
        let page = http.get_text(&url)?;
        zones.extend(parse_zone_links(&page));
    }

    Ok(join_sources(&coordinates, &zones))
}

/// Extracts `stations.txt` from the archive and parses it.
pub fn parse_station_archive(archive: &[u8]) -> Result<HashMap<String, Coordinate>, BomError> {
    let mut zipped = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut table = Vec::new();
    zipped
        .by_name(STATIONS_TABLE)?
        .read_to_end(&mut table)
        .map_err(|e| BomError::DataFormat(format!("reading {}: {}", STATIONS_TABLE, e)))?;
    parse_station_table(&String::from_utf8_lossy(&table))
}

fn column(line: &str, (start, end): (usize, usize)) -> &str {
    let end = end.min(line.len());
    let start = start.min(end);
    line.get(start..end).unwrap_or("").trim()
}

/// Parses the fixed-width station table: WMO ID → coordinate.
///
/// Skips the header, stops at the first line shorter than 120 characters
/// (the footer), and ignores stations without a WMO ID.
pub fn parse_station_table(text: &str) -> Result<HashMap<String, Coordinate>, BomError> {
    let mut stations = HashMap::new();

    for line in text.lines().skip(TABLE_HEADER_LINES) {
        let line = line.trim();
        if line.len() < TABLE_MIN_LINE_LEN {
            break;
        }

        let wmo = column(line, COL_WMO);
        if wmo == NO_WMO {
            continue;
        }

        let parse = |raw: &str, what: &str| {
            raw.parse::<f64>().map_err(|_| {
                BomError::DataFormat(format!("bad {} '{}' for station {}", what, raw, wmo))
            })
        };
        let lat = parse(column(line, COL_LAT), "latitude")?;
        let lon = parse(column(line, COL_LON), "longitude")?;
        stations.insert(wmo.to_string(), Coordinate::new(lat, lon));
    }

    Ok(stations)
}

fn zone_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"<a href="/products/(?P<zone>ID[A-Z]\d{5})/(?P<zone_again>ID[A-Z]\d{5})\.(?P<wmo>\d{5})\.shtml">"#,
        )
        .expect("zone link pattern is valid")
    })
}

/// Extracts WMO ID → zone ID pairs from an observations index page.
///
/// Only links whose directory and file prefix agree are accepted.
pub fn parse_zone_links(page: &str) -> HashMap<String, String> {
    zone_link_pattern()
        .captures_iter(page)
        .filter(|caps| caps["zone"] == caps["zone_again"])
        .map(|caps| (caps["wmo"].to_string(), caps["zone"].to_string()))
        .collect()
}

fn join_sources(
    coordinates: &HashMap<String, Coordinate>,
    zones: &HashMap<String, String>,
) -> StationDirectory {
    zones
        .iter()
        .filter_map(|(wmo, zone)| {
            let coord = coordinates.get(wmo)?;
            let id = StationId {
                zone_id: zone.clone(),
                wmo_id: wmo.clone(),
            };
            Some((id, *coord))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! BOM précis forecast client.
//!
//! Forecast products (e.g. `IDN11060`, the NSW town forecasts) are published
//! as XML on the anonymous FTP server under `anon/gen/fwo/<product>.xml`.
//! A product holds many forecast areas, each identified by an AAC (area
//! code), each with one `forecast-period` per day:
//!
//! ```text
//! product/amoc/next-routine-issue-time-local
//! product/forecast/area[@aac]/forecast-period[@index, @start-time-local]/*[@type]
//! ```
//!
//! Period index 0 is today, issued separately from the multi-day outlook.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::ingest::transport::FtpRetrieve;
use crate::logging::{self, DataSource};
use crate::model::BomError;
use crate::throttle::RateLimiter;

pub const FORECAST_FTP_DIR: &str = "anon/gen/fwo";

/// Forecast products publish a few times a day; a fixed hourly gate suffices.
pub const MIN_TIME_BETWEEN_FORECAST_UPDATES_MINUTES: i64 = 60;

/// Longest field value published verbatim; longer values are cut and get "...".
pub const MAX_FIELD_CHARS: usize = 251;
const ELLIPSIS: &str = "...";

const NOT_AVAILABLE: &str = "n/a";

// ============================================================================
// XML element tree
// ============================================================================

#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, BomError> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| BomError::DataFormat(format!("XML attribute: {}", e)))?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok(Node {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attrs,
            ..Node::default()
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn parse_tree(xml: &str) -> Result<Node, BomError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Node::from_start(&start)?),
            Event::Empty(start) => {
                let node = Node::from_start(&start)?;
                attach(&mut stack, &mut root, node);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| BomError::DataFormat("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(BomError::DataFormat(format!("{} unclosed XML elements", stack.len())));
    }
    root.ok_or_else(|| BomError::DataFormat("empty forecast document".to_string()))
}

// ============================================================================
// Forecast document
// ============================================================================

/// One day of one area.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPeriod {
    pub index: u32,
    pub start_time_local: Option<String>,
    /// Child element `type` attribute → text, e.g. "precis" → "Sunny.".
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastArea {
    pub aac: String,
    pub description: Option<String>,
    pub periods: BTreeMap<u32, ForecastPeriod>,
}

/// A parsed forecast product. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastDocument {
    pub next_issue_time: Option<String>,
    pub areas: HashMap<String, ForecastArea>,
}

impl ForecastDocument {
    pub fn period(&self, aac: &str, index: u32) -> Option<&ForecastPeriod> {
        self.areas.get(aac)?.periods.get(&index)
    }
}

fn parse_period(node: &Node) -> Result<ForecastPeriod, BomError> {
    let raw_index = node
        .attr("index")
        .ok_or_else(|| BomError::DataFormat("forecast-period without index".to_string()))?;
    let index = raw_index
        .parse::<u32>()
        .map_err(|_| BomError::DataFormat(format!("bad forecast-period index '{}'", raw_index)))?;

    let mut fields = HashMap::new();
    for child in &node.children {
        if let Some(kind) = child.attr("type") {
            // First element of a type wins, as in an XPath find.
            fields
                .entry(kind.to_string())
                .or_insert_with(|| child.text.clone());
        }
    }

    Ok(ForecastPeriod {
        index,
        start_time_local: node.attr("start-time-local").map(str::to_string),
        fields,
    })
}

/// Parses a forecast product XML document.
pub fn parse_forecast(xml: &str) -> Result<ForecastDocument, BomError> {
    let root = parse_tree(xml)?;

    let next_issue_time = root
        .child("amoc")
        .and_then(|amoc| amoc.child("next-routine-issue-time-local"))
        .map(|node| node.text.clone());

    let mut areas = HashMap::new();
    if let Some(forecast) = root.child("forecast") {
        for area in forecast.children_named("area") {
            let Some(aac) = area.attr("aac") else {
                continue;
            };
            let mut periods = BTreeMap::new();
            for period in area.children_named("forecast-period") {
                let period = parse_period(period)?;
                periods.entry(period.index).or_insert(period);
            }
            areas.entry(aac.to_string()).or_insert(ForecastArea {
                aac: aac.to_string(),
                description: area.attr("description").map(str::to_string),
                periods,
            });
        }
    }

    Ok(ForecastDocument {
        next_issue_time,
        areas,
    })
}

/// Bounds attribute payloads: values over 251 characters are cut to 251
/// characters plus "...".
pub fn truncate_field(value: &str) -> String {
    match value.char_indices().nth(MAX_FIELD_CHARS) {
        Some((cut, _)) => format!("{}{}", &value[..cut], ELLIPSIS),
        None => value.to_string(),
    }
}

// ============================================================================
// Forecast data
// ============================================================================

/// Forecast for one area (AAC) of one product.
#[derive(Debug, Clone)]
pub struct ForecastData {
    product_id: String,
    product_aac: String,
    forecast_days: u32,
    document: Option<ForecastDocument>,
    limiter: RateLimiter,
}

impl ForecastData {
    /// `forecast_days` is expected to be validated by the config layer.
    pub fn new(product_id: &str, product_aac: &str, forecast_days: u32) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_aac: product_aac.to_string(),
            forecast_days,
            document: None,
            limiter: RateLimiter::new(Duration::minutes(MIN_TIME_BETWEEN_FORECAST_UPDATES_MINUTES)),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_aac(&self) -> &str {
        &self.product_aac
    }

    pub fn forecast_days(&self) -> u32 {
        self.forecast_days
    }

    pub fn document(&self) -> Option<&ForecastDocument> {
        self.document.as_ref()
    }

    pub fn update(&mut self, ftp: &impl FtpRetrieve) -> Result<(), BomError> {
        self.update_at(ftp, Utc::now())
    }

    /// Retrieves and parses the product unless the hourly gate is closed.
    ///
    /// Only a successful update closes the gate, so a failure is retried on
    /// the next call.
    pub fn update_at(
        &mut self,
        ftp: &impl FtpRetrieve,
        now: DateTime<Utc>,
    ) -> Result<(), BomError> {
        if !self.limiter.ready_at(now) {
            logging::debug(DataSource::Forecast, Some(&self.product_id), "update throttled");
            return Ok(());
        }

        let file = format!("{}.xml", self.product_id);
        logging::debug(
            DataSource::Forecast,
            Some(&self.product_id),
            &format!("RETR {}/{}", FORECAST_FTP_DIR, file),
        );
        let bytes = ftp.retrieve(FORECAST_FTP_DIR, &file)?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| BomError::DataFormat(format!("{} is not UTF-8: {}", file, e)))?;
        self.ingest(&xml)?;
        self.limiter.record(now);
        Ok(())
    }

    /// Replaces the document with a parsed XML body.
    pub fn ingest(&mut self, xml: &str) -> Result<(), BomError> {
        let document = parse_forecast(xml).inspect_err(|e| {
            let product = Some(self.product_id.as_str());
            logging::log_fetch_failure(DataSource::Forecast, product, "parse forecast", e);
        })?;

        if !document.areas.contains_key(&self.product_aac) {
            logging::warn(
                DataSource::Forecast,
                Some(&self.product_id),
                &format!("area '{}' not present in product", self.product_aac),
            );
        }
        self.document = Some(document);
        Ok(())
    }

    fn period(&self, day_index: u32) -> Option<&ForecastPeriod> {
        self.document.as_ref()?.period(&self.product_aac, day_index)
    }

    /// Value of the `field` element for `day_index`, or "" if absent.
    pub fn get_reading(&self, field: &str, day_index: u32) -> String {
        self.period(day_index)
            .and_then(|p| p.fields.get(field))
            .map(|value| truncate_field(value))
            .unwrap_or_default()
    }

    /// Local start time of the period `day_index`.
    pub fn get_period_start(&self, day_index: u32) -> Result<String, BomError> {
        let period = self.period(day_index).ok_or_else(|| {
            BomError::Lookup(format!(
                "no forecast period {} for area '{}' in {}",
                day_index, self.product_aac, self.product_id
            ))
        })?;
        period.start_time_local.clone().ok_or_else(|| {
            BomError::Lookup(format!("forecast period {} has no start-time-local", day_index))
        })
    }

    /// Next routine issue time, or "n/a".
    pub fn get_issue_time(&self) -> String {
        self.document
            .as_ref()
            .and_then(|d| d.next_issue_time.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Data retrieval from the BOM public feeds.
//!
//! - `transport` — blocking HTTP and FTP seams
//! - `observations` — per-station current observations (JSON over HTTP)
//! - `forecast` — per-product précis forecasts (XML over FTP)

pub mod forecast;
pub mod observations;
pub mod transport;

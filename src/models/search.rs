//! Search request and response types.
//!
//! This module defines:
//! - `Region`: supported marketplaces and their upstream site identifiers
//! - `SearchRequest`: a search payload that passed validation
//! - `SearchResponse`: response body returned to clients

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

/// Supported marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    At,
    De,
    Es,
    Fr,
    It,
    Uk,
}

impl Region {
    /// All regions in the order they are listed to callers.
    pub const ALL: [Region; 6] = [
        Region::At,
        Region::De,
        Region::Es,
        Region::Fr,
        Region::It,
        Region::Uk,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Region::At => "AT",
            Region::De => "DE",
            Region::Es => "ES",
            Region::Fr => "FR",
            Region::It => "IT",
            Region::Uk => "UK",
        }
    }

    /// Upstream `siteID` for this marketplace.
    pub fn site_id(&self) -> u32 {
        match self {
            Region::At => 2,
            Region::De => 1,
            Region::Es => 11,
            Region::Fr => 4,
            Region::It => 10,
            Region::Uk => 3,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|region| region.code() == s)
            .ok_or(())
    }
}

/// A search payload that passed validation.
///
/// Only `services::validator::validate` produces values of this type, so every
/// instance satisfies the field rules: `limit` in 1..=100 and a supported region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub limit: u8,
    pub min_price: i64,
    pub max_price: i64,
    pub include_categories: Vec<String>,
    pub sort: String,
    pub region: Region,
}

/// Payload used by the public search route: fixed filters, caller-chosen region.
///
/// The region stays untyped so that unknown codes go through the same validation as
/// gated requests.
pub fn sample_payload(region: &str) -> Value {
    json!({
        "limit": 10,
        "minPrice": 10,
        "maxPrice": 2000,
        "includeCategories": ["3686"],
        "sort": "RELEVANCE",
        "region": region,
    })
}

/// Response body for successful searches.
///
/// # JSON Example
///
/// ```json
/// {
///   "success": true,
///   "processingTimeMs": 412.57,
///   "data": [{ "itemId": "123", "name": "...", "url": "..." }]
/// }
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub processing_time_ms: f64,
    pub data: Vec<Value>,
}

impl SearchResponse {
    pub fn new(processing_time_ms: f64, data: Vec<Value>) -> Self {
        Self {
            success: true,
            processing_time_ms,
            data,
        }
    }
}

/// Elapsed milliseconds rounded to two decimals.
pub fn elapsed_ms(started: std::time::Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

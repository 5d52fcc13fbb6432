//! Per-point sea-surface-temperature lookups with positive and negative
//! caching.
//!
//! The SST grid is served by an expensive, rate-limited upstream, so each
//! snapped location is fetched at most once per cache window: a success is
//! held for six hours, a failure for one hour, and a live failure entry
//! answers "no data" without any network I/O at all.

use crate::cache::{Clock, PointCache, PointLookup, SystemClock};
use crate::model::error::ModelError;
use chrono::Duration;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Default griddap endpoint for the 0.25° OISST analysis.
pub const DEFAULT_SST_URL: &str =
    "https://coastwatch.pfeg.noaa.gov/erddap/griddap/ncdcOisst21Agg_LonPM180";

/// Native resolution of the SST source grid; cache keys snap to it so nearby
/// queries share one entry.
pub const SST_RESOLUTION_DEG: f64 = 0.25;

/// Positive cache TTL. The analysis updates daily, six hours is plenty.
pub const SST_TTL_HOURS: i64 = 6;

/// Negative cache TTL: back off a failing upstream for an hour.
pub const SST_FAILURE_TTL_HOURS: i64 = 1;

pub struct SstSource {
    http: Client,
    base_url: String,
    cache: PointCache<f64>,
}

#[derive(Debug, Deserialize)]
struct SstResponse {
    table: SstTable,
}

#[derive(Debug, Deserialize)]
struct SstTable {
    #[serde(rename = "columnNames")]
    column_names: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

impl SstSource {
    pub fn new(http: Client) -> Self {
        Self::with_clock(http, DEFAULT_SST_URL, Arc::new(SystemClock))
    }

    pub fn with_clock(http: Client, base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        SstSource {
            http,
            base_url: base_url.into(),
            cache: PointCache::with_clock(
                SST_RESOLUTION_DEG,
                Duration::hours(SST_TTL_HOURS),
                Duration::hours(SST_FAILURE_TTL_HOURS),
                clock,
            ),
        }
    }

    /// Sea-surface temperature in Celsius near the given location, or `None`
    /// if the source has no value there (land, or a recently-failed fetch).
    pub async fn sea_surface_temp(&self, lat: f64, lon: f64) -> Option<f64> {
        match self.cache.lookup(lat, lon) {
            PointLookup::Hit(value) => Some(value),
            PointLookup::RecentFailure => {
                debug!("sst lookup ({lat}, {lon}): suppressed by negative cache");
                None
            }
            PointLookup::Miss => match self.fetch_point(lat, lon).await {
                Ok(Some(value)) => {
                    self.cache.record_success(lat, lon, value);
                    Some(value)
                }
                Ok(None) => {
                    // Land cell: cache as a failure so we do not re-ask.
                    self.cache.record_failure(lat, lon);
                    None
                }
                Err(err) => {
                    warn!("sst fetch ({lat}, {lon}) failed: {err}");
                    self.cache.record_failure(lat, lon);
                    None
                }
            },
        }
    }

    async fn fetch_point(&self, lat: f64, lon: f64) -> Result<Option<f64>, ModelError> {
        let url = format!(
            "{base}.json?sst[(last)][(0.0)][({lat})][({lon})]",
            base = self.base_url
        );
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ModelError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    ModelError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    ModelError::NetworkRequest(url, e)
                });
            }
        };
        let body = response
            .json::<SstResponse>()
            .await
            .map_err(|e| ModelError::Decode(url, e))?;

        let sst_idx = body
            .table
            .column_names
            .iter()
            .position(|name| name == "sst")
            .ok_or_else(|| ModelError::MissingColumn {
                column: "sst".to_string(),
            })?;
        Ok(body
            .table
            .rows
            .first()
            .and_then(|row| row.get(sst_idx))
            .and_then(serde_json::Value::as_f64))
    }
}

//! Global wave-model grid fetch over an ERDDAP griddap endpoint.
//!
//! The feed serves a gridded WAVEWATCH III product as a JSON table of
//! (time, depth, lat, lon, value) rows, with longitudes in the 0–360 frame
//! and its last column at 359.5°. Land cells carry null heights and are
//! skipped. Queries for a ±180-frame box spanning Greenwich are issued as two
//! sub-requests in the feed's native frame and concatenated; a box crossing
//! the antimeridian is contiguous in 0–360 and fetches in one request.

use crate::model::error::ModelError;
use crate::types::grid::{round2, GridBounds, GridPoint};
use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default griddap endpoint for the global WAVEWATCH III product.
pub const DEFAULT_MODEL_URL: &str =
    "https://pae-paha.pacioos.hawaii.edu/erddap/griddap/ww3_global";

/// Source tag carried by model-derived grid rows.
pub const MODEL_SOURCE: &str = "wavewatch3_erddap";

/// Grid stride: every 4th cell of the native 0.5 degree grid keeps payloads
/// tractable at global extent.
const DEFAULT_STRIDE: u32 = 4;

/// The feed's easternmost longitude column in its native frame.
const ERDDAP_MAX_LON: f64 = 359.5;

/// Model fetches move far more data than a buoy feed; give them a longer
/// per-request timeout than the client default.
const MODEL_TIMEOUT: Duration = Duration::from_secs(120);

pub struct WaveModelClient {
    http: Client,
    base_url: String,
    stride: u32,
}

#[derive(Debug, Deserialize)]
struct ErddapResponse {
    table: ErddapTable,
}

#[derive(Debug, Deserialize)]
struct ErddapTable {
    #[serde(rename = "columnNames")]
    column_names: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

impl WaveModelClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_MODEL_URL)
    }

    pub fn with_base_url(http: Client, base_url: impl Into<String>) -> Self {
        WaveModelClient {
            http,
            base_url: base_url.into(),
            stride: DEFAULT_STRIDE,
        }
    }

    /// Fetch wave height/direction/period for `bounds`, tagged with the given
    /// run timestamp. Splits into the feed's native longitude ranges as
    /// needed and concatenates the parts.
    pub async fn fetch_grid(
        &self,
        bounds: &GridBounds,
        run: DateTime<Utc>,
    ) -> Result<Vec<GridPoint>, ModelError> {
        let mut points = Vec::new();
        for (min_lon, max_lon) in erddap_lon_ranges(bounds) {
            let part = self
                .fetch_region(bounds.min_lat, bounds.max_lat, min_lon, max_lon, run)
                .await?;
            points.extend(part);
        }
        info!("fetched {} wave-model grid points", points.len());
        Ok(points)
    }

    async fn fetch_region(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        run: DateTime<Utc>,
    ) -> Result<Vec<GridPoint>, ModelError> {
        let dims = format!(
            "[(last)][(0.0)][({min_lat}):{stride}:({max_lat})][({min_lon}):{stride}:({max_lon})]",
            stride = self.stride
        );
        let url = format!(
            "{base}.json?Thgt{dims},Tdir{dims},Tper{dims}",
            base = self.base_url
        );

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .timeout(MODEL_TIMEOUT)
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
            .json::<ErddapResponse>()
            .await
            .map_err(|e| ModelError::Decode(url, e))?;
        parse_table(&body.table, run)
    }
}

/// Translate a ±180-frame box into the feed's native 0–360 longitude ranges.
fn erddap_lon_ranges(bounds: &GridBounds) -> Vec<(f64, f64)> {
    let to_erddap = |lon: f64| if lon < 0.0 { lon + 360.0 } else { lon };

    if bounds.crosses_antimeridian() {
        // Contiguous in the 0–360 frame: 170 → −170 is simply 170 → 190.
        vec![(to_erddap(bounds.min_lon), to_erddap(bounds.max_lon))]
    } else if bounds.min_lon < 0.0 && bounds.max_lon > 0.0 {
        // Spans Greenwich, which is the seam of the native frame: fetch the
        // western part up to the feed's last column, then the eastern part.
        vec![
            (bounds.min_lon + 360.0, ERDDAP_MAX_LON),
            (0.0, bounds.max_lon),
        ]
    } else {
        vec![(to_erddap(bounds.min_lon), to_erddap(bounds.max_lon))]
    }
}

fn parse_table(table: &ErddapTable, run: DateTime<Utc>) -> Result<Vec<GridPoint>, ModelError> {
    let index_of = |column: &str| {
        table
            .column_names
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| ModelError::MissingColumn {
                column: column.to_string(),
            })
    };
    let lat_idx = index_of("latitude")?;
    let lon_idx = index_of("longitude")?;
    let hgt_idx = index_of("Thgt")?;
    let dir_idx = index_of("Tdir")?;
    let per_idx = index_of("Tper")?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        let number = |idx: usize| row.get(idx).and_then(serde_json::Value::as_f64);

        // Land cells have no height; drop the whole row.
        let Some(height) = number(hgt_idx) else {
            skipped += 1;
            continue;
        };
        let (Some(lat), Some(mut lon)) = (number(lat_idx), number(lon_idx)) else {
            skipped += 1;
            continue;
        };
        if lon > 180.0 {
            lon -= 360.0;
        }

        points.push(GridPoint {
            lat: round2(lat),
            lon: round2(lon),
            wave_height: Some(round2(height)),
            wave_direction: number(dir_idx).map(|d| d.round()),
            wave_period: number(per_idx).map(|p| (p * 10.0).round() / 10.0),
            source: MODEL_SOURCE.to_string(),
            model_run: Some(run),
            computed_at: run,
        });
    }
    if skipped > 0 {
        warn!("skipped {skipped} model cells without wave height");
    }
    Ok(points)
}

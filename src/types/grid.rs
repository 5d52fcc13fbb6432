//! Grid rows, geographic bounds and coordinate snapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographical coordinate: latitude first, longitude second, both `f64`
/// decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// One cell of the stored wave field.
///
/// Uniquely identified by `(lat, lon)`: that pair is the upsert conflict key
/// in the row store, so writing a point at existing coordinates replaces the
/// previous row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    /// Latitude rounded to two decimals.
    pub lat: f64,
    /// Longitude rounded to two decimals.
    pub lon: f64,
    pub wave_height: Option<f64>,
    pub wave_direction: Option<f64>,
    pub wave_period: Option<f64>,
    /// Which pipeline produced this row (e.g. "buoy_idw", "wavewatch3_erddap").
    pub source: String,
    /// Model run this row derives from; `None` for observation-derived rows.
    pub model_run: Option<DateTime<Utc>>,
    /// Single shared timestamp for every row of one build cycle.
    pub computed_at: DateTime<Utc>,
}

/// A latitude/longitude bounding box in the ±180 longitude frame.
///
/// A box that crosses the antimeridian is expressed with `min_lon > max_lon`
/// (e.g. 170 → −170); [`GridBounds::split_antimeridian`] turns it into two
/// ordinary boxes for range-filtered storage queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GridBounds {
    /// The full band the wave model covers.
    pub const GLOBAL: GridBounds = GridBounds {
        min_lat: -77.5,
        max_lat: 77.5,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        GridBounds {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        }
    }

    /// Split into at most two boxes with ordinary `min_lon <= max_lon`
    /// longitude ranges. The second box is present only when the bounds cross
    /// the antimeridian.
    pub fn split_antimeridian(&self) -> (GridBounds, Option<GridBounds>) {
        if !self.crosses_antimeridian() {
            return (*self, None);
        }
        let west = GridBounds::new(self.min_lat, self.max_lat, self.min_lon, 180.0);
        let east = GridBounds::new(self.min_lat, self.max_lat, -180.0, self.max_lon);
        (west, Some(east))
    }
}

/// Round to two decimals, the storage resolution for grid coordinates and
/// interpolated magnitudes.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

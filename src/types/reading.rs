//! A single buoy observation, normalised from the per-station realtime feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation cycle from one station.
///
/// Every measurement field is optional: buoys routinely report only a subset
/// of their sensors, and out-of-range values are nulled at parse time rather
/// than carried forward. Superseded readings are never mutated; a newer
/// reading for the same station simply replaces the older one downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station_id: String,
    pub lat: f64,
    pub lon: f64,
    /// Significant wave height, metres.
    pub wave_height: Option<f64>,
    /// Mean wave direction, degrees true in [0, 360).
    pub wave_direction: Option<f64>,
    /// Dominant wave period, seconds.
    pub wave_period: Option<f64>,
    /// Average wave period, seconds.
    pub average_period: Option<f64>,
    /// Wind speed, m/s.
    pub wind_speed: Option<f64>,
    /// Wind direction, degrees true in [0, 360).
    pub wind_direction: Option<f64>,
    /// Wind gust, m/s.
    pub wind_gust: Option<f64>,
    /// Sea-surface temperature, Celsius.
    pub water_temp: Option<f64>,
    /// Air temperature, Celsius.
    pub air_temp: Option<f64>,
    /// Sea-level pressure, hPa.
    pub pressure: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    /// A reading with neither wave height nor wave direction contributes
    /// nothing to a wave field and must be dropped before interpolation.
    pub fn usable_for_interpolation(&self) -> bool {
        self.wave_height.is_some() || self.wave_direction.is_some()
    }

    /// Whether any measurement field carries a value at all.
    pub fn has_any_observation(&self) -> bool {
        self.wave_height.is_some()
            || self.wave_direction.is_some()
            || self.wave_period.is_some()
            || self.average_period.is_some()
            || self.wind_speed.is_some()
            || self.wind_direction.is_some()
            || self.wind_gust.is_some()
            || self.water_temp.is_some()
            || self.air_temp.is_some()
            || self.pressure.is_some()
    }
}

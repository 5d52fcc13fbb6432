//! Data structures for observation stations (moored buoys, coastal platforms,
//! tsunami stations, research moorings) and their capability metadata.

use serde::{Deserialize, Serialize};

/// A single observation station from the active-stations feed.
///
/// Stations are replaced wholesale on every registry refresh; there are no
/// partial updates to individual records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Stable upstream identifier (e.g. "46026").
    pub id: String,
    /// Latitude in decimal degrees, positive north.
    pub lat: f64,
    /// Longitude in decimal degrees, positive east.
    pub lon: f64,
    /// Human-readable station name.
    pub name: String,
    /// Operating organisation.
    pub owner: String,
    /// Classified platform type, see [`StationType::classify`].
    pub station_type: StationType,
    /// Reports meteorological observations.
    pub has_met: bool,
    /// Reports ocean current observations.
    pub has_currents: bool,
    /// Reports water-quality observations.
    pub has_water_quality: bool,
}

impl Station {
    /// Whether the station's coordinates fall in the valid lat/lon ranges.
    ///
    /// The feed occasionally carries placeholder coordinates; anything outside
    /// [-90, 90] x [-180, 180] is unusable for mapping or interpolation.
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::Met => self.has_met,
            Capability::Currents => self.has_currents,
            Capability::WaterQuality => self.has_water_quality,
        }
    }
}

/// Sensor capability flags advertised by the station feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Met,
    Currents,
    WaterQuality,
}

/// Platform type, classified from the feed's free-text type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    Buoy,
    Fixed,
    Dart,
    Tao,
    Usv,
    Other,
}

impl StationType {
    /// Best-effort classification of the free-text type field.
    ///
    /// Case-insensitive substring match against a known vocabulary. Specific
    /// classes are checked before the generic "buoy" keyword, so "DART buoy"
    /// classifies as [`StationType::Dart`]. Unknown text maps to
    /// [`StationType::Other`].
    pub fn classify(raw: &str) -> Self {
        let text = raw.to_ascii_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if contains_any(&["dart", "tsunami"]) {
            StationType::Dart
        } else if contains_any(&["tao", "pirata", "rama"]) {
            StationType::Tao
        } else if contains_any(&["usv", "glider", "sail"]) {
            StationType::Usv
        } else if contains_any(&["fixed", "c-man", "land"]) {
            StationType::Fixed
        } else if text.contains("buoy") {
            StationType::Buoy
        } else {
            StationType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Buoy => "buoy",
            StationType::Fixed => "fixed",
            StationType::Dart => "dart",
            StationType::Tao => "tao",
            StationType::Usv => "usv",
            StationType::Other => "other",
        }
    }
}

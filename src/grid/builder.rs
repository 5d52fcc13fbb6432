//! Builds a regular wave-field lattice from point observations.

use crate::interpolate::{ReadingIndex, DEFAULT_MAX_DISTANCE_KM};
use crate::types::grid::{round2, GridPoint, LatLon};
use crate::types::reading::Reading;
use chrono::{DateTime, Utc};
use log::debug;
use ordered_float::OrderedFloat;
use std::collections::{HashMap, HashSet};

/// Default lattice step in degrees.
pub const DEFAULT_RESOLUTION_DEG: f64 = 2.0;

/// Source tag for observation-derived grid rows.
pub const BUOY_GRID_SOURCE: &str = "buoy_idw";

/// Latitude band the lattice sweeps. Buoy coverage thins out fast towards the
/// poles; beyond this band only injected station points remain.
const LAT_BAND: (f64, f64) = (-60.0, 60.0);

/// Interpolate a regular lattice over the full longitude range and the
/// configured latitude band, then inject every reading's exact location
/// (rounded to two decimals) unless the nearest lattice cell already holds a
/// point within half a step on both axes; instrumented locations keep their
/// point accuracy without duplicating adjacent cells.
///
/// Cells where nothing interpolates (no reading within range) are simply
/// absent from the result. Every emitted point carries the single
/// `computed_at` supplied by the caller, so one build cycle is atomically
/// distinguishable from the next.
pub fn build_grid(
    readings: &[Reading],
    resolution_deg: f64,
    computed_at: DateTime<Utc>,
) -> Vec<GridPoint> {
    let usable: Vec<Reading> = readings
        .iter()
        .filter(|r| r.usable_for_interpolation())
        .cloned()
        .collect();
    if usable.is_empty() {
        return Vec::new();
    }
    let index = ReadingIndex::new(&usable);

    let (lat0, lat1) = LAT_BAND;
    let n_lat = ((lat1 - lat0) / resolution_deg).round() as i64;
    let n_lon = (360.0 / resolution_deg).round() as i64;

    let mut points = Vec::new();
    let mut occupied_cells: HashSet<(i64, i64)> = HashSet::new();

    for i in 0..=n_lat {
        let lat = lat0 + i as f64 * resolution_deg;
        for j in 0..n_lon {
            let lon = -180.0 + j as f64 * resolution_deg;
            if let Some(value) = index.interpolate(LatLon(lat, lon), DEFAULT_MAX_DISTANCE_KM) {
                occupied_cells.insert((i, j));
                points.push(GridPoint {
                    lat: round2(lat),
                    lon: round2(lon),
                    wave_height: value.wave_height,
                    wave_direction: value.wave_direction,
                    wave_period: value.wave_period,
                    source: BUOY_GRID_SOURCE.to_string(),
                    model_run: None,
                    computed_at,
                });
            }
        }
    }
    let lattice_count = points.len();

    for reading in &usable {
        let i = ((reading.lat - lat0) / resolution_deg).round();
        // Longitude wraps: the nearest cell to 179.9° at a 2° step is −180°.
        let j = (((reading.lon + 180.0) / resolution_deg).round() as i64).rem_euclid(n_lon);
        let nearest_cell_taken = i >= 0.0
            && i <= n_lat as f64
            && occupied_cells.contains(&(i as i64, j));
        if nearest_cell_taken {
            continue;
        }
        points.push(GridPoint {
            lat: round2(reading.lat),
            lon: round2(reading.lon),
            wave_height: reading.wave_height.map(round2),
            wave_direction: reading.wave_direction.map(round2),
            wave_period: reading.wave_period.map(round2),
            source: BUOY_GRID_SOURCE.to_string(),
            model_run: None,
            computed_at,
        });
    }

    debug!(
        "built grid: {} lattice points, {} injected station points",
        lattice_count,
        points.len() - lattice_count
    );

    // (lat, lon) is the storage conflict key; collapse duplicates here so one
    // upsert batch never writes the same cell twice. Later entries win.
    let mut by_coord: HashMap<(OrderedFloat<f64>, OrderedFloat<f64>), GridPoint> =
        HashMap::with_capacity(points.len());
    for point in points {
        by_coord.insert((OrderedFloat(point.lat), OrderedFloat(point.lon)), point);
    }
    let mut result: Vec<GridPoint> = by_coord.into_values().collect();
    result.sort_by_key(|p| (OrderedFloat(p.lat), OrderedFloat(p.lon)));
    result
}

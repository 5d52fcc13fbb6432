//! Inverse-distance-weighted interpolation of sparse buoy observations.
//!
//! Pure, synchronous computation: no I/O, no awaits. The grid builder calls
//! this once per lattice cell, so [`ReadingIndex`] provides an R-tree
//! preselection that narrows each cell to its plausible candidates before the
//! exact great-circle filter runs.

use crate::types::grid::{round2, LatLon};
use crate::types::reading::Reading;
use haversine::{distance, Location, Units};
use rstar::{RTree, RTreeObject, AABB};

/// Locality cutoff for interpolation, kilometres. Distant observations are
/// discarded outright rather than down-weighted: a global smoothing would
/// erase exactly the regional variation this field exists to show.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 400.0;

/// Kilometres per degree of latitude, used for conservative envelope sizing.
const KM_PER_DEG: f64 = 110.574;

/// An interpolated wave state at one query point.
///
/// Each field is averaged only over the in-range readings that actually
/// supply it, with its own weight accumulator, since buoys report height
/// direction and period independently of one another.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    pub wave_height: Option<f64>,
    pub wave_direction: Option<f64>,
    pub wave_period: Option<f64>,
}

/// Interpolate a wave state at `query` from point observations.
///
/// Inverse-square weighting over great-circle (haversine) distance, with the
/// squared distance clamped to 1 km² so near-coincident readings cannot blow
/// up the weight. Wave direction is circular: weighted sine/cosine components
/// are accumulated and recombined with `atan2`, so readings straddling the
/// 0°/360° wrap average correctly (350° and 10° yield ~0°, not ~180°).
///
/// Returns `None` when no reading lies within `max_distance_km`; the caller
/// must skip that query point, never substitute a default.
pub fn interpolate(
    query: LatLon,
    readings: &[Reading],
    max_distance_km: f64,
) -> Option<Interpolated> {
    interpolate_over(query, readings.iter(), max_distance_km)
}

fn interpolate_over<'r>(
    query: LatLon,
    readings: impl Iterator<Item = &'r Reading>,
    max_distance_km: f64,
) -> Option<Interpolated> {
    let mut in_range = 0usize;
    let mut height_weight = 0.0;
    let mut height_sum = 0.0;
    let mut dir_weight = 0.0;
    let mut dir_sin = 0.0;
    let mut dir_cos = 0.0;
    let mut period_weight = 0.0;
    let mut period_sum = 0.0;

    for reading in readings {
        let dist_km = distance(
            Location {
                latitude: query.0,
                longitude: query.1,
            },
            Location {
                latitude: reading.lat,
                longitude: reading.lon,
            },
            Units::Kilometers,
        );
        if dist_km > max_distance_km {
            continue;
        }
        in_range += 1;

        let weight = 1.0 / (dist_km * dist_km).max(1.0);

        if let Some(height) = reading.wave_height {
            height_weight += weight;
            height_sum += weight * height;
        }
        if let Some(direction) = reading.wave_direction {
            let theta = direction.to_radians();
            dir_weight += weight;
            dir_sin += weight * theta.sin();
            dir_cos += weight * theta.cos();
        }
        if let Some(period) = reading.wave_period {
            period_weight += weight;
            period_sum += weight * period;
        }
    }

    if in_range == 0 {
        return None;
    }

    let wave_height = (height_weight > 0.0).then(|| round2(height_sum / height_weight));
    let wave_direction = (dir_weight > 0.0).then(|| {
        let mut degrees = dir_sin.atan2(dir_cos).to_degrees();
        degrees = degrees.rem_euclid(360.0);
        let rounded = round2(degrees);
        if rounded >= 360.0 {
            0.0
        } else {
            rounded
        }
    });
    let wave_period = (period_weight > 0.0).then(|| round2(period_sum / period_weight));

    Some(Interpolated {
        wave_height,
        wave_direction,
        wave_period,
    })
}

/// R-tree index over a reading set, for repeated interpolation across a
/// dense lattice.
///
/// Candidates are preselected with a degree envelope sized conservatively
/// from the distance cutoff, then the exact haversine filter inside
/// [`interpolate`] decides. Envelopes that spill past ±180° longitude are
/// wrapped into a second query so the index agrees with great-circle
/// distances at the dateline.
pub struct ReadingIndex<'a> {
    readings: &'a [Reading],
    tree: RTree<ReadingPos>,
}

struct ReadingPos {
    lat: f64,
    lon: f64,
    idx: usize,
}

impl RTreeObject for ReadingPos {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lon])
    }
}

impl<'a> ReadingIndex<'a> {
    pub fn new(readings: &'a [Reading]) -> Self {
        let positions = readings
            .iter()
            .enumerate()
            .map(|(idx, r)| ReadingPos {
                lat: r.lat,
                lon: r.lon,
                idx,
            })
            .collect();
        ReadingIndex {
            readings,
            tree: RTree::bulk_load(positions),
        }
    }

    pub fn interpolate(&self, query: LatLon, max_distance_km: f64) -> Option<Interpolated> {
        let LatLon(lat, lon) = query;
        let dlat = max_distance_km / KM_PER_DEG;
        // Longitude degrees shrink towards the poles; clamp the cosine so the
        // envelope stays finite, and cap the half-width at a full hemisphere.
        let cos_lat = lat.to_radians().cos().max(0.01);
        let dlon = (max_distance_km / (KM_PER_DEG * cos_lat)).min(180.0);

        let mut candidates: Vec<&Reading> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_corners(
                [lat - dlat, lon - dlon],
                [lat + dlat, lon + dlon],
            ))
            .map(|p| &self.readings[p.idx])
            .collect();

        if dlon < 180.0 {
            if lon - dlon < -180.0 {
                candidates.extend(
                    self.tree
                        .locate_in_envelope_intersecting(&AABB::from_corners(
                            [lat - dlat, lon - dlon + 360.0],
                            [lat + dlat, 180.0],
                        ))
                        .map(|p| &self.readings[p.idx]),
                );
            }
            if lon + dlon > 180.0 {
                candidates.extend(
                    self.tree
                        .locate_in_envelope_intersecting(&AABB::from_corners(
                            [lat - dlat, -180.0],
                            [lat + dlat, lon + dlon - 360.0],
                        ))
                        .map(|p| &self.readings[p.idx]),
                );
            }
        }

        interpolate_over(query, candidates.into_iter(), max_distance_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(
        lat: f64,
        lon: f64,
        height: Option<f64>,
        direction: Option<f64>,
        period: Option<f64>,
    ) -> Reading {
        Reading {
            station_id: format!("t-{lat}-{lon}"),
            lat,
            lon,
            wave_height: height,
            wave_direction: direction,
            wave_period: period,
            average_period: None,
            wind_speed: None,
            wind_direction: None,
            wind_gust: None,
            water_temp: None,
            air_temp: None,
            pressure: None,
            observed_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn nothing_in_range_yields_none() {
        let readings = vec![reading(0.0, 0.0, Some(2.0), Some(180.0), Some(12.0))];
        // Query ~2200 km away.
        assert_eq!(interpolate(LatLon(20.0, 0.0), &readings, 400.0), None);
        assert_eq!(interpolate(LatLon(20.0, 0.0), &[], 400.0), None);
    }

    #[test]
    fn single_reading_passes_through_unchanged() {
        let readings = vec![reading(10.0, 20.0, Some(1.73), Some(245.0), Some(9.1))];
        let result = interpolate(LatLon(10.5, 20.5), &readings, 400.0)
            .expect("reading is within range");
        assert_eq!(result.wave_height, Some(1.73));
        assert_eq!(result.wave_direction, Some(245.0));
        assert_eq!(result.wave_period, Some(9.1));
    }

    #[test]
    fn equal_weights_average_height_and_direction() {
        // Both readings ~222 km from the query, equal weights.
        let readings = vec![
            reading(0.0, 0.0, Some(1.0), Some(0.0), Some(10.0)),
            reading(0.0, 4.0, Some(3.0), Some(90.0), None),
        ];
        let result = interpolate(LatLon(0.0, 2.0), &readings, 400.0)
            .expect("both readings are within range");

        assert_eq!(result.wave_height, Some(2.0));
        let dir = result.wave_direction.expect("both supply direction");
        assert!((dir - 45.0).abs() < 0.5, "expected ~45 degrees, got {dir}");
        // Only one reading carries a period, so it passes through.
        assert_eq!(result.wave_period, Some(10.0));
    }

    #[test]
    fn direction_averages_across_the_north_wrap() {
        let readings = vec![
            reading(0.0, -1.0, Some(1.0), Some(350.0), None),
            reading(0.0, 1.0, Some(1.0), Some(10.0), None),
        ];
        let dir = interpolate(LatLon(0.0, 0.0), &readings, 400.0)
            .and_then(|r| r.wave_direction)
            .expect("direction available");
        // Must land near 0, never near 180.
        assert!(dir < 1.0 || dir > 359.0, "expected ~0 degrees, got {dir}");
    }

    #[test]
    fn direction_is_always_in_range() {
        let cases = [
            (Some(359.9), Some(0.1)),
            (Some(180.0), Some(180.0)),
            (Some(90.0), Some(270.1)),
        ];
        for (a, b) in cases {
            let readings = vec![
                reading(0.0, -0.5, Some(1.0), a, None),
                reading(0.0, 0.5, Some(1.0), b, None),
            ];
            let dir = interpolate(LatLon(0.0, 0.0), &readings, 400.0)
                .and_then(|r| r.wave_direction)
                .expect("direction available");
            assert!((0.0..360.0).contains(&dir), "direction {dir} out of range");
        }
    }

    #[test]
    fn near_coincident_readings_do_not_blow_up() {
        let readings = vec![
            reading(0.0, 0.0, Some(1.0), None, None),
            reading(0.0, 0.0001, Some(3.0), None, None),
        ];
        let height = interpolate(LatLon(0.0, 0.0), &readings, 400.0)
            .and_then(|r| r.wave_height)
            .expect("height available");
        // Clamped weights make the two readings roughly equal contributors.
        assert!((1.0..=3.0).contains(&height));
        assert!(height.is_finite());
    }

    #[test]
    fn closer_readings_dominate() {
        let readings = vec![
            reading(0.0, 0.5, Some(1.0), None, None),
            reading(0.0, 3.0, Some(5.0), None, None),
        ];
        let height = interpolate(LatLon(0.0, 0.0), &readings, 400.0)
            .and_then(|r| r.wave_height)
            .expect("height available");
        assert!(height < 2.0, "near reading should dominate, got {height}");
    }

    #[test]
    fn index_matches_plain_interpolation() {
        let readings = vec![
            reading(0.0, 0.0, Some(1.0), Some(0.0), Some(10.0)),
            reading(0.0, 4.0, Some(3.0), Some(90.0), None),
            reading(45.0, 100.0, Some(6.0), Some(200.0), Some(15.0)),
        ];
        let index = ReadingIndex::new(&readings);
        for query in [LatLon(0.0, 2.0), LatLon(45.0, 101.0), LatLon(-30.0, 50.0)] {
            assert_eq!(
                index.interpolate(query, 400.0),
                interpolate(query, &readings, 400.0),
                "index and plain scan disagree at {query:?}"
            );
        }
    }

    #[test]
    fn index_finds_candidates_across_the_dateline() {
        let readings = vec![reading(0.0, 179.5, Some(2.5), Some(90.0), None)];
        let index = ReadingIndex::new(&readings);
        let result = index.interpolate(LatLon(0.0, -179.9), 400.0);
        assert_eq!(result, interpolate(LatLon(0.0, -179.9), &readings, 400.0));
        assert_eq!(result.and_then(|r| r.wave_height), Some(2.5));
    }
}

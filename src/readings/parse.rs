//! Parser for the per-station realtime observation feed.
//!
//! The feed is fixed-vocabulary whitespace-separated text: a `#`-prefixed
//! header line, a units line, then observation rows newest-first. Missing
//! measurements are marked `MM`. Example:
//!
//! ```text
//! #YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
//! #yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
//! 2024 06 01 12 40 310  7.0  9.0   1.5    12   6.8 290 1014.2  15.0  13.1  11.2   MM   MM    MM
//! ```

use crate::readings::error::ReadingError;
use crate::types::reading::Reading;
use crate::types::station::Station;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

/// Plausibility ranges for marine observations; values outside them are
/// sensor glitches and are nulled rather than stored.
const WAVE_HEIGHT_M: (f64, f64) = (0.0, 30.0);
const WAVE_PERIOD_S: (f64, f64) = (1.0, 30.0);
const DIRECTION_DEG: (f64, f64) = (0.0, 360.0);
const WIND_SPEED_MS: (f64, f64) = (0.0, 100.0);
const WIND_GUST_MS: (f64, f64) = (0.0, 150.0);
const WATER_TEMP_C: (f64, f64) = (-5.0, 40.0);
const AIR_TEMP_C: (f64, f64) = (-60.0, 60.0);
const PRESSURE_HPA: (f64, f64) = (850.0, 1100.0);

/// Parse the newest observation row of a station's realtime feed.
///
/// Individual unparsable or implausible fields become `None`; only a feed
/// with no data rows or no usable timestamp is an error (and that error
/// drops just this station, not the batch).
pub(crate) fn parse_realtime(station: &Station, body: &str) -> Result<Reading, ReadingError> {
    let lines: Vec<&str> = body.trim().lines().collect();
    if lines.len() < 3 {
        return Err(ReadingError::TruncatedFeed {
            station: station.id.clone(),
        });
    }

    let header: Vec<&str> = lines[0].trim_start_matches('#').split_whitespace().collect();
    let values: Vec<&str> = lines[2].split_whitespace().collect();
    let row: HashMap<&str, &str> = header.into_iter().zip(values).collect();

    let field = |key: &str| parse_field(row.get(key).copied());
    let bounded = |key: &str, range: (f64, f64)| in_range(field(key), range);

    let observed_at = (|| {
        // Older feeds use a two-digit year column.
        let mut year = field("YY").or_else(|| field("YYYY"))? as i32;
        if year < 100 {
            year += 2000;
        }
        let month = field("MM")? as u32;
        let day = field("DD")? as u32;
        let hour = field("hh")? as u32;
        let minute = field("mm")? as u32;
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single()
    })()
    .ok_or_else(|| ReadingError::MissingTimestamp {
        station: station.id.clone(),
    })?;

    Ok(Reading {
        station_id: station.id.clone(),
        lat: station.lat,
        lon: station.lon,
        wave_height: bounded("WVHT", WAVE_HEIGHT_M),
        wave_direction: normalize_direction(bounded("MWD", DIRECTION_DEG)),
        wave_period: bounded("DPD", WAVE_PERIOD_S),
        average_period: bounded("APD", WAVE_PERIOD_S),
        wind_speed: bounded("WSPD", WIND_SPEED_MS),
        wind_direction: normalize_direction(bounded("WDIR", DIRECTION_DEG)),
        wind_gust: bounded("GST", WIND_GUST_MS),
        water_temp: bounded("WTMP", WATER_TEMP_C),
        air_temp: bounded("ATMP", AIR_TEMP_C),
        pressure: bounded("PRES", PRESSURE_HPA),
        observed_at,
    })
}

fn parse_field(raw: Option<&str>) -> Option<f64> {
    match raw {
        None | Some("MM") | Some("N/A") | Some("") => None,
        Some(value) => value.parse::<f64>().ok(),
    }
}

fn in_range(value: Option<f64>, (min, max): (f64, f64)) -> Option<f64> {
    value.filter(|v| (min..=max).contains(v))
}

/// The feed reports 360 for due north; fold it onto 0 so directions stay in
/// [0, 360).
fn normalize_direction(value: Option<f64>) -> Option<f64> {
    value.map(|v| if v >= 360.0 { v - 360.0 } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station::StationType;

    fn station() -> Station {
        Station {
            id: "46026".to_string(),
            lat: 37.759,
            lon: -122.833,
            name: "San Francisco".to_string(),
            owner: "NDBC".to_string(),
            station_type: StationType::Buoy,
            has_met: true,
            has_currents: false,
            has_water_quality: false,
        }
    }

    const FEED: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 06 01 12 40 310  7.0  9.0   1.5    12   6.8 290 1014.2  15.0  13.1  11.2   MM   MM    MM
2024 06 01 11 40 305  6.5  8.0   1.4    11   6.5 285 1014.8  14.8  13.1  11.0   MM   MM    MM";

    #[test]
    fn parses_latest_row() {
        let reading = parse_realtime(&station(), FEED).expect("feed parses");
        assert_eq!(reading.station_id, "46026");
        assert_eq!(reading.wave_height, Some(1.5));
        assert_eq!(reading.wave_direction, Some(290.0));
        assert_eq!(reading.wave_period, Some(12.0));
        assert_eq!(reading.average_period, Some(6.8));
        assert_eq!(reading.wind_speed, Some(7.0));
        assert_eq!(reading.wind_direction, Some(310.0));
        assert_eq!(reading.wind_gust, Some(9.0));
        assert_eq!(reading.water_temp, Some(13.1));
        assert_eq!(reading.air_temp, Some(15.0));
        assert_eq!(reading.pressure, Some(1014.2));
        assert_eq!(
            reading.observed_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 40, 0).unwrap()
        );
    }

    #[test]
    fn missing_markers_become_none() {
        let feed = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 06 01 12 40  MM   MM  MM    MM    MM    MM  MM     MM    MM  13.1    MM   MM   MM    MM";
        let reading = parse_realtime(&station(), feed).expect("feed parses");
        assert_eq!(reading.wave_height, None);
        assert_eq!(reading.wind_speed, None);
        assert_eq!(reading.water_temp, Some(13.1));
        assert!(!reading.usable_for_interpolation());
    }

    #[test]
    fn implausible_values_are_nulled() {
        let feed = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 06 01 12 40 310 130.0 9.0  99.0    12   6.8 290  700.0  15.0  55.0  11.2  MM   MM    MM";
        let reading = parse_realtime(&station(), feed).expect("feed parses");
        // 99 m seas, 130 m/s wind, 700 hPa and 55 C water are sensor glitches.
        assert_eq!(reading.wave_height, None);
        assert_eq!(reading.wind_speed, None);
        assert_eq!(reading.pressure, None);
        assert_eq!(reading.water_temp, None);
        // The plausible fields survive.
        assert_eq!(reading.wave_period, Some(12.0));
        assert_eq!(reading.air_temp, Some(15.0));
    }

    #[test]
    fn two_digit_years_are_expanded() {
        let feed = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
24 06 01 12 40 310  7.0  9.0   1.5    12   6.8 290 1014.2  15.0  13.1  11.2   MM   MM    MM";
        let reading = parse_realtime(&station(), feed).expect("feed parses");
        assert_eq!(reading.observed_at.format("%Y").to_string(), "2024");
    }

    #[test]
    fn due_north_folds_to_zero() {
        let feed = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2024 06 01 12 40 360  7.0  9.0   1.5    12   6.8 360 1014.2  15.0  13.1  11.2   MM   MM    MM";
        let reading = parse_realtime(&station(), feed).expect("feed parses");
        assert_eq!(reading.wave_direction, Some(0.0));
        assert_eq!(reading.wind_direction, Some(0.0));
    }

    #[test]
    fn truncated_feed_is_an_error() {
        let err = parse_realtime(&station(), "#YY MM\n#yr mo").unwrap_err();
        assert!(matches!(err, ReadingError::TruncatedFeed { .. }));
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        let feed = "\
#YY  MM DD hh mm WDIR WSPD
#yr  mo dy hr mn degT m/s
MM MM MM MM MM 310 7.0";
        let err = parse_realtime(&station(), feed).unwrap_err();
        assert!(matches!(err, ReadingError::MissingTimestamp { .. }));
    }
}

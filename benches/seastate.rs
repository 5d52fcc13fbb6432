use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seastate::{build_grid, interpolate, LatLon, Reading};

/// Deterministic spread of synthetic buoys across the north-east Pacific.
fn synthetic_readings(n: usize) -> Vec<Reading> {
    let observed_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let k = i as f64;
            Reading {
                station_id: format!("bench-{i}"),
                lat: 20.0 + (k * 7.3) % 35.0,
                lon: -160.0 + (k * 11.7) % 45.0,
                wave_height: Some(0.5 + (k % 17.0) * 0.25),
                wave_direction: Some((k * 23.0) % 360.0),
                wave_period: (i % 3 != 0).then(|| 6.0 + (k % 9.0)),
                average_period: None,
                wind_speed: Some(3.0 + (k % 11.0)),
                wind_direction: Some((k * 31.0) % 360.0),
                wind_gust: None,
                water_temp: Some(12.0 + (k % 8.0)),
                air_temp: None,
                pressure: Some(1013.0),
                observed_at,
            }
        })
        .collect()
}

fn bench_engine(c: &mut Criterion) {
    let readings = synthetic_readings(200);
    let computed_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    c.bench_function("interpolate_point_200_readings", |b| {
        b.iter(|| {
            interpolate(
                black_box(LatLon(36.0, -140.0)),
                black_box(&readings),
                400.0,
            )
        })
    });
    c.bench_function("build_grid_2deg_200_readings", |b| {
        b.iter(|| build_grid(black_box(&readings), 2.0, computed_at))
    });
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);

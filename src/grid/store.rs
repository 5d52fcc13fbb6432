//! REST row-store client for the stations, readings and wave-grid tables.
//!
//! The store speaks a PostgREST-style interface: batch upsert with an
//! `on_conflict` key and a `Prefer` resolution header, filtered reads with an
//! explicit row limit, and filtered deletes. The engine treats it as a black
//! box; all mutations go through whole-row upsert, never in-place updates.

use crate::grid::error::GridStoreError;
use crate::types::grid::{round2, GridBounds, GridPoint};
use crate::types::reading::Reading;
use crate::types::station::Station;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};

/// Rows per upsert call. The store rejects oversized payloads, and a failed
/// batch should take down as little as possible.
pub const UPSERT_BATCH_SIZE: usize = 500;

/// The store's default page size. A bounded-region grid read must override it
/// or a global query silently truncates.
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Row cap for resolver-facing grid queries, sized for a full global grid.
pub const GRID_QUERY_LIMIT: usize = 50_000;

/// Row-store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub rest_url: String,
    pub service_key: String,
}

impl StoreConfig {
    /// Read connection settings from the environment. A missing variable is
    /// the one fatal configuration error in the engine: it aborts the cycle
    /// before any I/O happens.
    pub fn from_env() -> Result<Self, GridStoreError> {
        let rest_url = std::env::var("SEASTATE_DB_URL")
            .map_err(|_| GridStoreError::MissingConfig("SEASTATE_DB_URL"))?;
        let service_key = std::env::var("SEASTATE_DB_KEY")
            .map_err(|_| GridStoreError::MissingConfig("SEASTATE_DB_KEY"))?;
        Ok(StoreConfig {
            rest_url,
            service_key,
        })
    }
}

/// Read access to the stored wave grid, the seam the resolver consumes, so
/// fallback behaviour is testable without a live store.
#[async_trait]
pub trait GridQuery: Send + Sync {
    async fn query_bounds(&self, bounds: &GridBounds) -> Result<Vec<GridPoint>, GridStoreError>;
}

pub struct GridStore {
    http: Client,
    rest_url: String,
    service_key: String,
}

impl GridStore {
    pub fn new(http: Client, config: StoreConfig) -> Self {
        GridStore {
            http,
            rest_url: config.rest_url.trim_end_matches('/').to_string(),
            service_key: config.service_key,
        }
    }

    /// Upsert grid rows in batches on the `(lat, lon)` conflict key. A failed
    /// batch is logged and skipped; remaining batches still run. Returns the
    /// number of rows written.
    pub async fn upsert_grid(&self, points: &[GridPoint]) -> usize {
        let rows: Vec<Value> = points
            .iter()
            .map(|p| json!({
                "lat": round2(p.lat),
                "lon": round2(p.lon),
                "wave_height": p.wave_height,
                "wave_direction": p.wave_direction,
                "wave_period": p.wave_period,
                "source": p.source,
                "model_run": p.model_run,
                "computed_at": p.computed_at,
            }))
            .collect();
        self.upsert_batches("wave_grid", "lat,lon", "merge-duplicates", &rows)
            .await
    }

    /// Upsert station metadata on the station-id conflict key.
    pub async fn upsert_stations(&self, stations: &[Station]) -> usize {
        let rows: Vec<Value> = stations
            .iter()
            .map(|s| json!({
                "station_id": s.id,
                "name": s.name,
                "latitude": s.lat,
                "longitude": s.lon,
                "type": s.station_type.as_str(),
                "owner": s.owner,
                "has_met": s.has_met,
                "has_currents": s.has_currents,
                "has_water_quality": s.has_water_quality,
                "active": true,
            }))
            .collect();
        self.upsert_batches("stations", "station_id", "merge-duplicates", &rows)
            .await
    }

    /// Insert readings, ignoring `(station_id, observed_at)` duplicates: a
    /// re-run of the same cycle collapses silently instead of erroring.
    pub async fn upsert_readings(&self, readings: &[Reading]) -> usize {
        let rows: Vec<Value> = readings
            .iter()
            .map(|r| json!({
                "station_id": r.station_id,
                "observed_at": r.observed_at,
                "lat": r.lat,
                "lon": r.lon,
                "wave_height": r.wave_height,
                "wave_direction": r.wave_direction,
                "wave_period": r.wave_period,
                "average_period": r.average_period,
                "wind_speed": r.wind_speed,
                "wind_direction": r.wind_direction,
                "wind_gust": r.wind_gust,
                "water_temp": r.water_temp,
                "air_temp": r.air_temp,
                "pressure": r.pressure,
            }))
            .collect();
        self.upsert_batches("buoy_readings", "station_id,observed_at", "ignore-duplicates", &rows)
            .await
    }

    /// Delete grid rows whose `computed_at` is older than the cutoff. The
    /// incremental buoy grid self-heals through this; no separate GC runs.
    pub async fn prune_grid(&self, older_than: Duration) -> Result<(), GridStoreError> {
        let cutoff = Utc::now() - older_than;
        let url = format!(
            "{}/wave_grid?computed_at=lt.{}",
            self.rest_base(),
            cutoff.to_rfc3339()
        );
        self.delete(&url).await
    }

    /// Unconditionally delete every grid row. A full-replacement (model) write
    /// calls this first so the table never mixes two model runs.
    pub async fn clear_grid(&self) -> Result<(), GridStoreError> {
        // The store refuses an unfiltered delete; this filter matches all rows.
        let url = format!("{}/wave_grid?lat=not.is.null", self.rest_base());
        self.delete(&url).await
    }

    /// Bounded-region grid read with an explicit row limit. Bounds crossing
    /// the antimeridian are split into two longitude ranges and concatenated.
    pub async fn query_grid(
        &self,
        bounds: &GridBounds,
        limit: usize,
    ) -> Result<Vec<GridPoint>, GridStoreError> {
        let (first, second) = bounds.split_antimeridian();
        let mut rows = self.query_grid_range(&first, limit).await?;
        if let Some(second) = second {
            if rows.len() < limit {
                rows.extend(self.query_grid_range(&second, limit - rows.len()).await?);
            }
        }
        Ok(rows)
    }

    /// Record a completed model run alongside the grid it produced.
    pub async fn record_forecast_run(
        &self,
        model: &str,
        run_time: DateTime<Utc>,
        forecast_hours: &[u32],
        point_count: usize,
    ) -> Result<(), GridStoreError> {
        let row = json!({
            "model": model,
            "run_time": run_time,
            "forecast_hours": forecast_hours,
            "point_count": point_count,
            "status": "complete",
        });
        let url = format!("{}/forecast_runs", self.rest_base());
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!([row]))
            .send()
            .await
            .map_err(|e| GridStoreError::NetworkRequest(url.clone(), e))?;
        Self::check_status(url, response).map(|_| ())
    }

    async fn query_grid_range(
        &self,
        bounds: &GridBounds,
        limit: usize,
    ) -> Result<Vec<GridPoint>, GridStoreError> {
        let url = format!(
            "{}/wave_grid?select=*&lat=gte.{}&lat=lte.{}&lon=gte.{}&lon=lte.{}&limit={}",
            self.rest_base(),
            bounds.min_lat,
            bounds.max_lat,
            bounds.min_lon,
            bounds.max_lon,
            limit
        );
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| GridStoreError::NetworkRequest(url.clone(), e))?;
        let response = Self::check_status(url.clone(), response)?;
        response
            .json::<Vec<GridPoint>>()
            .await
            .map_err(|e| GridStoreError::Decode(url, e))
    }

    async fn upsert_batches(
        &self,
        table: &str,
        on_conflict: &str,
        resolution: &str,
        rows: &[Value],
    ) -> usize {
        if rows.is_empty() {
            return 0;
        }
        let url = format!("{}/{}?on_conflict={}", self.rest_base(), table, on_conflict);
        let prefer = format!("resolution={resolution},return=minimal");

        let mut written = 0usize;
        let mut failed_batches = 0usize;
        for batch in rows.chunks(UPSERT_BATCH_SIZE) {
            let result = async {
                let response = self
                    .http
                    .post(&url)
                    .header("apikey", &self.service_key)
                    .bearer_auth(&self.service_key)
                    .header("Prefer", &prefer)
                    .json(&batch)
                    .send()
                    .await
                    .map_err(|e| GridStoreError::NetworkRequest(url.clone(), e))?;
                Self::check_status(url.clone(), response).map(|_| ())
            }
            .await;

            match result {
                Ok(()) => written += batch.len(),
                Err(err) => {
                    failed_batches += 1;
                    warn!("upsert batch of {} rows into {table} failed: {err}", batch.len());
                }
            }
        }
        debug!(
            "upserted {written} rows into {table} ({failed_batches} batches failed)"
        );
        written
    }

    async fn delete(&self, url: &str) -> Result<(), GridStoreError> {
        let response = self
            .http
            .delete(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| GridStoreError::NetworkRequest(url.to_string(), e))?;
        Self::check_status(url.to_string(), response).map(|_| ())
    }

    fn rest_base(&self) -> String {
        format!("{}/rest/v1", self.rest_url)
    }

    fn check_status(
        url: String,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GridStoreError> {
        match response.error_for_status() {
            Ok(resp) => Ok(resp),
            Err(e) => Err(if let Some(status) = e.status() {
                GridStoreError::HttpStatus {
                    url,
                    status,
                    source: e,
                }
            } else {
                GridStoreError::NetworkRequest(url, e)
            }),
        }
    }
}

#[async_trait]
impl GridQuery for GridStore {
    async fn query_bounds(&self, bounds: &GridBounds) -> Result<Vec<GridPoint>, GridStoreError> {
        self.query_grid(bounds, GRID_QUERY_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_are_fatal_configuration_errors() {
        // Run both checks in one test to avoid env races between tests.
        std::env::remove_var("SEASTATE_DB_URL");
        std::env::remove_var("SEASTATE_DB_KEY");
        assert!(matches!(
            StoreConfig::from_env(),
            Err(GridStoreError::MissingConfig("SEASTATE_DB_URL"))
        ));

        std::env::set_var("SEASTATE_DB_URL", "http://localhost:54321");
        assert!(matches!(
            StoreConfig::from_env(),
            Err(GridStoreError::MissingConfig("SEASTATE_DB_KEY"))
        ));

        std::env::set_var("SEASTATE_DB_KEY", "service-key");
        let config = StoreConfig::from_env().expect("both variables set");
        assert_eq!(config.rest_url, "http://localhost:54321");
        std::env::remove_var("SEASTATE_DB_URL");
        std::env::remove_var("SEASTATE_DB_KEY");
    }

    #[tokio::test]
    async fn unreachable_store_counts_batches_as_failed() {
        let store = GridStore::new(
            Client::new(),
            StoreConfig {
                rest_url: "http://127.0.0.1:9".to_string(),
                service_key: "key".to_string(),
            },
        );
        let point = GridPoint {
            lat: 0.0,
            lon: 0.0,
            wave_height: Some(1.0),
            wave_direction: Some(90.0),
            wave_period: None,
            source: "buoy_idw".to_string(),
            model_run: None,
            computed_at: Utc::now(),
        };
        // Connection refused: zero rows written, no panic, no error escape.
        assert_eq!(store.upsert_grid(&[point]).await, 0);
    }
}

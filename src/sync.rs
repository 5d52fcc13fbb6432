//! Batch synchronisation cycles: stations → readings → grid.
//!
//! Each cycle is idempotent and restartable. Stages run in a fixed order
//! because each depends on its predecessor's data, but a failed stage only
//! marks its report and the cycle keeps going (later stages degrade to
//! no-ops on empty input). Nothing rolls back; the next scheduled run simply
//! overwrites by upsert.

use crate::grid::builder::{build_grid, DEFAULT_RESOLUTION_DEG};
use crate::grid::store::GridStore;
use crate::model::wavewatch::{WaveModelClient, MODEL_SOURCE};
use crate::readings::collector::ReadingCollector;
use crate::stations::registry::StationRegistry;
use crate::types::grid::GridBounds;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use std::sync::Arc;

/// Buoy-grid rows older than this are pruned after each write, so the
/// incremental grid self-heals without a separate GC process.
pub const GRID_RETENTION_HOURS: i64 = 1;

/// Outcome of one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub ok: bool,
    pub count: usize,
    pub detail: String,
}

impl StageReport {
    fn succeeded(count: usize, detail: impl Into<String>) -> Self {
        StageReport {
            ok: true,
            count,
            detail: detail.into(),
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        StageReport {
            ok: false,
            count: 0,
            detail: detail.into(),
        }
    }
}

/// Outcome of a full buoy sync cycle.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stations: StageReport,
    pub readings: StageReport,
    pub grid: StageReport,
}

impl SyncReport {
    pub fn all_ok(&self) -> bool {
        self.stations.ok && self.readings.ok && self.grid.ok
    }
}

pub struct SyncOrchestrator {
    registry: Arc<StationRegistry>,
    collector: ReadingCollector,
    store: Arc<GridStore>,
    model: Arc<WaveModelClient>,
    resolution_deg: f64,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<StationRegistry>,
        collector: ReadingCollector,
        store: Arc<GridStore>,
        model: Arc<WaveModelClient>,
    ) -> Self {
        SyncOrchestrator {
            registry,
            collector,
            store,
            model,
            resolution_deg: DEFAULT_RESOLUTION_DEG,
        }
    }

    /// Run one station → reading → grid cycle against the buoy feeds.
    pub async fn run_cycle(&self) -> SyncReport {
        let started_at = Utc::now();
        info!("sync cycle starting");

        let stations = self.registry.map_stations().await;
        let stations_report = if stations.is_empty() {
            StageReport::failed("station registry unavailable and no cached list")
        } else {
            let written = self.store.upsert_stations(&stations).await;
            StageReport::succeeded(
                written,
                format!("upserted {written} of {} stations", stations.len()),
            )
        };

        let readings = self.collector.collect(&stations).await;
        let readings_report = if readings.is_empty() {
            StageReport::failed("no readings collected")
        } else {
            let written = self.store.upsert_readings(&readings).await;
            StageReport::succeeded(
                written,
                format!("stored {written} of {} readings", readings.len()),
            )
        };

        let computed_at = Utc::now();
        let points = build_grid(&readings, self.resolution_deg, computed_at);
        let grid_report = if points.is_empty() {
            StageReport::failed("no grid points interpolated")
        } else {
            let written = self.store.upsert_grid(&points).await;
            if let Err(err) = self
                .store
                .prune_grid(Duration::hours(GRID_RETENTION_HOURS))
                .await
            {
                warn!("grid prune failed (continuing): {err}");
            }
            StageReport::succeeded(
                written,
                format!("wrote {written} of {} grid points", points.len()),
            )
        };

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            stations: stations_report,
            readings: readings_report,
            grid: grid_report,
        };
        info!(
            "sync cycle finished: stations='{}' readings='{}' grid='{}'",
            report.stations.detail, report.readings.detail, report.grid.detail
        );
        report
    }

    /// Full-replacement ingestion of the global wave model: clear the grid
    /// table, insert the new run, record it. The unconditional clear
    /// guarantees the table never mixes two model runs.
    pub async fn run_model_cycle(&self) -> StageReport {
        let run = Utc::now();
        let points = match self.model.fetch_grid(&GridBounds::GLOBAL, run).await {
            Ok(points) => points,
            Err(err) => return StageReport::failed(format!("model fetch failed: {err}")),
        };
        if points.is_empty() {
            return StageReport::failed("model returned no points");
        }

        if let Err(err) = self.store.clear_grid().await {
            // Inserting over a failed clear would mix model runs; stop here.
            return StageReport::failed(format!("grid clear failed: {err}"));
        }
        let written = self.store.upsert_grid(&points).await;
        if let Err(err) = self
            .store
            .record_forecast_run(MODEL_SOURCE, run, &[0], written)
            .await
        {
            warn!("failed to record forecast run (grid is written): {err}");
        }
        StageReport::succeeded(
            written,
            format!("replaced grid with {written} of {} model points", points.len()),
        )
    }
}

//! The main entry point for the wave/wind field engine.
//!
//! [`SeaState`] wires the station registry, reading collector, grid store,
//! wave model and resolver together, and exposes the two halves of the
//! system: the sync pipeline that builds and stores the field, and the query
//! surface that serves bounded-region grid requests through the fallback
//! chain.

use crate::error::SeaStateError;
use crate::grid::store::{GridQuery, GridStore, StoreConfig};
use crate::model::wavewatch::WaveModelClient;
use crate::model::WaveModel;
use crate::readings::collector::ReadingCollector;
use crate::resolver::{GridSlice, SourceResolver};
use crate::sst::SstSource;
use crate::stations::registry::StationRegistry;
use crate::sync::{StageReport, SyncOrchestrator, SyncReport};
use crate::types::grid::{GridBounds, GridPoint, LatLon};
use crate::types::station::Station;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout for the buoy and station feeds. A hanging upstream
/// degrades to "skip this item", it never stalls a batch indefinitely.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The engine client.
///
/// Construct with [`SeaState::new()`] (default cache directory, store
/// credentials from the environment) or [`SeaState::with_config()`] for
/// explicit settings, then use [`grid()`](SeaState::grid) to query and
/// [`sync()`](SeaState::sync) / [`sync_model()`](SeaState::sync_model) to
/// ingest.
///
/// # Examples
///
/// ```no_run
/// # use seastate::{SeaState, GridBounds, SeaStateError};
/// # async fn run() -> Result<(), SeaStateError> {
/// let engine = SeaState::new().await?;
///
/// // Query the southern California bight.
/// let slice = engine
///     .grid()
///     .bounds(GridBounds::new(32.0, 35.0, -121.0, -117.0))
///     .call()
///     .await;
/// println!("{} points from {}", slice.points.len(), slice.source);
/// # Ok(())
/// # }
/// ```
pub struct SeaState {
    registry: Arc<StationRegistry>,
    store: Arc<GridStore>,
    resolver: SourceResolver,
    orchestrator: SyncOrchestrator,
    sst: SstSource,
}

#[bon]
impl SeaState {
    /// Client with the default cache directory and store credentials read
    /// from `SEASTATE_DB_URL` / `SEASTATE_DB_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`SeaStateError::CacheDirResolution`] /
    /// [`SeaStateError::CacheDirCreation`] when the cache directory cannot be
    /// set up, and a [`SeaStateError::Store`] configuration error when a
    /// credential is missing; the latter is the one fatal error in the
    /// engine, raised before any I/O.
    pub async fn new() -> Result<Self, SeaStateError> {
        let cache_folder = get_cache_dir().map_err(SeaStateError::CacheDirResolution)?;
        let config = StoreConfig::from_env()?;
        Self::with_config(cache_folder, config).await
    }

    /// Client with an explicit cache directory and store configuration.
    pub async fn with_config(
        cache_folder: PathBuf,
        store_config: StoreConfig,
    ) -> Result<Self, SeaStateError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| SeaStateError::CacheDirCreation(cache_folder.clone(), e))?;

        let http = Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .map_err(SeaStateError::HttpClient)?;

        let registry = Arc::new(StationRegistry::new(http.clone(), Some(&cache_folder)));
        let store = Arc::new(GridStore::new(http.clone(), store_config));
        let model = Arc::new(WaveModelClient::new(http.clone()));
        let collector = ReadingCollector::new(http.clone());

        let resolver = SourceResolver::new(
            Arc::clone(&store) as Arc<dyn GridQuery>,
            Arc::clone(&model) as Arc<dyn WaveModel>,
        );
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&registry),
            collector,
            Arc::clone(&store),
            Arc::clone(&model),
        );
        Ok(SeaState {
            registry,
            store,
            resolver,
            orchestrator,
            sst: SstSource::new(http),
        })
    }

    /// Query the wave field for a bounding box.
    ///
    /// Walks the resolver chain (pinned snapshot → direct model when
    /// `prefer_direct` → stored grid → model fallback) and always returns a
    /// [`GridSlice`]; an exhausted chain yields an empty slice tagged
    /// `"none"` with an explanatory error, never a panic or an `Err`.
    ///
    /// * `.bounds(GridBounds)`: **Required.** Region to resolve.
    /// * `.forecast_hour(u32)`: Optional, default 0 (current conditions).
    /// * `.prefer_direct(bool)`: Optional, default false. Skip storage and
    ///   ask the model first.
    #[builder]
    pub async fn grid(
        &self,
        bounds: GridBounds,
        forecast_hour: Option<u32>,
        prefer_direct: Option<bool>,
    ) -> GridSlice {
        self.resolver
            .resolve(
                &bounds,
                forecast_hour.unwrap_or(0),
                prefer_direct.unwrap_or(false),
            )
            .await
    }

    /// Run one buoy sync cycle: station refresh → reading collection → grid
    /// build, each stage reported individually.
    pub async fn sync(&self) -> SyncReport {
        self.orchestrator.run_cycle().await
    }

    /// Ingest the latest global wave-model run, replacing the stored grid.
    pub async fn sync_model(&self) -> StageReport {
        self.orchestrator.run_model_cycle().await
    }

    /// The current station list (possibly stale, possibly empty, never an
    /// error).
    pub async fn stations(&self) -> Vec<Station> {
        self.registry.get_stations().await
    }

    /// Direct access to the registry's derived filters.
    pub fn station_registry(&self) -> &StationRegistry {
        &self.registry
    }

    /// Direct access to the row store.
    pub fn grid_store(&self) -> &GridStore {
        &self.store
    }

    /// Sea-surface temperature near a location, through the point cache.
    pub async fn water_temp(&self, location: LatLon) -> Option<f64> {
        self.sst.sea_surface_temp(location.0, location.1).await
    }

    /// Pin a forecast snapshot for a given hour (test/demo override); see
    /// [`SourceResolver::pin_forecast`].
    pub fn pin_forecast(&self, forecast_hour: u32, points: Vec<GridPoint>) {
        self.resolver.pin_forecast(forecast_hour, points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SOURCE_CACHED_FORECAST;
    use chrono::{TimeZone, Utc};

    fn offline_config() -> StoreConfig {
        StoreConfig {
            rest_url: "http://127.0.0.1:9".to_string(),
            service_key: "key".to_string(),
        }
    }

    #[tokio::test]
    async fn pinned_snapshot_is_served_through_the_facade() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SeaState::with_config(dir.path().to_path_buf(), offline_config())
            .await
            .expect("engine builds offline");

        engine.pin_forecast(
            0,
            vec![GridPoint {
                lat: 33.0,
                lon: -119.0,
                wave_height: Some(2.0),
                wave_direction: Some(285.0),
                wave_period: Some(14.0),
                source: "gfs_wave".to_string(),
                model_run: None,
                computed_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            }],
        );

        let slice = engine
            .grid()
            .bounds(GridBounds::new(32.0, 35.0, -121.0, -117.0))
            .call()
            .await;
        assert_eq!(slice.source, SOURCE_CACHED_FORECAST);
        assert_eq!(slice.points.len(), 1);
    }

    #[tokio::test]
    async fn facade_survives_a_fully_offline_world() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SeaState::with_config(dir.path().to_path_buf(), offline_config())
            .await
            .expect("engine builds offline");

        assert!(engine.stations().await.is_empty());
        assert!(engine.water_temp(LatLon(34.0, -120.0)).await.is_none());

        let slice = engine
            .grid()
            .bounds(GridBounds::new(32.0, 35.0, -121.0, -117.0))
            .prefer_direct(true)
            .call()
            .await;
        assert_eq!(slice.source, "none");
        assert!(slice.points.is_empty());
        assert!(slice.error.is_some());
    }
}

mod cache;
mod error;
mod grid;
mod interpolate;
mod model;
mod readings;
mod resolver;
mod seastate;
mod sst;
mod stations;
mod sync;
mod types;
mod utils;

pub use error::SeaStateError;
pub use seastate::*;

pub use cache::{CacheEntry, Clock, FailureEntry, PointCache, PointKey, PointLookup, SystemClock};
pub use grid::builder::{build_grid, BUOY_GRID_SOURCE, DEFAULT_RESOLUTION_DEG};
pub use grid::error::GridStoreError;
pub use grid::store::{
    GridQuery, GridStore, StoreConfig, DEFAULT_PAGE_LIMIT, GRID_QUERY_LIMIT, UPSERT_BATCH_SIZE,
};
pub use interpolate::{interpolate, Interpolated, ReadingIndex, DEFAULT_MAX_DISTANCE_KM};
pub use model::error::ModelError;
pub use model::wavewatch::{WaveModelClient, DEFAULT_MODEL_URL, MODEL_SOURCE};
pub use model::WaveModel;
pub use readings::collector::{ReadingCollector, DEFAULT_CONCURRENCY, DEFAULT_REALTIME_URL};
pub use readings::error::ReadingError;
pub use resolver::{
    GridSlice, SourceResolver, SOURCE_CACHED_FORECAST, SOURCE_MODEL_DIRECT, SOURCE_NONE,
};
pub use sst::{
    SstSource, DEFAULT_SST_URL, SST_FAILURE_TTL_HOURS, SST_RESOLUTION_DEG, SST_TTL_HOURS,
};
pub use stations::error::RegistryError;
pub use stations::registry::{StationRegistry, DEFAULT_STATIONS_URL, REGISTRY_TTL_HOURS};
pub use sync::{StageReport, SyncOrchestrator, SyncReport, GRID_RETENTION_HOURS};
pub use types::grid::{round2, GridBounds, GridPoint, LatLon};
pub use types::reading::Reading;
pub use types::station::{Capability, Station, StationType};

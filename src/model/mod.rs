pub mod error;
pub mod wavewatch;

use crate::model::error::ModelError;
use crate::types::grid::{GridBounds, GridPoint};
use async_trait::async_trait;
use chrono::Utc;

/// Direct access to the external wave model, the seam the resolver consumes,
/// so the fallback chain is testable without a live endpoint.
#[async_trait]
pub trait WaveModel: Send + Sync {
    async fn fetch_bounds(&self, bounds: &GridBounds) -> Result<Vec<GridPoint>, ModelError>;
}

#[async_trait]
impl WaveModel for wavewatch::WaveModelClient {
    async fn fetch_bounds(&self, bounds: &GridBounds) -> Result<Vec<GridPoint>, ModelError> {
        self.fetch_grid(bounds, Utc::now()).await
    }
}

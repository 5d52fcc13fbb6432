use crate::grid::error::GridStoreError;
use crate::model::error::ModelError;
use crate::readings::error::ReadingError;
use crate::stations::error::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeaStateError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Reading(#[from] ReadingError),

    #[error(transparent)]
    Store(#[from] GridStoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to construct HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

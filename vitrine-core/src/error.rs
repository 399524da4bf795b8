use thiserror::Error;

use vitrine_model::ModelError;

use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("A synchronization batch is already running")]
    SyncInProgress,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

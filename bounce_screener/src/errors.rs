use market_data_ingestor::providers::ProviderInitError;
use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors of a screening run. Per-instrument problems never surface here; they
/// end up in [`ScreeningBatch`](crate::screener::ScreeningBatch) instead.
#[derive(Debug, Error)]
pub enum ScreenError {
    /// The run was rejected before any request was sent.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A provider could not be constructed (e.g., missing credentials).
    #[error("Provider setup failed: {0}")]
    ProviderInit(#[from] ProviderInitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialise chart payload: {0}")]
    Json(#[from] serde_json::Error),
}

//! Favorites catalog: the source of media descriptors.
//!
//! The orchestrator only depends on the [`Catalog`] trait. The Bilibili
//! favorites client is the production implementation.

mod bilibili;
mod config;
mod types;

pub use bilibili::BilibiliFavorites;
pub use config::CatalogConfig;
pub use types::{
    sanitize_title, MediaDescriptor, MediaStats, FORBIDDEN_FILENAME_CHARS, UNKNOWN_TITLE,
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when fetching the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded its timeout.
    #[error("Request timed out after {timeout_secs:.1} seconds")]
    Timeout { timeout_secs: f64 },

    /// API answered with a failure status or code.
    #[error("API error: status {status}, code {code}: {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Every attempt failed.
    #[error("Catalog fetch failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Client is missing required settings.
    #[error("Catalog not configured: {0}")]
    NotConfigured(String),
}

impl CatalogError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout { .. } | Self::Api { .. } | Self::Parse(_)
        )
    }
}

/// Source of media descriptors.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the current descriptor list.
    ///
    /// An empty list means there is nothing to do and is not an error.
    async fn fetch(&self) -> Result<Vec<MediaDescriptor>, CatalogError>;
}

//! Registry error types.

use thiserror::Error;

/// Errors returned by registry lookups and updates.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no job with id: {0}")]
    NotFound(String),
}

use std::sync::Arc;

use imgjobs_auth::ClaimsVerifier;
use imgjobs_engine::Engine;
use imgjobs_registry::JobRegistry;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub engine: Arc<dyn Engine>,
    pub verifier: ClaimsVerifier,
}

impl AppState {
    /// Build a fully initialised state container from its constituent parts.
    pub fn new(registry: JobRegistry, engine: Arc<dyn Engine>, verifier: ClaimsVerifier) -> Self {
        Self {
            registry,
            engine,
            verifier,
        }
    }
}

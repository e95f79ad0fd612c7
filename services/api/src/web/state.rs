//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use course_platform_core::ports::{ContentStore, IdentityProvider, ProfileStore, ProgressStore};
use course_platform_core::{Catalog, ViewerResolver};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
/// Nothing in here is per-request; each request resolves its own viewer.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub identity: Arc<dyn IdentityProvider>,
    pub resolver: Arc<ViewerResolver>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the catalog and viewer resolution over a backend that implements
    /// every port (the PostgreSQL adapter or the in-memory store).
    pub fn new<B>(backend: Arc<B>, config: Arc<Config>) -> Self
    where
        B: ContentStore + ProgressStore + ProfileStore + IdentityProvider + 'static,
    {
        let resolver = ViewerResolver::new(
            backend.clone(),
            backend.clone(),
            config.identity_timeout,
            config.role_hint_ttl,
        );
        Self {
            catalog: Catalog::new(backend.clone(), backend.clone()),
            identity: backend,
            resolver: Arc::new(resolver),
            config,
        }
    }
}

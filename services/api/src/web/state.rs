//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use lattice_core::pipeline::ContentPipeline;
use lattice_core::ports::ContentRepository;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ContentRepository>,
    pub pipeline: Arc<ContentPipeline>,
    /// Cancelled on server shutdown; each pipeline run gets a child token.
    pub shutdown: CancellationToken,
}

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::Pacing;
use crate::config::AppConfig;
use crate::metrics::Metrics;

/// The shared application state.
///
/// Cloned into every handler by Axum. Apart from the metric counters, everything in
/// here is fixed at startup, so concurrent requests read it without locking.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Directory whose immediate sub-directories can be downloaded.
    pub root: Arc<PathBuf>,
    /// Chunk size and delay applied to every archive stream.
    pub pacing: Pacing,
    /// Request and stream counters.
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let root = Arc::new(config.archive.root_dir());
        let pacing = config.archive.pacing();
        Self { config: Arc::new(config), root, pacing, metrics: Metrics::new() }
    }
}

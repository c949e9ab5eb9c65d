use std::sync::Arc;

use crate::citation::CitationProvider;
use crate::config::Config;
use crate::ifc::ModelReader;
use crate::standards::store::StandardsStore;
use crate::uploads::UploadStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub standards: Arc<StandardsStore>,
    pub uploads: UploadStore,
    /// Pluggable IFC reader. Default: StepModelReader.
    pub model_reader: Arc<dyn ModelReader>,
    /// `None` when no API key is configured; citation requests are then rejected.
    pub citations: Option<Arc<dyn CitationProvider>>,
    /// Client for fetching reference documents by URL.
    pub http: reqwest::Client,
}

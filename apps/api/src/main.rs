mod check;
mod citation;
mod config;
mod errors;
mod ifc;
mod llm_client;
mod render;
mod routes;
mod standards;
mod state;
mod uploads;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::citation::{CitationProvider, LlmCitationProvider};
use crate::config::Config;
use crate::ifc::StepModelReader;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::standards::store::StandardsStore;
use crate::state::AppState;
use crate::uploads::UploadStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting railcheck v{}", env!("CARGO_PKG_VERSION"));

    let standards = Arc::new(StandardsStore::new(config.standards_path.clone()));
    standards.ensure_exists().await?;
    info!("Standards file: {}", standards.path().display());

    let uploads = UploadStore::new(config.upload_dir.clone());
    uploads.ensure_dir().await?;
    info!("Upload directory: {}", uploads.dir().display());

    let citations: Option<Arc<dyn CitationProvider>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.anthropic_api_url.clone())?;
            info!(
                "LLM client initialized (model: {}, endpoint: {})",
                llm_client::MODEL,
                llm.api_url()
            );
            let provider: Arc<dyn CitationProvider> = Arc::new(LlmCitationProvider(llm));
            Some(provider)
        }
        None => {
            info!("ANTHROPIC_API_KEY not set, citations disabled");
            None
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.reference_fetch_timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    if config.admin_token.is_none() {
        info!("ADMIN_TOKEN not set, standards updates are unauthenticated");
    }

    let state = AppState {
        config: config.clone(),
        standards,
        uploads,
        model_reader: Arc::new(StepModelReader),
        citations,
        http,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the upload frontend is deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!(
        "Listening on {addr} (upload limit {} MiB)",
        config.max_upload_bytes / (1024 * 1024)
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

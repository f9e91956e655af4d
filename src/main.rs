// SPDX-License-Identifier: MIT

//! FinLearn API Server
//!
//! Serves the personal-finance learning app: topic catalog, quiz content,
//! leaderboards, and the per-user progress record with its sync/merge
//! engine.

use finlearn::{
    config::Config,
    db::FirestoreDb,
    services::{CatalogService, GenerationService, ProgressService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting FinLearn API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Load topic catalog
    tracing::info!(path = %config.catalog_path, "Loading topic catalog");
    let catalog_service =
        CatalogService::load_from_file(&config.catalog_path).expect("Failed to load topic catalog");
    tracing::info!(
        count = catalog_service.topics().len(),
        "Topic catalog loaded"
    );

    // Initialize the question/feedback generation client
    let generation_service =
        GenerationService::new(&config.generation_url, &config.generation_api_key);
    if config.generation_url.is_empty() {
        tracing::warn!("GENERATION_URL not set; quiz content will use fallback questions");
    }

    let progress_service = ProgressService::new(db.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        catalog_service,
        generation_service,
        progress_service,
    });

    // Build router
    let app = finlearn::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("finlearn=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

//! The prediction API server for the food allergen detector.

pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod routes;

use crate::{common::*, context::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub fn build_router(context: AppState) -> Router {
    Router::new()
        .route("/", get(routes::welcome))
        .route("/api/predict", post(routes::predict))
        .with_state(context)
        .layer(CorsLayer::permissive())
}

/// The entry of the API server.
pub async fn start(config: Arc<config::Config>) -> Result<()> {
    // load every artifact before accepting a single request
    let context: AppState = {
        let config = config.clone();
        let context = tokio::task::spawn_blocking(move || context::AppContext::load(&config))
            .await??;
        Arc::new(context)
    };
    info!(
        "serving {} classes with a {} second inference budget",
        context.classes().num_classes(),
        config.server.inference_timeout_secs
    );

    let router = build_router(context);
    let addr = format!("{}:{}", config.server.address, config.server.port);
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

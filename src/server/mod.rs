//! The Probe Service: runs probes for the console over HTTP.
//!
//! Routes:
//! - `POST /api/test` runs one probe and answers with a `ProbeResult`
//! - `GET /api/health` liveness check
//! - everything else is served from the static directory, when configured

mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::model::ServiceConfig;
use crate::probe::runner::ProbeRunner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<ProbeRunner>,
}

pub fn build_router(app_state: AppState, config: &ServiceConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut router = Router::new()
        .route("/api/test", post(handlers::run_test))
        .route("/api/health", get(handlers::health))
        .with_state(app_state);

    match &config.static_dir {
        Some(dir) if dir.is_dir() => {
            log::info!("Serving static files from {}", dir.display());
            router = router.fallback_service(ServeDir::new(dir));
        }
        Some(dir) => log::info!("Static directory {} not found, serving API only", dir.display()),
        None => {}
    }

    router.layer(cors)
}

pub async fn serve(config: ServiceConfig, runner: ProbeRunner) -> std::io::Result<()> {
    let app_state = AppState {
        runner: Arc::new(runner),
    };
    let app = build_router(app_state, &config);

    let listener = TcpListener::bind(config.listen).await?;
    log::info!("Server starting on http://{}", listener.local_addr()?);
    log::info!("OS: {}, ARCH: {}", std::env::consts::OS, std::env::consts::ARCH);

    axum::serve(listener, app).await
}

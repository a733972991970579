use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Request body as it arrives on the wire. The command stays a plain string
/// so that unknown commands produce a failed result instead of a rejection;
/// missing fields read as empty and fail the same way.
#[derive(Debug, Deserialize)]
struct TestRequest {
    #[serde(default)]
    command: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    custom: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    time: String,
}

// POST /api/test
pub async fn run_test(State(app): State<AppState>, body: Bytes) -> Response {
    let request: TestRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Rejected probe request: {e}");
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };

    log::info!("Running {} probe against {:?}", request.command, request.url);
    let result = app
        .runner
        .run(&request.command, &request.url, request.custom.as_deref())
        .await;

    if let Some(error) = &result.error {
        log::warn!("{} probe against {:?} failed: {error}", result.command, request.url);
    }

    Json(result).into_response()
}

// GET /api/health
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

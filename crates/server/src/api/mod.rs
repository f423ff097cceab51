//! API module providing the HTTP surface of the reminder engine.
//!
//! This module is organized into submodules:
//! - `cron` - Scheduler endpoints driven by an external cron service (/reminders/run, /reminders/status)
//! - `admin` - Operator endpoints (/reminders/sync, /reminders/manual, /reminders/invite, ...)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod admin;
pub mod cron;
pub mod health;
pub mod openapi;

// Re-export commonly used items
pub use admin::ADMIN_TAG;
pub use cron::CRON_TAG;
pub use health::MISC_TAG;

use crate::AppResources;
use crate::config::AppConfig;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Why a /reminders request was rejected before reaching its handler.
#[derive(Debug, PartialEq, Eq)]
pub enum CronAuthError {
    /// No shared secret is configured server-side.
    Misconfigured,
    /// The `key` query parameter is missing or does not match.
    InvalidKey,
}

impl IntoResponse for CronAuthError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Server misconfigured" })),
            )
                .into_response(),
            Self::InvalidKey => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
            }
        }
    }
}

/// Checks the shared cron secret. A server without a configured secret
/// rejects every request rather than silently allowing them through.
pub fn require_cron_key(config: &AppConfig, provided: Option<&str>) -> Result<(), CronAuthError> {
    let secret = config.cron_secret.trim();
    if secret.is_empty() {
        tracing::error!("No cron secret configured; rejecting reminder request");
        return Err(CronAuthError::Misconfigured);
    }
    match provided {
        Some(key) if key == secret => Ok(()),
        _ => {
            tracing::warn!("Rejected reminder request with missing or invalid cron key");
            Err(CronAuthError::InvalidKey)
        }
    }
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/reminders", cron::router().merge(admin::router()))
        .routes(routes!(health::health))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    let router = router.merge(Redoc::with_url("/api-docs", api));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("Listening on 0.0.0.0:8080");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}

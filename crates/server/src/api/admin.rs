//! Operator endpoints.
//!
//! Everything here shares the cron-key gate with the scheduler routes but is
//! driven by a human: ad-hoc sends to named guests, directory reconciliation,
//! first-time invitation blasts, ledger inspection and opt-outs.

use crate::{
    AppResources,
    api::require_cron_key,
    directory,
    dispatch::{self, SendDetail},
    entity::guest,
    error::SendError,
};
use axum::{Extension, Json, extract::Query, http::StatusCode, response::IntoResponse};
use sea_orm::EntityTrait;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const ADMIN_TAG: &str = "Operations";

#[derive(Debug, Deserialize, IntoParams)]
pub struct KeyParams {
    /// Shared secret; must match the configured cron secret.
    pub key: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Shared secret; must match the configured cron secret.
    pub key: Option<String>,
    /// Restrict the ledger to a single guest.
    pub guest_id: Option<i32>,
    /// Maximum number of rows to return (default 50).
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualSendRequest {
    /// Local guest ids to send to.
    pub guest_ids: Vec<i32>,
    /// Free-form note appended to the message and stored in the ledger.
    pub note: Option<String>,
    /// Operator identity recorded on each ledger row (default `admin`).
    pub sent_by: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OptOutRequest {
    pub guest_id: i32,
}

/// Pull the remote guest directory into the local mirror.
#[utoipa::path(
    post,
    path = "/sync",
    operation_id = "sync_directory",
    tag = ADMIN_TAG,
    summary = "Reconcile guests with the remote directory",
    description = "Fetches every row from the guest directory and reconciles it with the local \
mirror: remote rows are matched by token first, then phone; unmatched locals are deleted. \
Reports created, updated and deleted counts.",
    params(KeyParams),
    responses(
        (status = 200, description = "Reconciliation finished", body = serde_json::Value,
            example = json!({"status": "completed", "created": 3, "updated": 57, "deleted": 1})),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Directory not configured or sync failure")
    )
)]
pub async fn sync_directory(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<KeyParams>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    let Some(client) = &resources.directory else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Guest directory is not configured" })),
        )
            .into_response();
    };

    match directory::pull_directory(&resources.db, client).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "created": stats.created,
                "updated": stats.updated,
                "deleted": stats.deleted,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                name = "directory.pull_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %e,
                message = "Directory reconciliation failed",
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Directory sync failed: {e}") })),
            )
                .into_response()
        }
    }
}

/// Send an ad-hoc reminder to specific guests.
#[utoipa::path(
    post,
    path = "/manual",
    operation_id = "send_manual_reminders",
    tag = ADMIN_TAG,
    summary = "Send a manual reminder to selected guests",
    description = "Sends the manual reminder template to each listed guest, regardless of the \
schedule and of whether they already received a scheduled stage. Opt-outs and reminder caps \
still apply. An optional note is appended to every message.",
    params(KeyParams),
    request_body = ManualSendRequest,
    responses(
        (status = 200, description = "Per-guest results", body = serde_json::Value,
            example = json!({"status": "completed", "stage": "manual", "total": 2, "sent": 1, "failed": 1, "skipped": 0, "details": []})),
        (status = 400, description = "Empty guest_ids"),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Server misconfigured or database failure")
    )
)]
pub async fn send_manual_reminders(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<KeyParams>,
    Json(payload): Json<ManualSendRequest>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    if payload.guest_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "guest_ids must not be empty" })),
        )
            .into_response();
    }

    let sent_by = payload.sent_by.as_deref().unwrap_or("admin");
    match dispatch::send_manual_reminders(
        &resources,
        &payload.guest_ids,
        payload.note.as_deref(),
        sent_by,
    )
    .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "stage": outcome.stage,
                "total": outcome.total,
                "sent": outcome.sent,
                "failed": outcome.failed,
                "skipped": outcome.skipped,
                "details": outcome.details,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Manual reminder run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Manual reminder run failed: {e}") })),
            )
                .into_response()
        }
    }
}

/// Send first-time RSVP invitations to directory rows that never got one.
#[utoipa::path(
    post,
    path = "/invite",
    operation_id = "send_invitations",
    tag = ADMIN_TAG,
    summary = "Send RSVP links to guests who never received one",
    description = "Queries the directory for rows that have a token but no link-sent marker, \
sends each one their personal RSVP link over WhatsApp (honouring any per-guest personal \
message stored remotely), and stamps the marker on success.",
    params(KeyParams),
    responses(
        (status = 200, description = "Per-guest results", body = serde_json::Value,
            example = json!({"status": "completed", "total": 4, "sent": 4, "failed": 0, "details": []})),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Directory not configured or lookup failure")
    )
)]
pub async fn send_invitations(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<KeyParams>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    let Some(client) = &resources.directory else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Guest directory is not configured" })),
        )
            .into_response();
    };

    let pending = match client.list_needing_invite().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Failed to list guests needing an invitation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Directory lookup failed: {e}") })),
            )
                .into_response();
        }
    };

    let deadline = resources.config.rsvp_deadline;
    let timeout = resources.config.send_timeout();
    let mut sent = 0;
    let mut failed = 0;
    let mut details = Vec::with_capacity(pending.len());

    for remote in &pending {
        if remote.phone.trim().is_empty() {
            failed += 1;
            details.push(SendDetail::failed(&remote.name, "No phone number on file".to_owned()));
            continue;
        }
        let Some(token) = remote.token.as_deref() else {
            failed += 1;
            details.push(SendDetail::failed(&remote.name, "No RSVP token on file".to_owned()));
            continue;
        };

        let link = resources.config.rsvp_link(token);
        let attempt = tokio::time::timeout(
            timeout,
            resources.whatsapp.send_rsvp_link(
                &remote.name,
                &remote.phone,
                &link,
                Some(&remote.language),
                remote.personal_message.as_deref(),
                deadline,
            ),
        )
        .await
        .unwrap_or(Err(SendError::Timeout(timeout)));

        match attempt {
            Ok(delivery) => {
                if let Err(e) = client
                    .update_link_sent(&remote.record_id, OffsetDateTime::now_utc())
                    .await
                {
                    tracing::warn!(
                        "Invitation sent to {} but the link-sent marker failed: {}",
                        remote.name,
                        e
                    );
                }
                sent += 1;
                details.push(SendDetail::sent(&remote.name, delivery.destination, false));
            }
            Err(e) => {
                failed += 1;
                details.push(SendDetail::failed(&remote.name, e.to_string()));
            }
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "completed",
            "total": pending.len(),
            "sent": sent,
            "failed": failed,
            "details": details,
        })),
    )
        .into_response()
}

/// Inspect the reminder ledger.
#[utoipa::path(
    get,
    path = "/history",
    operation_id = "reminder_history",
    tag = ADMIN_TAG,
    summary = "List recent reminder ledger rows",
    description = "Returns ledger rows newest first, optionally restricted to one guest.",
    params(HistoryParams),
    responses(
        (status = 200, description = "Ledger rows", body = serde_json::Value,
            example = json!({"status": "ok", "history": []})),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Server misconfigured or database failure")
    )
)]
pub async fn reminder_history(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    let limit = params.limit.unwrap_or(50).min(500);
    match dispatch::reminder_history(&resources.db, params.guest_id, limit).await {
        Ok(rows) => (StatusCode::OK, Json(json!({ "status": "ok", "history": rows }))).into_response(),
        Err(e) => {
            tracing::error!("Failed to load reminder history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load reminder history" })),
            )
                .into_response()
        }
    }
}

/// Stop all future reminders for one guest.
#[utoipa::path(
    post,
    path = "/opt-out",
    operation_id = "opt_out_guest",
    tag = ADMIN_TAG,
    summary = "Opt a guest out of reminders",
    description = "Marks the guest's reminder preference as opted out. The guest is excluded \
from every future scheduled and manual send until the flag is cleared by hand.",
    params(KeyParams),
    request_body = OptOutRequest,
    responses(
        (status = 200, description = "Preference updated", body = serde_json::Value,
            example = json!({"status": "ok", "guest_id": 7, "opt_out": true})),
        (status = 401, description = "Invalid cron key"),
        (status = 404, description = "Unknown guest"),
        (status = 500, description = "Server misconfigured or database failure")
    )
)]
pub async fn opt_out_guest(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<KeyParams>,
    Json(payload): Json<OptOutRequest>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    match guest::Entity::find_by_id(payload.guest_id).one(&resources.db).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "Guest not found" })))
                .into_response();
        }
        Err(e) => {
            tracing::error!("Failed to look up guest {}: {}", payload.guest_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to look up guest" })),
            )
                .into_response();
        }
    }

    match dispatch::opt_out_guest(&resources.db, payload.guest_id).await {
        Ok(preference) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "guest_id": preference.guest_id,
                "opt_out": preference.opt_out,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to record opt-out for guest {}: {}", payload.guest_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to record opt-out" })),
            )
                .into_response()
        }
    }
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(sync_directory))
        .routes(routes!(send_manual_reminders))
        .routes(routes!(send_invitations))
        .routes(routes!(reminder_history))
        .routes(routes!(opt_out_guest))
}

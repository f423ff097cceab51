//! Scheduler-facing endpoints.
//!
//! An external cron service calls `/reminders/run` once per day. The handler
//! works out which stage (if any) is due, dispatches the batch, and reports
//! per-guest results. `/reminders/status` is the read-only companion used to
//! sanity-check the schedule without sending anything.

use crate::{
    AppResources,
    api::require_cron_key,
    dispatch::{self, DispatchRequest, Trigger},
    schedule::{self, Stage},
};
use axum::{Extension, Json, extract::Query, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

pub const CRON_TAG: &str = "Scheduler";

#[derive(Debug, Deserialize, IntoParams)]
pub struct RunParams {
    /// Shared secret; must match the configured cron secret.
    pub key: Option<String>,
    /// Override the schedule and run a specific stage (`initial`, `first`,
    /// `second` or `final`).
    pub force_stage: Option<String>,
    /// When truthy (`1`, `true`, `yes`), resolve candidates and report
    /// results without sending or writing anything.
    pub dry_run: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusParams {
    /// Shared secret; must match the configured cron secret.
    pub key: Option<String>,
}

fn truthy(flag: Option<&str>) -> bool {
    matches!(
        flag.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Run the reminder batch that is due today, if any.
#[utoipa::path(
    method(get, post),
    path = "/run",
    operation_id = "run_reminders",
    tag = CRON_TAG,
    summary = "Run today's reminder batch",
    description = "Checks the reminder schedule against today's date and dispatches the due stage \
to every eligible guest. Returns `no_action` when no stage is due. Use `force_stage` to run a \
specific stage regardless of the date, and `dry_run` to preview the batch without sending.",
    params(RunParams),
    responses(
        (status = 200, description = "Batch completed or no stage due", body = serde_json::Value,
            example = json!({"status": "completed", "stage": "second", "today": "2025-05-16", "dry_run": false, "total": 12, "sent": 11, "failed": 1, "skipped": 0, "details": []})),
        (status = 400, description = "Unknown force_stage value"),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Server misconfigured or batch failure")
    )
)]
pub async fn run_reminders(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<RunParams>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    let today = OffsetDateTime::now_utc().date();
    let deadline = resources.config.rsvp_deadline;
    let dry_run = truthy(params.dry_run.as_deref());

    let stage = match params.force_stage.as_deref() {
        Some(raw) => match raw.parse::<Stage>() {
            Ok(Stage::Manual) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "force_stage must name a scheduled stage, not 'manual'"
                    })),
                )
                    .into_response();
            }
            Ok(stage) => Some(stage),
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
                    .into_response();
            }
        },
        None => schedule::stage_due_today(deadline, today),
    };

    let Some(stage) = stage else {
        let upcoming: Vec<_> = schedule::all_reminder_dates(deadline)
            .into_iter()
            .filter(|(_, date)| *date >= today)
            .map(|(stage, date)| {
                json!({
                    "stage": stage,
                    "date": date.to_string(),
                    "days_before_deadline": stage.days_before(),
                })
            })
            .collect();

        return (
            StatusCode::OK,
            Json(json!({
                "status": "no_action",
                "message": "No reminder stage is scheduled for today",
                "today": today.to_string(),
                "rsvp_deadline": deadline.to_string(),
                "days_left": schedule::days_until_deadline(deadline, today),
                "upcoming_reminders": upcoming,
            })),
        )
            .into_response();
    };

    let request = DispatchRequest {
        trigger: Trigger::Scheduled,
        dry_run,
    };

    match dispatch::run_stage_batch(&resources, stage, &request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "stage": outcome.stage,
                "today": today.to_string(),
                "dry_run": outcome.dry_run,
                "total": outcome.total,
                "sent": outcome.sent,
                "failed": outcome.failed,
                "skipped": outcome.skipped,
                "details": outcome.details,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(
                name = "reminder.batch_failed",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                stage = %stage,
                error = %e,
                message = "Reminder batch aborted",
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Reminder batch failed: {e}") })),
            )
                .into_response()
        }
    }
}

/// Read-only view of the schedule and ledger statistics.
#[utoipa::path(
    get,
    path = "/status",
    operation_id = "reminder_status",
    tag = CRON_TAG,
    summary = "Inspect the reminder schedule",
    description = "Reports the full reminder calendar relative to today, the number of guests \
still awaiting an RSVP, and aggregate ledger statistics. Never sends anything.",
    params(StatusParams),
    responses(
        (status = 200, description = "Current schedule and statistics", body = serde_json::Value,
            example = json!({"status": "ok", "today": "2025-05-10", "rsvp_deadline": "2025-05-30", "days_until_deadline": 20, "today_reminder": null, "pending_guests": 42, "reminder_schedule": [], "statistics": {}})),
        (status = 401, description = "Invalid cron key"),
        (status = 500, description = "Server misconfigured or database failure")
    )
)]
pub async fn reminder_status(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<StatusParams>,
) -> impl IntoResponse {
    if let Err(denied) = require_cron_key(&resources.config, params.key.as_deref()) {
        return denied.into_response();
    }

    let today = OffsetDateTime::now_utc().date();
    let deadline = resources.config.rsvp_deadline;

    let reminder_schedule: Vec<_> = schedule::all_reminder_dates(deadline)
        .into_iter()
        .map(|(stage, date)| {
            let position = if date < today {
                "past"
            } else if date == today {
                "today"
            } else {
                "upcoming"
            };
            json!({
                "stage": stage,
                "date": date.to_string(),
                "days_before_deadline": stage.days_before(),
                "status": position,
            })
        })
        .collect();

    let pending = match crate::eligibility::pending_guests(&resources.db).await {
        Ok(guests) => guests.len(),
        Err(e) => {
            tracing::error!("Failed to resolve pending guests: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to resolve pending guests" })),
            )
                .into_response();
        }
    };

    let statistics = match dispatch::reminder_statistics(&resources.db).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Failed to compute reminder statistics: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to compute reminder statistics" })),
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "today": today.to_string(),
            "rsvp_deadline": deadline.to_string(),
            "days_until_deadline": schedule::days_until_deadline(deadline, today),
            "today_reminder": schedule::stage_due_today(deadline, today),
            "pending_guests": pending,
            "reminder_schedule": reminder_schedule,
            "statistics": statistics,
        })),
    )
        .into_response()
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(run_reminders))
        .routes(routes!(reminder_status))
}

//! OpenAPI/Utoipa configuration.

use crate::api::{admin::ADMIN_TAG, cron::CRON_TAG, health::MISC_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // Shared secret passed as the `key` query parameter on every
            // /reminders route.
            let cron_key = ApiKey::Query(ApiKeyValue::with_description(
                "key",
                "Shared cron secret. Requests without it are rejected with 401; a server with \
no secret configured rejects everything with 500.",
            ));
            components.add_security_scheme("CronKey", SecurityScheme::ApiKey(cron_key));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "RSVP Reminder API",
        version = "1.0.0",
        description = "Schedules and dispatches RSVP reminders over WhatsApp and email, keeps an \
auditable ledger of every attempt, and reconciles guests with the remote guest directory."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = CRON_TAG, description = "Scheduler endpoints driven by an external cron service"),
        (name = ADMIN_TAG, description = "Operator endpoints for ad-hoc sends and directory upkeep")
    )
)]
pub struct ApiDoc;

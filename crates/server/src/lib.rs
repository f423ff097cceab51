//! Reminder scheduling and notification dispatch for wedding RSVP tracking.
//!
//! The engine computes which reminder stage is due relative to the RSVP
//! deadline, resolves the guests still eligible to hear about it, sends over
//! WhatsApp or email, and records every attempt in an auditable ledger. An
//! optional remote guest directory is kept in sync in both directions.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::channel::{email::EmailChannel, whatsapp::WhatsAppChannel};
use crate::config::AppConfig;
use crate::directory::{DirectoryClient, SyncHandle};

pub mod api;
pub mod channel;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod eligibility;
pub mod entity;
pub mod error;
pub mod schedule;

/// Shared state handed to every request handler and batch run.
#[derive(Clone)]
pub struct AppResources {
    pub db: DatabaseConnection,
    pub email: EmailChannel,
    pub whatsapp: WhatsAppChannel,
    /// `None` when no directory is configured; sync endpoints answer 500.
    pub directory: Option<DirectoryClient>,
    pub sync: SyncHandle,
    pub config: Arc<AppConfig>,
}

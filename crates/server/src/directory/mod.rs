//! Reconciliation with the remote guest directory.
//!
//! The directory is a spreadsheet-like mirror the couple edits by hand; the
//! local database is the system of record for RSVPs. Reconciliation is
//! best-effort in both directions:
//!
//! - **pull** walks every remote row, matching local guests by token then
//!   phone, and creates, updates or deletes local rows to follow the remote
//!   list;
//! - **push** writes one guest's local RSVP state onto the matching remote
//!   record, fire-and-forget, via [`SyncHandle`]'s work queue so neither the
//!   RSVP write path nor a dispatch batch ever waits on the directory.
//!
//! Worker failures are logged and swallowed. The directory being down never
//! breaks a send.

pub mod client;
pub mod sync;

pub use client::{DirectoryClient, DirectoryGuest, RsvpPush};
pub use sync::{PullStats, SyncHandle, SyncJob, pull_directory, push_rsvp, spawn_sync_worker};

/// RSVP status vocabulary of the remote directory.
pub mod remote_status {
    pub const PENDING: &str = "Pending";
    pub const ATTENDING: &str = "Attending";
    pub const DECLINED: &str = "Declined";
    pub const CANCELLED: &str = "Cancelled";
}

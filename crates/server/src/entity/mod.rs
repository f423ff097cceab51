//! SeaORM entities for the local guest mirror and the reminder ledger.

pub mod guest;
pub mod reminder_batch;
pub mod reminder_history;
pub mod reminder_preference;
pub mod rsvp;

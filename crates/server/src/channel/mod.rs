//! Delivery channels for reminders.
//!
//! Two adapters share one contract: render the stage copy, deliver it, and
//! report the outcome as a value. Guests with a phone number go over
//! WhatsApp; guests with only an email address get the email variant.
//!
//! ## Submodules
//!
//! - `phone` - E.164 normalization and language detection
//! - `templates` - per-stage copy catalog and the HTML email shell
//! - `whatsapp` - carrier API adapter (Twilio-compatible)
//! - `email` - SMTP adapter

pub mod email;
pub mod phone;
pub mod templates;
pub mod whatsapp;

use crate::entity::guest;

/// Successful delivery details reported by a channel adapter.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Normalized destination the message actually went to.
    pub destination: String,
    /// Carrier-assigned message id, when the channel provides one.
    pub provider_id: Option<String>,
    /// Subject line, for channels that have one.
    pub subject: Option<String>,
}

/// The channel a guest is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    WhatsApp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Email => "email",
        }
    }
}

/// Pick the channel for a guest: phone wins, email is the fallback, and a
/// guest with neither is unreachable.
pub fn resolve_channel(guest: &guest::Model) -> Option<Channel> {
    if guest.phone.as_deref().is_some_and(|p| !p.trim().is_empty()) {
        Some(Channel::WhatsApp)
    } else if guest.email.as_deref().is_some_and(|e| !e.trim().is_empty()) {
        Some(Channel::Email)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn guest(phone: Option<&str>, email: Option<&str>) -> guest::Model {
        guest::Model {
            id: 1,
            name: "Test Guest".into(),
            phone: phone.map(Into::into),
            email: email.map(Into::into),
            token: "tok".into(),
            language_preference: None,
            has_plus_one: false,
            plus_one_used: false,
            is_family: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn phone_wins_over_email() {
        assert_eq!(
            resolve_channel(&guest(Some("+34612345678"), Some("a@b.example"))),
            Some(Channel::WhatsApp)
        );
    }

    #[test]
    fn email_is_the_fallback() {
        assert_eq!(
            resolve_channel(&guest(None, Some("a@b.example"))),
            Some(Channel::Email)
        );
        assert_eq!(
            resolve_channel(&guest(Some("  "), Some("a@b.example"))),
            Some(Channel::Email)
        );
    }

    #[test]
    fn unreachable_without_any_destination() {
        assert_eq!(resolve_channel(&guest(None, None)), None);
        assert_eq!(resolve_channel(&guest(Some(""), Some(""))), None);
    }
}

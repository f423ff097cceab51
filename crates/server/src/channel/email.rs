//! SMTP delivery for guests without a phone number.
//!
//! Messages go out as multipart/alternative with a plain-text part and the
//! rendered HTML shell, so clients that strip HTML still get the full copy.

use std::sync::Arc;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
};

use crate::channel::Delivery;
use crate::channel::templates::{Language, ReminderCopy, ReminderEmailTemplate};
use crate::config::ConfigError;
use crate::error::SendError;

/// Email adapter over the shared SMTP transport.
#[derive(Clone)]
pub struct EmailChannel {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl EmailChannel {
    /// Validates the configured sender address once, at startup.
    pub fn new(
        mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        from_address: &str,
    ) -> Result<Self, ConfigError> {
        let from = from_address.parse().map_err(|e| {
            ConfigError::Validation(format!("smtp.from is not a valid mailbox: {e}"))
        })?;
        Ok(Self { mailer, from })
    }

    /// Sends the rendered reminder copy to `to` as text + HTML.
    #[tracing::instrument(skip(self, copy))]
    pub async fn send_reminder(
        &self,
        to: &str,
        copy: &ReminderCopy,
        rsvp_link: &str,
        language: Language,
    ) -> Result<Delivery, SendError> {
        let recipient: Mailbox = to.parse().map_err(|e| {
            SendError::InvalidDestination(format!("invalid email address {to:?}: {e}"))
        })?;

        let html_body = ReminderEmailTemplate::from_copy(copy, rsvp_link, language)
            .render_html()
            .map_err(|e| SendError::Transport(format!("email template render failed: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(copy.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(copy.body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| SendError::Transport(format!("failed to build email: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| SendError::Transport(format!("smtp send failed: {e}")))?;

        tracing::info!("Sent reminder email to {to}: {}", copy.subject);

        Ok(Delivery {
            destination: to.to_string(),
            provider_id: None,
            subject: Some(copy.subject.clone()),
        })
    }
}

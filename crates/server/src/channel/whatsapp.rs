//! WhatsApp delivery through a Twilio-compatible carrier API.
//!
//! Every send normalizes the destination to E.164 first; a number that
//! cannot be normalized never reaches the carrier. The carrier call itself
//! is one form-encoded POST per message.

use serde::Deserialize;
use time::Date;

use crate::channel::Delivery;
use crate::channel::phone::normalize_phone;
use crate::channel::templates::{Language, ReminderCopy, invitation_copy, language_for_guest};
use crate::config::WhatsAppConfig;
use crate::error::SendError;

/// Carrier API adapter. Cheap to clone; the inner client is pooled.
#[derive(Clone)]
pub struct WhatsAppChannel {
    http: reqwest::Client,
    config: WhatsAppConfig,
    default_country_code: String,
}

#[derive(Deserialize)]
struct MessageCreated {
    sid: String,
}

impl WhatsAppChannel {
    pub fn new(http: reqwest::Client, config: WhatsAppConfig, default_country_code: String) -> Self {
        Self {
            http,
            config,
            default_country_code,
        }
    }

    /// Sends a free-form message to `to_phone`.
    #[tracing::instrument(skip(self, body))]
    pub async fn send_message(&self, to_phone: &str, body: &str) -> Result<Delivery, SendError> {
        let normalized = normalize_phone(to_phone, &self.default_country_code)
            .map_err(|e| SendError::InvalidDestination(e.to_string()))?;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base_url, self.config.account_sid
        );
        let from = format!("whatsapp:{}", self.config.from_number);
        let to = format!("whatsapp:{normalized}");
        let params = [("Body", body), ("From", from.as_str()), ("To", to.as_str())];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("carrier request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::Transport(format!(
                "carrier returned HTTP {status}: {detail}"
            )));
        }

        let created: MessageCreated = response
            .json()
            .await
            .map_err(|e| SendError::Transport(format!("carrier response parse failed: {e}")))?;

        tracing::info!("Sent WhatsApp message to {normalized}: sid={}", created.sid);

        Ok(Delivery {
            destination: normalized,
            provider_id: Some(created.sid),
            subject: None,
        })
    }

    /// Sends rendered reminder copy. WhatsApp has no subject line, so only
    /// the body goes out; the subject still ends up in the history row.
    pub async fn send_reminder(
        &self,
        to_phone: &str,
        copy: &ReminderCopy,
    ) -> Result<Delivery, SendError> {
        let mut delivery = self.send_message(to_phone, &copy.body).await?;
        delivery.subject = Some(copy.subject.clone());
        Ok(delivery)
    }

    /// Sends the initial RSVP invitation with the guest's personal link.
    ///
    /// A non-empty `personal_message` replaces the entire invitation body.
    /// Whoever writes one is expected to include the link themselves.
    pub async fn send_rsvp_link(
        &self,
        name: &str,
        to_phone: &str,
        rsvp_link: &str,
        language_preference: Option<&str>,
        personal_message: Option<&str>,
        deadline: Date,
    ) -> Result<Delivery, SendError> {
        if let Some(message) = personal_message.map(str::trim).filter(|m| !m.is_empty()) {
            return self.send_message(to_phone, message).await;
        }

        let language: Language =
            language_for_guest(language_preference, Some(to_phone), &self.default_country_code);
        let body = invitation_copy(language, name, rsvp_link, deadline);
        self.send_message(to_phone, &body).await
    }
}

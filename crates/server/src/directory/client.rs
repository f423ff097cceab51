//! HTTP client for the Airtable-style guest directory API.
//!
//! The API omits empty fields from record payloads, so every field is
//! optional on the wire; [`DirectoryGuest`] flattens records into concrete
//! values with the directory's defaults (language `es`, status `Pending`)
//! applied. Timestamps travel as ISO strings and are kept as strings here;
//! callers parse them only where they need real dates.

use serde::Deserialize;
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::config::DirectoryConfig;
use crate::directory::remote_status;
use crate::error::SyncError;
use crate::schedule::Stage;

/// One remote directory row.
#[derive(Debug, Clone)]
pub struct DirectoryGuest {
    pub record_id: String,
    pub name: String,
    pub phone: String,
    pub language: String,
    pub token: Option<String>,
    pub status: String,
    pub rsvp_date: Option<String>,
    pub adults_count: Option<i32>,
    pub children_count: Option<i32>,
    pub hotel: Option<String>,
    pub dietary_notes: Option<String>,
    pub transport_church: bool,
    pub transport_reception: bool,
    pub transport_hotel: bool,
    /// When the RSVP link went out, if ever.
    pub link_sent: Option<String>,
    /// Sent timestamps for the four scheduled stages, in stage order.
    pub reminders_sent: [Option<String>; 4],
    /// Hand-written invitation override; replaces the whole invitation body.
    pub personal_message: Option<String>,
}

impl DirectoryGuest {
    fn from_record(record: RemoteRecord) -> Self {
        let fields = record.fields;
        Self {
            record_id: record.id,
            name: fields.name.unwrap_or_default(),
            phone: fields.phone.unwrap_or_default(),
            language: fields.language.unwrap_or_else(|| "es".to_owned()),
            token: fields.token.filter(|t| !t.is_empty()),
            status: fields
                .status
                .unwrap_or_else(|| remote_status::PENDING.to_owned()),
            rsvp_date: fields.rsvp_date,
            adults_count: fields.adults_count,
            children_count: fields.children_count,
            hotel: fields.hotel,
            dietary_notes: fields.dietary_notes,
            transport_church: fields.transport_church.unwrap_or(false),
            transport_reception: fields.transport_reception.unwrap_or(false),
            transport_hotel: fields.transport_hotel.unwrap_or(false),
            link_sent: fields.link_sent,
            reminders_sent: [
                fields.reminder_1,
                fields.reminder_2,
                fields.reminder_3,
                fields.reminder_4,
            ],
            personal_message: fields.personal_message,
        }
    }

    pub fn has_responded(&self) -> bool {
        self.status != remote_status::PENDING
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<RemoteRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteRecord {
    id: String,
    #[serde(default)]
    fields: RemoteFields,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteFields {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Phone")]
    phone: Option<String>,
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(rename = "Token")]
    token: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
    #[serde(rename = "RSVP Date")]
    rsvp_date: Option<String>,
    #[serde(rename = "Adults Count")]
    adults_count: Option<i32>,
    #[serde(rename = "Children Count")]
    children_count: Option<i32>,
    #[serde(rename = "Hotel")]
    hotel: Option<String>,
    #[serde(rename = "Dietary Notes")]
    dietary_notes: Option<String>,
    #[serde(rename = "Transport Church")]
    transport_church: Option<bool>,
    #[serde(rename = "Transport Reception")]
    transport_reception: Option<bool>,
    #[serde(rename = "Transport Hotel")]
    transport_hotel: Option<bool>,
    #[serde(rename = "Link Sent")]
    link_sent: Option<String>,
    #[serde(rename = "Reminder 1")]
    reminder_1: Option<String>,
    #[serde(rename = "Reminder 2")]
    reminder_2: Option<String>,
    #[serde(rename = "Reminder 3")]
    reminder_3: Option<String>,
    #[serde(rename = "Reminder 4")]
    reminder_4: Option<String>,
    #[serde(rename = "Personal Message")]
    personal_message: Option<String>,
}

/// Field set pushed onto a remote record after a local RSVP change.
#[derive(Debug, Clone)]
pub struct RsvpPush {
    pub status: &'static str,
    pub rsvp_date: Date,
    pub adults_count: Option<i32>,
    pub children_count: Option<i32>,
    pub hotel: Option<String>,
    pub dietary_notes: Option<String>,
    pub transport_church: bool,
    pub transport_reception: bool,
    pub transport_hotel: bool,
}

/// Bearer-authenticated REST client for the directory. List calls follow
/// offset pagination until the server stops returning an offset token.
#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    config: DirectoryConfig,
}

impl DirectoryClient {
    pub fn new(http: reqwest::Client, config: DirectoryConfig) -> Self {
        Self { http, config }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/v0/{}/{}",
            self.config.api_base_url, self.config.base_id, self.config.table
        )
    }

    async fn list(&self, filter_formula: Option<&str>) -> Result<Vec<DirectoryGuest>, SyncError> {
        let mut guests = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(self.table_url())
                .bearer_auth(&self.config.api_key);
            if let Some(formula) = filter_formula {
                request = request.query(&[("filterByFormula", formula)]);
            }
            if let Some(offset_token) = offset.as_deref() {
                request = request.query(&[("offset", offset_token)]);
            }

            let response = Self::check(request.send().await?).await?;
            let page: RecordPage = response.json().await?;
            guests.extend(page.records.into_iter().map(DirectoryGuest::from_record));
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(guests)
    }

    pub async fn list_all(&self) -> Result<Vec<DirectoryGuest>, SyncError> {
        self.list(None).await
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<DirectoryGuest>, SyncError> {
        let formula = format!("{{Token}} = '{token}'");
        Ok(self.list(Some(&formula)).await?.into_iter().next())
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryGuest>, SyncError> {
        let formula = format!("{{Phone}} = '{phone}'");
        Ok(self.list(Some(&formula)).await?.into_iter().next())
    }

    /// Remote rows with a token whose RSVP link has never been sent.
    pub async fn list_needing_invite(&self) -> Result<Vec<DirectoryGuest>, SyncError> {
        self.list(Some("AND({Token} != '', {Link Sent} = '')"))
            .await
    }

    /// Stamps the stage's sent marker on a remote record. No-op for stages
    /// without a remote marker field.
    pub async fn mark_reminder_sent(
        &self,
        record_id: &str,
        stage: Stage,
        sent_at: OffsetDateTime,
    ) -> Result<(), SyncError> {
        let Some(field) = stage.remote_field() else {
            return Ok(());
        };
        let mut fields = Map::new();
        fields.insert(field.to_owned(), Value::String(format_timestamp(sent_at)));
        self.patch(record_id, fields).await
    }

    pub async fn update_link_sent(
        &self,
        record_id: &str,
        sent_at: OffsetDateTime,
    ) -> Result<(), SyncError> {
        let mut fields = Map::new();
        fields.insert(
            "Link Sent".to_owned(),
            Value::String(format_timestamp(sent_at)),
        );
        self.patch(record_id, fields).await
    }

    pub async fn update_rsvp_fields(
        &self,
        record_id: &str,
        push: &RsvpPush,
    ) -> Result<(), SyncError> {
        let mut fields = Map::new();
        fields.insert("Status".to_owned(), Value::String(push.status.to_owned()));
        fields.insert(
            "RSVP Date".to_owned(),
            Value::String(push.rsvp_date.to_string()),
        );
        if let Some(adults) = push.adults_count {
            fields.insert("Adults Count".to_owned(), Value::from(adults));
        }
        if let Some(children) = push.children_count {
            fields.insert("Children Count".to_owned(), Value::from(children));
        }
        if let Some(hotel) = &push.hotel {
            fields.insert("Hotel".to_owned(), Value::String(hotel.clone()));
        }
        if let Some(notes) = &push.dietary_notes {
            fields.insert("Dietary Notes".to_owned(), Value::String(notes.clone()));
        }
        fields.insert(
            "Transport Church".to_owned(),
            Value::Bool(push.transport_church),
        );
        fields.insert(
            "Transport Reception".to_owned(),
            Value::Bool(push.transport_reception),
        );
        fields.insert(
            "Transport Hotel".to_owned(),
            Value::Bool(push.transport_hotel),
        );
        self.patch(record_id, fields).await
    }

    async fn patch(&self, record_id: &str, fields: Map<String, Value>) -> Result<(), SyncError> {
        let url = format!("{}/{record_id}", self.table_url());
        let body = serde_json::json!({ "fields": fields });
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let context = response.text().await.unwrap_or_default();
        Err(SyncError::Remote { status, context })
    }
}

fn format_timestamp(when: OffsetDateTime) -> String {
    when.format(&Rfc3339).unwrap_or_else(|_| when.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_defaults_applied() {
        let record: RemoteRecord = serde_json::from_value(serde_json::json!({
            "id": "recXYZ",
            "fields": { "Name": "Ana García", "Phone": "612 345 678" }
        }))
        .unwrap();
        let guest = DirectoryGuest::from_record(record);

        assert_eq!(guest.record_id, "recXYZ");
        assert_eq!(guest.language, "es");
        assert_eq!(guest.status, "Pending");
        assert!(!guest.has_responded());
        assert!(guest.token.is_none());
        assert!(!guest.transport_church);
        assert_eq!(guest.reminders_sent, [None, None, None, None]);
    }

    #[test]
    fn responded_statuses() {
        let mut record = RemoteRecord {
            id: "rec1".to_owned(),
            fields: RemoteFields::default(),
        };
        record.fields.status = Some("Attending".to_owned());
        assert!(DirectoryGuest::from_record(record).has_responded());
    }

    #[test]
    fn empty_fields_object_parses() {
        let page: RecordPage = serde_json::from_value(serde_json::json!({
            "records": [{ "id": "rec1" }],
            "offset": "itrNEXT"
        }))
        .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.offset.as_deref(), Some("itrNEXT"));
    }
}

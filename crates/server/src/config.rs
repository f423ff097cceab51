use serde::{Deserialize, Deserializer};
use thiserror::Error;
use time::Date;
use time::macros::format_description;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Credentials for the WhatsApp carrier API (Twilio-compatible).
#[derive(Clone, Deserialize)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 format, e.g. "+14155238886".
    pub from_number: String,
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base_url: String,
}

/// Remote guest directory (Airtable-compatible). Optional: without it the
/// engine runs standalone and all sync operations are disabled.
#[derive(Clone, Deserialize)]
pub struct DirectoryConfig {
    pub api_key: String,
    pub base_id: String,
    #[serde(default = "default_directory_table")]
    pub table: String,
    #[serde(default = "default_directory_api_base")]
    pub api_base_url: String,
}

#[derive(Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Public site base for RSVP links: `{base_url}/rsvp/{token}`.
    pub base_url: String,
    /// Shared secret for the `/reminders/*` trigger endpoints. Left empty,
    /// the endpoints answer 500 so a scheduler misconfiguration is loud.
    #[serde(default)]
    pub cron_secret: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub rsvp_deadline: Date,
    /// Country code assumed for bare national phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    /// Upper bound for a single adapter send, in seconds.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    pub smtp: SmtpConfig,
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
}

impl AppConfig {
    pub fn rsvp_link(&self, token: &str) -> String {
        format!("{}/rsvp/{token}", self.base_url)
    }

    pub fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.send_timeout_secs)
    }
}

fn default_country_code() -> String {
    "+34".into()
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_whatsapp_api_base() -> String {
    "https://api.twilio.com".into()
}

fn default_directory_table() -> String {
    "Guests".into()
}

fn default_directory_api_base() -> String {
    "https://api.airtable.com".into()
}

/// Dates are configured as `YYYY-MM-DD`.
fn deserialize_date<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Date::parse(&raw, &format_description!("[year]-[month]-[day]"))
        .map_err(serde::de::Error::custom)
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variable override convention: any var matching the key path
/// separated by double underscores (e.g. `SMTP__PORT`, `WHATSAPP__AUTH_TOKEN`)
/// overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let mut app: AppConfig = cfg.try_deserialize()?;

    if app.smtp.port == 0 {
        return Err(ConfigError::Validation("smtp.port must be > 0".into()));
    }
    if !app.cron_secret.is_empty() && app.cron_secret.len() < 16 {
        return Err(ConfigError::Validation(
            "cron_secret must be at least 16 characters".into(),
        ));
    }
    if !app.default_country_code.starts_with('+') {
        return Err(ConfigError::Validation(
            "default_country_code must start with '+'".into(),
        ));
    }
    if app.send_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "send_timeout_secs must be > 0".into(),
        ));
    }
    // Normalize so rsvp_link never doubles the slash.
    app.base_url = app.base_url.trim_end_matches('/').to_string();

    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            base_url: "https://wedding.example.org".into(),
            cron_secret: "0123456789abcdef".into(),
            rsvp_deadline: date!(2026 - 05 - 06),
            default_country_code: "+34".into(),
            send_timeout_secs: 30,
            smtp: SmtpConfig {
                server: "localhost".into(),
                port: 25,
                username: "test".into(),
                password: "test".into(),
                from: "noreply@wedding.example.org".into(),
            },
            whatsapp: WhatsAppConfig {
                account_sid: "ACtest".into(),
                auth_token: "token".into(),
                from_number: "+14155238886".into(),
                api_base_url: default_whatsapp_api_base(),
            },
            directory: None,
        }
    }

    #[test]
    fn rsvp_link_joins_token_onto_base() {
        let config = base_config();
        assert_eq!(
            config.rsvp_link("abc123"),
            "https://wedding.example.org/rsvp/abc123"
        );
    }

    #[test]
    fn date_format_parses() {
        let date = Date::parse(
            "2026-05-06",
            &format_description!("[year]-[month]-[day]"),
        )
        .unwrap();
        assert_eq!(date, date!(2026 - 05 - 06));
    }

    #[test]
    fn send_timeout_converts_to_duration() {
        let config = base_config();
        assert_eq!(config.send_timeout(), std::time::Duration::from_secs(30));
    }
}

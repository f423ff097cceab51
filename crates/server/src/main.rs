use lettre::{AsyncSmtpTransport, Tokio1Executor, transport::smtp::authentication::Credentials};
use rsvp_reminder_service::AppResources;
use rsvp_reminder_service::api::start_webserver;
use rsvp_reminder_service::channel::{email::EmailChannel, whatsapp::WhatsAppChannel};
use rsvp_reminder_service::config::load_config_or_panic;
use rsvp_reminder_service::directory::{DirectoryClient, SyncHandle, spawn_sync_worker};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "rsvp_reminder_service=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    dotenvy::dotenv().ok();

    initialize_tracing();

    // Load config
    let config = Arc::new(load_config_or_panic());

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider).expect("Failed to install crypto provider");

    // Set up SeaORM database connection
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Set up lettre SMTP client
    let creds = Credentials::new(config.smtp.username.clone(), config.smtp.password.clone());
    let mailer = Arc::new(
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp.server)
            .expect("Failed to build SMTP transport")
            .port(config.smtp.port)
            .credentials(creds)
            .build(),
    );

    let email = EmailChannel::new(mailer, &config.smtp.from)
        .expect("Invalid smtp.from address in configuration");

    let http = reqwest::Client::new();
    let whatsapp = WhatsAppChannel::new(
        http.clone(),
        config.whatsapp.clone(),
        config.default_country_code.clone(),
    );

    // The directory is optional: without it the engine runs standalone and
    // every sync surface reports itself as unconfigured.
    let (directory, sync) = match &config.directory {
        Some(directory_config) => {
            let client = DirectoryClient::new(http, directory_config.clone());
            let handle = spawn_sync_worker(db.clone(), client.clone());
            (Some(client), handle)
        }
        None => {
            tracing::info!("No guest directory configured; running standalone");
            (None, SyncHandle::disabled())
        }
    };

    let resources = AppResources {
        db,
        email,
        whatsapp,
        directory,
        sync,
        config,
    };
    tracing::info!(
        rsvp_deadline = %resources.config.rsvp_deadline,
        directory = %resources.config.directory.is_some(),
        "reminder engine configuration"
    );

    start_webserver(resources).await?;
    Ok(())
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use clinicbook::clock::SystemClock;
use clinicbook::config::AppConfig;
use clinicbook::db;
use clinicbook::services::email::smtp::SmtpEmailProvider;
use clinicbook::services::email::{DisabledEmail, EmailProvider};
use clinicbook::services::messaging::twilio::TwilioSmsProvider;
use clinicbook::services::messaging::{DisabledMessaging, MessagingProvider};
use clinicbook::services::refund::RefundPolicy;
use clinicbook::services::reminders;
use clinicbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let messaging: Box<dyn MessagingProvider> =
        if config.twilio_account_sid.is_empty() || config.twilio_auth_token.is_empty() {
            tracing::warn!("Twilio credentials missing, SMS notifications disabled");
            Box::new(DisabledMessaging)
        } else {
            Box::new(TwilioSmsProvider::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_phone_number.clone(),
            ))
        };

    let email: Box<dyn EmailProvider> = if config.smtp_host.is_empty() || config.email_from.is_empty() {
        tracing::warn!("SMTP not configured, email notifications disabled");
        Box::new(DisabledEmail)
    } else {
        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "using SMTP email provider");
        Box::new(SmtpEmailProvider::new(
            &config.smtp_host,
            config.smtp_port,
            &config.smtp_username,
            &config.smtp_password,
            &config.email_from,
        )?)
    };

    let (events, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Box::new(SystemClock),
        messaging,
        email,
        refund_policy: RefundPolicy::default(),
        events,
    });

    let scan_every = Duration::from_secs(config.reminder_scan_seconds.max(1));
    let reminder_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(scan_every);
        loop {
            ticker.tick().await;
            if let Err(e) = reminders::send_due_reminders(&reminder_state).await {
                tracing::error!(error = %e, "reminder scan failed");
            }
        }
    });

    let app = clinicbook::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

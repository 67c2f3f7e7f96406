//! Staffport dashboard server binary.
//!
//! Reads configuration from the environment (with a `.env` file for
//! development), runs migrations, wires the email backend and the SAML
//! provider, and serves the router over plain HTTP. TLS termination is
//! the proxy's job.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use staffport_api::config::AppConfig;
use staffport_api::saml::SamlProvider;
use staffport_core::email::fake::FakeSender;
use staffport_core::email::mailgun::MailgunSender;
use staffport_core::email::ses::SesSender;
use staffport_core::email::Sender;

/// CLI arguments for the dashboard server.
#[derive(Parser, Debug)]
#[command(name = "staffport_server", about = "Staffport dashboard server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8100)]
    port: u16,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/staffport"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,staffport_api=debug,staffport_core=debug".parse().unwrap()
            }),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(AppConfig::from_env());

    info!(
        port = args.port,
        environment = ?config.environment,
        "starting staffport_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    staffport_api::migrate(&pool).await?;

    let mailer = build_mailer(&config).await;

    let saml = match &config.saml_idp_metadata_url {
        Some(metadata_url) => {
            let provider = SamlProvider::from_idp_metadata(
                &config.saml_sp_entity_id,
                &config.saml_acs_url,
                metadata_url,
            )
            .await?;
            info!(idp = %provider.idp_issuer(), "SAML provider configured");
            Some(Arc::new(provider))
        }
        None => {
            warn!("SAML_IDP_METADATA_URL not set; interactive login is disabled");
            None
        }
    };

    let state = staffport_api::AppState {
        cookie_key: config.cookie_key(),
        pool,
        config,
        saml,
        mailer,
    };
    let app = staffport_api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Selects the delivery backend from `EMAIL_SERVICE`.
async fn build_mailer(config: &AppConfig) -> Arc<dyn Sender> {
    match config.email_service.as_str() {
        "mailgun" => Arc::new(MailgunSender::new(
            config.mailgun_domain.clone(),
            config.mailgun_api_key.clone(),
            config.sandbox_email.clone(),
        )),
        "ses" => Arc::new(SesSender::from_env(config.sandbox_email.clone()).await),
        _ => Arc::new(FakeSender::new(Some(PathBuf::from("email/tmp")))),
    }
}

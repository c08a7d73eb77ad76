use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use productr_server::config::{Config, ConfigError};
use productr_server::services::auth::AuthError;
use productr_server::services::mailer::{LogMailer, MailError, OtpMailer, SmtpMailer};
use productr_server::services::password::PasswordHasher;
use productr_server::store::Store;
use productr_server::{build_app, seed, AppState, Policies};

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("mailer error: {0}")]
    Mail(#[from] MailError),

    #[error("failed to seed demo data: {0}")]
    Seed(#[from] AuthError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn cors_layer(origins: &str) -> CorsLayer {
    if origins == "*" {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;

    let store = match (&config.database_url, config.demo_mode) {
        (Some(url), false) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Connected to database");
            Store::postgres(pool)
        }
        _ => {
            tracing::warn!("Running in demo mode: data is kept in memory and lost on restart");
            Store::in_memory()
        }
    };

    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set, using the built-in demo secret");
    }
    if config.otp_policy.is_fixed() {
        tracing::warn!("OTP_FIXED_CODE is set: every OTP is the same code. Use for testing only");
    }

    let mailer: Arc<dyn OtpMailer> = match &config.mail {
        Some(mail) => {
            tracing::info!(host = %mail.host, "Sending OTP mail over SMTP");
            Arc::new(SmtpMailer::new(mail)?)
        }
        None => {
            tracing::info!("SMTP not configured, OTP codes will only be logged");
            Arc::new(LogMailer)
        }
    };

    let policies = Policies {
        otp_auto_provision: config.otp_auto_provision,
        expose_demo_otp: !store.is_persistent(),
        removal: config.removal,
    };

    let state = AppState::new(
        store,
        config.jwt_secret.as_str(),
        config.otp_policy.clone(),
        mailer,
        PasswordHasher::default(),
        policies,
    );

    if config.seed_demo_data {
        seed::load_demo_data(&state).await?;
    }

    let app = build_app(state).layer(cors_layer(&config.cors_origins));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);
    tracing::info!("Swagger UI at http://{}/docs/", config.listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "productr_server=debug,tower_http=debug".into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Startup failed");
        std::process::exit(1);
    }
}

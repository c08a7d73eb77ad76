use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::services::catalog::RemovalPolicy;
use crate::services::otp::{CodePolicy, OTP_LENGTH};

/// Signing secret used in demo mode when `JWT_SECRET` is unset.
const DEMO_JWT_SECRET: &str = "productr-demo-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Outbound SMTP settings for OTP mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// In-memory store instead of Postgres.
    pub demo_mode: bool,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// True when `jwt_secret` is the built-in demo value.
    pub jwt_secret_is_default: bool,
    /// Comma-separated allowed CORS origins. If empty or "*", allows all origins.
    pub cors_origins: String,
    pub otp_policy: CodePolicy,
    pub otp_auto_provision: bool,
    pub removal: RemovalPolicy,
    pub seed_demo_data: bool,
    /// `None` means OTP codes are only logged.
    pub mail: Option<MailConfig>,
}

fn var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(name: &'static str) -> Result<Option<bool>, ConfigError> {
    var(name)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var: name,
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        })
        .transpose()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = var("DATABASE_URL");
        let demo_mode = parse_flag("DEMO_MODE")?.unwrap_or(database_url.is_none());
        if !demo_mode && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let (jwt_secret, jwt_secret_is_default) = match var("JWT_SECRET") {
            Some(secret) => (secret, false),
            None if demo_mode => (DEMO_JWT_SECRET.to_string(), true),
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let otp_policy = match var("OTP_FIXED_CODE") {
            Some(code) => {
                if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::Invalid {
                        var: "OTP_FIXED_CODE",
                        reason: format!("expected {OTP_LENGTH} digits"),
                    });
                }
                CodePolicy::Fixed(code)
            }
            None => CodePolicy::Random,
        };

        let mail = match var("SMTP_HOST") {
            Some(host) => {
                let username = var("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?;
                Some(MailConfig {
                    host,
                    port: parse_var("SMTP_PORT")?.unwrap_or(587),
                    password: var("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
                    from_address: var("MAIL_FROM").unwrap_or_else(|| username.clone()),
                    username,
                })
            }
            None => None,
        };

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            demo_mode,
            database_url,
            jwt_secret,
            jwt_secret_is_default,
            cors_origins: var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string()),
            otp_policy,
            otp_auto_provision: parse_flag("OTP_AUTO_PROVISION")?.unwrap_or(true),
            removal: parse_var("PRODUCT_REMOVAL")?.unwrap_or_default(),
            seed_demo_data: parse_flag("SEED_DEMO_DATA")?.unwrap_or(demo_mode),
            mail,
        })
    }
}

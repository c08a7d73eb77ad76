//! Out-of-band delivery of OTP codes.
//!
//! Delivery never decides the outcome of an OTP request: callers spawn it and
//! only log failures.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::MailConfig;
use crate::services::otp::OTP_TTL_MINUTES;

const OTP_SUBJECT: &str = "Your Productr Login OTP";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError>;
}

/// Writes the code to the log instead of sending it. Used when SMTP is not
/// configured.
pub struct LogMailer;

#[async_trait]
impl OtpMailer for LogMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        tracing::info!(to = %to, code = %code, "OTP issued (mail delivery not configured)");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

fn otp_text_body(code: &str) -> String {
    format!(
        "Your one-time password for Productr is: {code}\n\n\
         It expires in {OTP_TTL_MINUTES} minutes. If you did not request it, ignore this email.\n"
    )
}

fn otp_html_body(code: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 500px; margin: 0 auto;">
  <h2 style="color: #001a4d;">Productr</h2>
  <p>Your one-time password for Productr is:</p>
  <div style="background: #f5f5f5; padding: 20px; border-radius: 8px; text-align: center;">
    <h1 style="color: #667eea; letter-spacing: 5px; margin: 0;">{code}</h1>
  </div>
  <p style="color: #666;">It expires in {OTP_TTL_MINUTES} minutes.</p>
  <p style="color: #666;">If you did not request it, ignore this email.</p>
</div>"#
    )
}

#[async_trait]
impl OtpMailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(OTP_SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(otp_text_body(code)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(otp_html_body(code)),
                    ),
            )?;

        self.transport.send(email).await?;
        tracing::info!(to = %to, "OTP email sent");
        Ok(())
    }
}

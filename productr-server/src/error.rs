//! Unified error handling.
//!
//! Every handler returns `Result<T, AppError>`. Responses carry a JSON body of
//! the form `{"message": "..."}` and never expose internal error details.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::services::otp::OtpError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, malformed, or expired bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    fn is_internal(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::Token(_) | AuthError::PasswordHash(_) | AuthError::Store(_)
            ),
            Self::Catalog(err) => matches!(err, CatalogError::Store(_)),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        if self.is_internal() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            Self::Auth(err) => match err {
                AuthError::Validation(_) | AuthError::Otp(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials | AuthError::NoAccount => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(err) => match err {
                CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Forbidden(_) => StatusCode::FORBIDDEN,
                CatalogError::UnknownSeller => StatusCode::UNAUTHORIZED,
                CatalogError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        if self.is_internal() {
            return "Server error".to_string();
        }
        match self {
            Self::Auth(err) => match err {
                AuthError::Validation(msg) => msg.clone(),
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => "User already exists".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::NoAccount => "No account found for this email".to_string(),
                AuthError::Otp(OtpError::NotFound) => {
                    "OTP not found or expired. Please request a new OTP.".to_string()
                }
                AuthError::Otp(OtpError::Expired) => {
                    "OTP has expired. Please request a new OTP.".to_string()
                }
                AuthError::Otp(OtpError::Invalid) => "Invalid OTP. Please try again.".to_string(),
                _ => "Server error".to_string(),
            },
            Self::Catalog(err) => match err {
                CatalogError::Validation(msg) => msg.clone(),
                CatalogError::NotFound => "Product not found".to_string(),
                CatalogError::Forbidden(action) => {
                    format!("Not authorized to {action} this product")
                }
                CatalogError::UnknownSeller => "Token is not valid".to_string(),
                CatalogError::Store(_) => "Server error".to_string(),
            },
            Self::BadRequest(msg) => msg.clone(),
            Self::Unauthorized(msg) => (*msg).to_string(),
            Self::Internal(_) => "Server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(error = %self, "Request error");
        }

        let body = ErrorBody {
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `Json` whose rejection is an [`AppError`], so malformed bodies get the
/// uniform error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` with an [`AppError`] rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

pub type Result<T> = std::result::Result<T, AppError>;

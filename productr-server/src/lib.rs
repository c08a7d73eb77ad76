pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seed;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::catalog::RemovalPolicy;
use crate::services::mailer::OtpMailer;
use crate::services::otp::{CodePolicy, OtpLedger};
use crate::services::password::PasswordHasher;
use crate::store::Store;

/// Behaviour switches fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct Policies {
    /// Create an account when a valid OTP arrives for an unknown email.
    pub otp_auto_provision: bool,
    /// Echo the issued OTP in the send-otp response. Demo mode only.
    pub expose_demo_otp: bool,
    pub removal: RemovalPolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            otp_auto_provision: true,
            expose_demo_otp: false,
            removal: RemovalPolicy::Hard,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub jwt_secret: Arc<str>,
    pub otp: Arc<OtpLedger>,
    pub mailer: Arc<dyn OtpMailer>,
    pub hasher: PasswordHasher,
    pub policies: Policies,
}

impl AppState {
    pub fn new(
        store: Store,
        jwt_secret: impl Into<Arc<str>>,
        otp_policy: CodePolicy,
        mailer: Arc<dyn OtpMailer>,
        hasher: PasswordHasher,
        policies: Policies,
    ) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.into(),
            otp: Arc::new(OtpLedger::new(otp_policy)),
            mailer,
            hasher,
            policies,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(policies: Policies) -> Self {
        Self::new(
            Store::in_memory(),
            "test-secret",
            CodePolicy::Fixed("111111".to_string()),
            Arc::new(crate::services::mailer::LogMailer),
            PasswordHasher::fast_insecure(),
            policies,
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::signup,
        routes::auth::login,
        routes::auth::send_otp,
        routes::auth::verify_otp,
        routes::auth::get_profile,
        routes::auth::update_profile,
        routes::products::list_products,
        routes::products::create_product,
        routes::products::my_products,
        routes::products::get_product,
        routes::products::update_product,
        routes::products::delete_product,
        routes::health::health,
    ),
    components(schemas(
        models::user::SignupRequest,
        models::user::LoginRequest,
        models::user::SendOtpRequest,
        models::user::VerifyOtpRequest,
        models::user::UpdateProfileRequest,
        models::user::UserResponse,
        models::user::AuthResponse,
        models::user::SendOtpResponse,
        models::user::VerifyOtpResponse,
        models::user::ProfileResponse,
        models::product::Category,
        models::product::Review,
        models::product::CreateProductRequest,
        models::product::UpdateProductRequest,
        models::product::SellerSummary,
        models::product::ProductResponse,
        models::product::Pagination,
        models::product::ProductListResponse,
        models::product::ProductEnvelope,
        models::product::ProductDetailResponse,
        models::product::MyProductsResponse,
        models::product::DeleteResponse,
        routes::health::HealthResponse,
        error::ErrorBody,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Signup, login, OTP, and profile"),
        (name = "Products", description = "Product listings"),
        (name = "Health", description = "Liveness and storage mode")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

/// The full HTTP application minus CORS, which depends on deployment config.
pub fn build_app(state: AppState) -> Router {
    routes::api_router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

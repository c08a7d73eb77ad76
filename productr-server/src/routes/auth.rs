use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::{ApiJson, ErrorBody, Result};
use crate::middleware::auth::AuthUser;
use crate::models::user::{
    AuthResponse, LoginRequest, ProfileResponse, SendOtpRequest, SendOtpResponse, SignupRequest,
    UpdateProfileRequest, UserResponse, VerifyOtpRequest, VerifyOtpResponse,
};
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/profile", get(get_profile).put(update_profile))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    tag = "Auth"
)]
pub(crate) async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let session = AuthService::new(&state).signup(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            token: session.token,
            user: UserResponse::from(&session.user),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "Auth"
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let session = AuthService::new(&state)
        .login(&req.email, &req.password)
        .await?;
    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token: session.token,
        user: UserResponse::from(&session.user),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued", body = SendOtpResponse),
        (status = 400, description = "Missing or invalid email", body = ErrorBody),
    ),
    tag = "Auth"
)]
pub(crate) async fn send_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>> {
    let issued = AuthService::new(&state).request_otp(&req.email)?;
    Ok(Json(SendOtpResponse {
        success: true,
        message: "OTP sent successfully".to_string(),
        demo_otp: state.policies.expose_demo_otp.then_some(issued.code),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP verified", body = VerifyOtpResponse),
        (status = 400, description = "OTP not found, expired, or invalid", body = ErrorBody),
        (status = 401, description = "No account for this email", body = ErrorBody),
    ),
    tag = "Auth"
)]
pub(crate) async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let session = AuthService::new(&state)
        .verify_otp(&req.email, &req.otp)
        .await?;
    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
        token: session.token,
        user: UserResponse::from(&session.user),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>> {
    let user = AuthService::new(&state).profile(&auth.user_id).await?;
    Ok(Json(ProfileResponse {
        message: "Profile retrieved successfully".to_string(),
        user: UserResponse::from(&user),
    }))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "Auth"
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let user = AuthService::new(&state)
        .update_profile(&auth.user_id, req.into())
        .await?;
    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".to_string(),
        user: UserResponse::from(&user),
    }))
}

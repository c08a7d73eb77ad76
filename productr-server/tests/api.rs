//! HTTP-level tests against the in-memory store.
//!
//! Run with: `cargo test -p productr-server --test api`

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use productr_server::middleware::auth::validate_token;
use productr_server::services::catalog::RemovalPolicy;
use productr_server::services::mailer::LogMailer;
use productr_server::services::otp::CodePolicy;
use productr_server::services::password::PasswordHasher;
use productr_server::store::Store;
use productr_server::{build_app, AppState, Policies};

const SECRET: &str = "integration-secret";
const FIXED_OTP: &str = "424242";

fn state(policies: Policies) -> AppState {
    AppState::new(
        Store::in_memory(),
        SECRET,
        CodePolicy::Fixed(FIXED_OTP.to_string()),
        Arc::new(LogMailer),
        PasswordHasher::fast_insecure(),
        policies,
    )
}

fn app() -> Router {
    build_app(state(Policies {
        expose_demo_otp: true,
        ..Policies::default()
    }))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn signup(app: &Router, email: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": email,
            "password": "secret1",
            "firstName": "A",
            "lastName": "B"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_product(app: &Router, token: &str, body: Value) -> Value {
    let (status, body) = call(app, Method::POST, "/products", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["product"].clone()
}

fn lamp() -> Value {
    json!({
        "title": "Lamp",
        "description": "LED desk lamp",
        "price": 49.99,
        "category": "Home",
        "stock": 3
    })
}

#[tokio::test]
async fn signup_then_login() {
    let app = app();
    let (token, user_id) = signup(&app, "a@x.com").await;
    assert_eq!(validate_token(&token, SECRET).unwrap().sub, user_id);

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Invalid credentials" }));

    let (status, unknown) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, body);

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    assert_eq!(validate_token(token, SECRET).unwrap().sub, user_id);
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn signup_rejects_duplicates_and_bad_input() {
    let app = app();
    signup(&app, "a@x.com").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": "A@X.com",
            "password": "secret1",
            "firstName": "A",
            "lastName": "B"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "email": "c@x.com",
            "password": "12345",
            "firstName": "A",
            "lastName": "B"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide email and password");
}

#[tokio::test]
async fn malformed_json_gets_message_body() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn otp_flow() {
    let app = app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/verify-otp",
        None,
        Some(json!({ "email": "c@x.com", "otp": FIXED_OTP })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "OTP not found or expired. Please request a new OTP."
    );

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/send-otp",
        None,
        Some(json!({ "email": "b@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["demo_otp"], FIXED_OTP);

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/verify-otp",
        None,
        Some(json!({ "email": "b@x.com", "otp": "000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid OTP. Please try again.");

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/verify-otp",
        None,
        Some(json!({ "email": "b@x.com", "otp": FIXED_OTP })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["email"], "b@x.com");

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/verify-otp",
        None,
        Some(json!({ "email": "b@x.com", "otp": FIXED_OTP })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::GET, "/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "b@x.com");
}

#[tokio::test]
async fn demo_otp_is_hidden_when_not_exposed() {
    let app = build_app(state(Policies::default()));
    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/send-otp",
        None,
        Some(json!({ "email": "b@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("demo_otp").is_none());

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/send-otp",
        None,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is required");
}

#[tokio::test]
async fn profile_requires_valid_token() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = call(&app, Method::GET, "/auth/profile", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = signup(&app, "a@x.com").await;
    let (status, body) = call(
        &app,
        Method::PUT,
        "/auth/profile",
        Some(&token),
        Some(json!({ "lastName": "Smith" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["firstName"], "A");
    assert_eq!(body["user"]["lastName"], "Smith");
}

#[tokio::test]
async fn created_product_reads_back_with_defaults() {
    let app = app();
    let (token, user_id) = signup(&app, "s@x.com").await;

    let created = create_product(&app, &token, lamp()).await;
    assert_eq!(created["mrp"], 49.99);
    assert_eq!(created["brand"], "Not specified");
    assert_eq!(created["published"], true);
    assert_eq!(created["seller"], user_id.as_str());

    let id = created["id"].as_str().unwrap();
    let (status, body) = call(&app, Method::GET, &format!("/products/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["title"], "Lamp");
    assert_eq!(body["product"]["mrp"], 49.99);
    assert_eq!(body["product"]["sellerDetails"]["firstName"], "A");
    assert!(body["product"]["sellerDetails"].get("email").is_none());
}

#[tokio::test]
async fn create_product_validation() {
    let app = app();
    let (token, _) = signup(&app, "s@x.com").await;

    let (status, _) = call(&app, Method::POST, "/products", None, Some(lamp())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut bad = lamp();
    bad["category"] = json!("Garden");
    let (status, _) = call(&app, Method::POST, "/products", Some(&token), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad = lamp();
    bad["price"] = json!(-1);
    let (status, _) = call(&app, Method::POST, "/products", Some(&token), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, "/products", None, None).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn listing_paginates_and_filters() {
    let app = app();
    let (token, _) = signup(&app, "s@x.com").await;
    for i in 0..12 {
        create_product(
            &app,
            &token,
            json!({
                "title": format!("Novel {i}"),
                "description": "A paperback",
                "price": 10,
                "category": "Books",
                "stock": 1
            }),
        )
        .await;
    }
    create_product(&app, &token, lamp()).await;

    let (status, body) = call(
        &app,
        Method::GET,
        "/products?category=Books&page=2&limit=10",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["pagination"],
        json!({ "total": 12, "page": 2, "limit": 10, "pages": 2 })
    );

    let (_, first) = call(&app, Method::GET, "/products?category=Books", None, None).await;
    let (_, second) = call(
        &app,
        Method::GET,
        "/products?category=Books&page=2",
        None,
        None,
    )
    .await;
    let ids = |v: &Value| -> Vec<String> {
        v["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect()
    };
    let first_ids = ids(&first);
    assert!(ids(&second).iter().all(|id| !first_ids.contains(id)));

    let (_, body) = call(&app, Method::GET, "/products?search=led%20DESK", None, None).await;
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
    assert_eq!(body["products"][0]["title"], "Lamp");
}

#[tokio::test]
async fn only_owner_can_modify() {
    let app = app();
    let (owner, _) = signup(&app, "s@x.com").await;
    let (other, _) = signup(&app, "o@x.com").await;
    let product = create_product(&app, &owner, lamp()).await;
    let uri = format!("/products/{}", product["id"].as_str().unwrap());

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&other),
        Some(json!({ "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to update this product");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::DELETE, "/products/9999", Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&owner),
        Some(json!({ "published": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["published"], false);
    assert_eq!(body["product"]["title"], "Lamp");

    let (status, body) = call(&app, Method::GET, "/products/my-products", Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Product not found");
}

#[tokio::test]
async fn non_owner_update_is_forbidden_whatever_the_body() {
    let app = app();
    let (owner, _) = signup(&app, "s@x.com").await;
    let (other, _) = signup(&app, "o@x.com").await;
    let product = create_product(&app, &owner, lamp()).await;
    let uri = format!("/products/{}", product["id"].as_str().unwrap());

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&other),
        Some(json!({ "price": "free" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to update this product");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/products/9999",
        Some(&other),
        Some(json!({ "price": "free" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&owner),
        Some(json!({ "price": "free" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn listing_tolerates_bad_paging_values() {
    let app = app();
    let (token, _) = signup(&app, "s@x.com").await;
    create_product(&app, &token, lamp()).await;

    let (status, body) = call(&app, Method::GET, "/products?page=abc&limit=-1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["pagination"],
        json!({ "total": 1, "page": 1, "limit": 10, "pages": 1 })
    );
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn soft_removal_keeps_product_hidden() {
    let app = build_app(state(Policies {
        removal: RemovalPolicy::Soft,
        ..Policies::default()
    }));
    let (owner, _) = signup(&app, "s@x.com").await;
    let product = create_product(&app, &owner, lamp()).await;
    let uri = format!("/products/{}", product["id"].as_str().unwrap());

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = call(&app, Method::GET, "/products", None, None).await;
    assert_eq!(body["pagination"]["total"], 0);
    let (_, body) = call(&app, Method::GET, "/products/my-products", Some(&owner), None).await;
    assert!(body["products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_mode() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "mode": "demo" }));
}

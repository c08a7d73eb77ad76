pub mod auth;
pub mod health;
pub mod products;

use axum::Router;
use crate::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .merge(health::router())
        .with_state(state)
}

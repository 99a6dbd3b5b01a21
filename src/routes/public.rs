use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints any client may call without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/signup, POST /auth/register
        // Same handler under both names.
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/register", post(handlers::signup))
        // POST /auth/login
        // Exchanges username and password for a one-hour bearer token.
        .route("/auth/login", post(handlers::login))
}

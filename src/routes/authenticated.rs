use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid token, whatever the role. `create_router` wraps this
/// router in the `Access::Authenticated` guard.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        // The identity decoded from the caller's token.
        .route("/auth/me", get(handlers::me))
}

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderName, StatusCode},
    middleware,
    response::{IntoResponse, Response},
};
use std::{any::Any, sync::Arc};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod resources;
pub mod schema;
pub mod validation;

// Routing segregated by access level.
pub mod routes;
use auth::{Access, AccessGuard, enforce_access};
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use memory::InMemoryRepository;
pub use repository::{CredentialStoreState, PostgresRepository, RecordStoreState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json`. The collection
/// routes are documented once under a `{resource}` placeholder.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_records, handlers::get_record, handlers::create_record,
        handlers::update_record, handlers::delete_record,
        handlers::signup, handlers::login, handlers::me
    ),
    components(
        schemas(
            models::Record, models::Identity, models::SignupRequest, models::LoginRequest,
            models::TokenResponse, models::ErrorBody,
        )
    ),
    tags(
        (name = "collection-api", description = "Movies, students and recipes collections")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Record store behind every collection.
    pub records: RecordStoreState,
    /// Login credentials.
    pub credentials: CredentialStoreState,
    pub config: AppConfig,
}

impl AppState {
    /// State backed by a fresh [`InMemoryRepository`] for both stores.
    pub fn in_memory(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        Self {
            records: repo.clone(),
            credentials: repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RecordStoreState {
    fn from_ref(app_state: &AppState) -> RecordStoreState {
        app_state.records.clone()
    }
}

impl FromRef<AppState> for CredentialStoreState {
    fn from_ref(app_state: &AppState) -> CredentialStoreState {
        app_state.credentials.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route group, attaches the access guards, and wraps the whole tree in the
/// observability, panic and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin);

    let me_guard = AccessGuard {
        access: Access::Authenticated,
        config: state.config.clone(),
    };

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(me_guard, enforce_access)),
        )
        // Collection routes carry their own per-resource guards.
        .merge(routes::resources::resource_routes(&state))
        .fallback(not_found)
        .with_state(state);

    // 3. Observability, correlation and panic boundary
    with_service_layers(base_router).layer(cors)
}

/// The request-id, trace and catch-panic stack every route runs behind.
fn with_service_layers(router: Router) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id))
            .layer(CatchPanicLayer::custom(handle_panic)),
    )
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// Converts a handler panic into the uniform 500 body.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(models::ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
        .into_response()
}

/// trace_span_logger
///
/// Span per request carrying method, uri and the `x-request-id`, so every log line of one
/// request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use collection_api::{
    ApiError, AppState, InMemoryRepository,
    auth::{self, ADMIN_ROLE},
    config::{AppConfig, Env},
    create_router,
    repository::{CredentialStoreState, PostgresRepository, RecordStoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, store selection, optional admin bootstrap, then the
/// HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "collection_api=debug,tower_http=info".into());

    // 3. Pretty logs locally, JSON for log aggregators in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Store Initialization
    let (records, credentials): (RecordStoreState, CredentialStoreState) = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = Arc::new(PostgresRepository::new(pool));
            repo.migrate()
                .await
                .expect("FATAL: Failed to create the database tables.");
            tracing::info!("Using the Postgres store.");
            (repo.clone() as RecordStoreState, repo as CredentialStoreState)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records live in memory and vanish on restart.");
            let repo = Arc::new(InMemoryRepository::new());
            (repo.clone() as RecordStoreState, repo as CredentialStoreState)
        }
    };

    let port = config.port;
    let app_state = AppState {
        records,
        credentials,
        config,
    };

    // 5. Optional admin bootstrap. An existing account under that name is left alone.
    if let Some((username, password)) = app_state.config.bootstrap_admin.clone() {
        match auth::create_account(&app_state, &username, password, ADMIN_ROLE).await {
            Ok(identity) => tracing::info!(user = %identity.username, "bootstrap admin created"),
            Err(ApiError::Conflict(_)) => tracing::info!(user = %username, "bootstrap admin already exists"),
            Err(e) => panic!("FATAL: Failed to create the bootstrap admin: {}", e),
        }
    }

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        port
    );

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}

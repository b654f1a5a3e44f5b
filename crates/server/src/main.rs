//! Civiccare server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use civiccare_api::{AppState, auth_middleware, router as api_router};
use civiccare_common::Config;
use civiccare_core::{
    AccountService, ComplaintService, LocalStorage, ScreeningGate, StorageService, UploadLimits,
};
use civiccare_db::repositories::{ComplaintRepository, UserRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Install the tracing subscriber. `CIVICCARE_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "civiccare=debug,tower_http=debug".into());
    let json = std::env::var("CIVICCARE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting civiccare server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(civiccare_db::init(&config.database).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    civiccare_db::migrate(&db).await?;
    info!("Migrations completed");

    // Image storage
    let local_storage = LocalStorage::new(config.uploads.dir.clone(), config.uploads_url());
    local_storage.ensure_dir().await?;
    let storage: StorageService = Arc::new(local_storage);

    // Screening
    let gate = ScreeningGate::from_config(&config.screening)?;
    if config.screening.enabled {
        info!(
            on_error = ?config.screening.on_error,
            screen_updates = config.screening.screen_updates,
            "Image screening enabled"
        );
    } else {
        warn!("Image screening disabled, uploads are accepted unverified");
    }

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let complaint_repo = ComplaintRepository::new(Arc::clone(&db));

    // Initialize services
    let account_service = AccountService::new(user_repo.clone());
    let complaint_service = ComplaintService::new(
        complaint_repo,
        user_repo,
        storage,
        gate,
        UploadLimits::from(&config.uploads),
    )
    .with_update_screening(config.screening.screen_updates);

    let state = AppState {
        account_service,
        complaint_service,
    };

    let body_limit = config.uploads.body_limit();

    // Build router
    let app = Router::new()
        .nest(
            "/api",
            api_router()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .nest_service(
            &config.uploads.public_path,
            ServeDir::new(&config.uploads.dir),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

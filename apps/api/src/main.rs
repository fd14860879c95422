use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_queue_cell::{BroadcastNotifier, InMemoryQueueStore, QueueBookingService, QueueSettings, QueueStore, RedisQueueStore};
use shared_config::AppConfig;
use shared_database::pool_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic queue API server");

    // Load configuration
    let config = AppConfig::from_env();
    let settings = QueueSettings::from(&config);

    // Queue state lives in Redis when configured, otherwise in this process
    let store: Arc<dyn QueueStore> = match pool_from_config(&config).await? {
        Some(pool) => {
            info!("Using Redis queue store");
            Arc::new(RedisQueueStore::new(pool, &settings))
        }
        None => {
            info!("Using in-memory queue store");
            Arc::new(InMemoryQueueStore::new(settings.scope_lock_timeout))
        }
    };

    let notifier = Arc::new(BroadcastNotifier::new());
    let service = Arc::new(QueueBookingService::new(store, notifier, settings));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

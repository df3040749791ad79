use fieldroute::api;
use fieldroute::config::Config;
use fieldroute::engine::Scheduler;
use fieldroute::middleware::{whitelist_middleware, WhitelistConfig};
use fieldroute::repositories::{EventStore, InMemoryEventStore, PgEventStore};

use axum::middleware;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldroute=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FieldRoute v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;

            sqlx::migrate!("src/db/migrations").run(&pool).await?;
            info!("Database connected");

            Arc::new(PgEventStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Arc::new(InMemoryEventStore::new())
        }
    };

    info!(
        "Transition policy: {:?}, store timeout: {:?}",
        config.scheduler.policy, config.scheduler.store_timeout
    );

    let scheduler = Scheduler::new(store, config.scheduler);
    let whitelist = WhitelistConfig::from_config(&config);

    let app = api::build_router(scheduler, config.conflict_retry)
        .layer(middleware::from_fn_with_state(whitelist, whitelist_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

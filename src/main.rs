//! Storefront Orders - service entrypoint.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::config::Config;
use storefront_orders::http::{self, AppState};
use storefront_orders::publisher::{EventPublisher, LogPublisher, NatsPublisher};
use storefront_orders::service::{CatalogService, OrderService};
use storefront_orders::store::PgStorage;
use storefront_orders::worker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => {
            let client = async_nats::connect(url.as_str()).await?;
            tokio::spawn(worker::run(client.clone(), config.events_subject.clone()));
            Arc::new(NatsPublisher::new(client))
        }
        None => {
            tracing::warn!("NATS_URL not set; order events will only be logged");
            Arc::new(LogPublisher)
        }
    };

    let store = Arc::new(PgStorage::new(db));
    let state = AppState {
        orders: Arc::new(OrderService::new(
            store.clone(),
            publisher,
            config.events_subject.clone(),
        )),
        catalog: Arc::new(CatalogService::new(store)),
    };

    let app = http::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("🚀 storefront-orders listening on 0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

//! Shoreline Commerce - multi-tenant storefront service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shoreline_commerce::api::{create_router, AppState, Endpoints};
use shoreline_commerce::config::AppConfig;
use shoreline_commerce::infra::{
    DisabledStorage, EventPublisher, NatsPublisher, NoOpEventPublisher, ObjectStorage, SupabaseStorage,
};
use shoreline_commerce::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events: Arc<dyn EventPublisher> = match config.nats_url.as_deref() {
        Some(url) => match NatsPublisher::connect(url).await {
            Ok(publisher) => {
                tracing::info!(url = %url, "publishing domain events to NATS");
                Arc::new(publisher)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "NATS unavailable, domain events disabled");
                Arc::new(NoOpEventPublisher)
            }
        },
        None => Arc::new(NoOpEventPublisher),
    };

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let storage: Arc<dyn ObjectStorage> = match config.storage.clone() {
        Some(storage) => Arc::new(SupabaseStorage::new(http.clone(), storage)),
        None => {
            tracing::warn!("SUPABASE_URL not set, media uploads disabled");
            Arc::new(DisabledStorage)
        }
    };

    let addr = config.socket_addr()?;
    let state = AppState::new(config, Arc::new(PgStore::new(db)), storage, events, http, Endpoints::default());
    let app = create_router(Arc::new(state));

    tracing::info!("Shoreline Commerce listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

//! Atelier Orders - order lifecycle service

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_orders::api;
use atelier_orders::catalog::Catalog;
use atelier_orders::config::Config;
use atelier_orders::notify::Notifier;
use atelier_orders::service::OrderService;
use atelier_orders::store::{FileStore, OrderStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(8))
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("using postgres order store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::info!(dir = %config.data_dir.display(), "using flat-file order store");
            Arc::new(FileStore::open(&config.data_dir)?)
        }
    };

    let catalog = config
        .catalog_path
        .as_ref()
        .map(|path| Catalog::new(path, config.catalog_ttl));
    let notifier = Notifier::new(config.notify.clone());
    let service = Arc::new(OrderService::new(
        store,
        catalog,
        notifier,
        config.reservation_window,
        config.default_currency.clone(),
    ));

    let app = api::router(service, config.admin_token.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "atelier-orders listening");
    axum::serve(listener, app).await?;
    Ok(())
}

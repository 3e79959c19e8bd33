//! ventwatch - ICU respiratory-support monitoring service.

use ventwatch::config::ServerConfig;
use ventwatch::db::Store;
use ventwatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("ventwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting ventwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    if cfg.seed_sectors {
        let seeded = store.seed_default_sectors()?;
        if seeded > 0 {
            tracing::info!("Created {} default sectors", seeded);
        }
    }

    // Start web server
    let server = Server::new(cfg, store);
    server.start().await?;

    Ok(())
}

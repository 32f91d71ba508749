use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use vm_catalog::db::{create_pool, run_migrations};
use vm_catalog::{Catalog, FsMediaInspector, HostProfile};
use vm_catalog_api::{create_app, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so file logs are flushed on exit
    let _log_guard = vm_logging::init_subscriber();

    info!("Starting vm-catalog-api service...");

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        db_path = ?config.db_path,
        seed_defaults = config.seed_defaults,
        "Configuration loaded"
    );

    // Create pool and run migrations
    let pool = create_pool(config.db_path.as_deref()).await?;
    info!("Running database migrations...");
    run_migrations(&pool).await?;
    info!("Migrations complete");

    let host = HostProfile::detect();
    info!(
        arch = %host.arch,
        total_memory_mib = host.total_memory_mib,
        "Host profile detected"
    );

    let catalog = Catalog::new(pool, host, Arc::new(FsMediaInspector));
    if config.seed_defaults {
        catalog.seed_defaults().await?;
    }

    // Create app
    let app = create_app(catalog);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

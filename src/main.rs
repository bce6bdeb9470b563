use anyhow::Context;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planetarium_api::{config::Config, database::Database, services::auth, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    if config.app.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Planetarium API ({})", config.app.environment);

    // Connect to the database
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    // Run migrations
    db.migrate()
        .await
        .context("Failed to run migrations")?;

    if let Some(admin) = &config.admin {
        auth::ensure_admin(&db, admin, config.jwt.bcrypt_cost)
            .await
            .context("Failed to bootstrap admin user")?;
    }

    tokio::fs::create_dir_all(&config.media.root)
        .await
        .with_context(|| format!("Failed to create media root {}", config.media.root.display()))?;

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a valid socket address")?;

    // Create the shared application state and the main router
    let app_state = AppState::new(db, config);
    let app = planetarium_api::router(app_state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

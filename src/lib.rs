pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod controllers;
pub mod middleware;
pub mod services;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use services::media::MediaStorage;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub media: MediaStorage,
}

impl AppState {
    pub fn new(db: database::Database, config: config::Config) -> Arc<Self> {
        let media = MediaStorage::new(&config.media);
        Arc::new(Self { db, config, media })
    }
}

/// Полный роутер приложения.
pub fn router(state: Arc<AppState>) -> Router {
    let media_dir = ServeDir::new(state.media.root());
    let media_prefix = media_mount_path(&state.config.media.base_url);

    let mut app = Router::new()
        .route("/", get(|| async { "Planetarium API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api/planetarium", controllers::routes())
        .nest("/api/user", controllers::user_routes());

    // MEDIA_URL может указывать на внешний CDN - тогда файлы сами не раздаём
    if let Some(prefix) = media_prefix {
        app = app.nest_service(&prefix, media_dir);
    }

    app.with_state(state.clone())
        .layer(DefaultBodyLimit::max(state.config.media.max_upload_bytes + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn media_mount_path(base_url: &str) -> Option<String> {
    if base_url.starts_with('/') && base_url.len() > 1 {
        Some(base_url.to_string())
    } else {
        None
    }
}

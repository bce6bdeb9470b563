use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{pagination::PageParams, ApiJson, ApiQuery};
use crate::{
    error::AppResult,
    middleware::{AdminUser, CatalogReader},
    models::ShowTheme,
    AppState,
};

const PAGE_SIZE: u32 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/show_themes", get(list_themes).post(create_theme))
}

// GET /api/planetarium/show_themes
async fn list_themes(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<impl IntoResponse> {
    let pagination = page.resolve(PAGE_SIZE);

    let count = ShowTheme::count(&state.db.pool).await?;
    pagination.check(count)?;
    let themes = ShowTheme::list(&state.db.pool, pagination.limit(), pagination.offset()).await?;

    Ok(Json(pagination.into_page(count, themes)))
}

// POST /api/planetarium/show_themes
#[derive(Debug, Deserialize, Validate)]
struct CreateThemeRequest {
    #[validate(length(min = 1, max = 63, message = "Name must be between 1 and 63 characters."))]
    name: String,
}

impl CreateThemeRequest {
    fn validated(mut self) -> AppResult<Self> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

async fn create_theme(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateThemeRequest>,
) -> AppResult<impl IntoResponse> {
    let req = req.validated()?;

    let theme = ShowTheme::create(&state.db.pool, &req.name).await?;
    tracing::info!("show theme {} created by user {}", theme.id, admin.user_id);

    Ok((StatusCode::CREATED, Json(theme)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn blank_name_is_rejected() {
        let result = CreateThemeRequest { name: "   ".to_string() }.validated();
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn name_is_trimmed_before_length_check() {
        let req = CreateThemeRequest { name: "  Exoplanets ".to_string() }.validated().unwrap();
        assert_eq!(req.name, "Exoplanets");

        let padded = format!("  {}  ", "a".repeat(63));
        assert!(CreateThemeRequest { name: padded }.validated().is_ok());
    }
}

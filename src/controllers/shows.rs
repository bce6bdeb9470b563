//! shows.rs
//!
//! Каталог астрономических шоу: список с фильтром по темам, карточка шоу,
//! создание и полная замена (только администратор), загрузка изображения.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use validator::Validate;

use super::{pagination::PageParams, ApiJson, ApiPath, ApiQuery};
use crate::{
    error::{AppError, AppResult},
    middleware::{AdminUser, CatalogReader},
    models::{AstronomyShow, ShowTheme},
    services::media::{MediaError, MediaStorage},
    AppState,
};

const PAGE_SIZE: u32 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/astronomy_shows", get(list_shows).post(create_show))
        .route("/astronomy_shows/{id}", get(get_show).put(update_show))
        .route("/astronomy_shows/{id}/upload-image", post(upload_image))
}

/* ---------- representations ---------- */

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub id: i64,
    pub title: String,
    pub themes: Vec<ShowTheme>,
    pub description: String,
    pub image: Option<String>,
}

impl ShowResponse {
    fn new(show: AstronomyShow, themes: Vec<ShowTheme>, media: &MediaStorage) -> Self {
        ShowResponse {
            id: show.id,
            title: show.title,
            themes,
            description: show.description,
            image: show.image.as_deref().map(|p| media.url_for(p)),
        }
    }
}

/// Ответ на создание/изменение: темы передаются списком id.
#[derive(Debug, Serialize)]
pub struct ShowWriteResponse {
    pub id: i64,
    pub title: String,
    pub themes: Vec<i64>,
    pub description: String,
}

/* ---------- list / retrieve ---------- */

#[derive(Debug, Deserialize)]
struct ShowsQuery {
    themes: Option<String>,
}

/// Разбирает список id вида `1,2,3`. Пустая строка - фильтра нет.
fn parse_id_list(raw: &str) -> AppResult<Option<Vec<i64>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.split(',')
        .map(|part| {
            part.trim().parse::<i64>().map_err(|_| {
                AppError::field("themes", format!("\"{}\" is not a valid theme id.", part.trim()))
            })
        })
        .collect::<AppResult<Vec<i64>>>()
        .map(Some)
}

// GET /api/planetarium/astronomy_shows?themes=1,2
async fn list_shows(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(query): ApiQuery<ShowsQuery>,
) -> AppResult<impl IntoResponse> {
    let theme_ids = match query.themes.as_deref() {
        Some(raw) => parse_id_list(raw)?,
        None => None,
    };
    let pagination = page.resolve(PAGE_SIZE);

    let pool = &state.db.pool;
    let count = AstronomyShow::count(pool, theme_ids.as_deref()).await?;
    pagination.check(count)?;
    let shows = AstronomyShow::list(pool, theme_ids.as_deref(), pagination.limit(), pagination.offset()).await?;

    let show_ids: Vec<i64> = shows.iter().map(|s| s.id).collect();
    let mut themes_by_show: BTreeMap<i64, Vec<ShowTheme>> = BTreeMap::new();
    for (show_id, theme) in AstronomyShow::themes_for(pool, &show_ids).await? {
        themes_by_show.entry(show_id).or_default().push(theme);
    }

    let results: Vec<ShowResponse> = shows
        .into_iter()
        .map(|show| {
            let themes = themes_by_show.remove(&show.id).unwrap_or_default();
            ShowResponse::new(show, themes, &state.media)
        })
        .collect();

    Ok(Json(pagination.into_page(count, results)))
}

// GET /api/planetarium/astronomy_shows/{id}
async fn get_show(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    let show = AstronomyShow::find(&state.db.pool, id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let themes = AstronomyShow::themes_for(&state.db.pool, &[id])
        .await?
        .into_iter()
        .map(|(_, theme)| theme)
        .collect();

    Ok(Json(ShowResponse::new(show, themes, &state.media)))
}

/* ---------- create / update ---------- */

#[derive(Debug, Deserialize, Validate)]
struct ShowPayload {
    #[validate(length(min = 1, max = 63, message = "Title must be between 1 and 63 characters."))]
    title: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    description: String,
    #[validate(length(min = 1, message = "This list may not be empty."))]
    themes: Vec<i64>,
}

impl ShowPayload {
    fn validated(mut self) -> AppResult<Self> {
        self.title = self.title.trim().to_string();
        self.validate()?;
        self.themes.sort_unstable();
        self.themes.dedup();
        Ok(self)
    }
}

async fn check_themes_exist(tx: &mut sqlx::PgConnection, ids: &[i64]) -> AppResult<()> {
    let missing = ShowTheme::missing_ids(&mut *tx, ids).await?;
    if let Some(id) = missing.first() {
        return Err(AppError::field(
            "themes",
            format!("Invalid pk \"{id}\" - object does not exist."),
        ));
    }
    Ok(())
}

// POST /api/planetarium/astronomy_shows
async fn create_show(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<ShowPayload>,
) -> AppResult<impl IntoResponse> {
    let req = req.validated()?;

    let mut tx = state.db.pool.begin().await?;
    check_themes_exist(&mut tx, &req.themes).await?;
    let show = AstronomyShow::insert(&mut *tx, &req.title, &req.description).await?;
    AstronomyShow::replace_themes(&mut tx, show.id, &req.themes).await?;
    tx.commit().await?;

    tracing::info!("astronomy show {} created with themes {:?}", show.id, req.themes);

    Ok((
        StatusCode::CREATED,
        Json(ShowWriteResponse {
            id: show.id,
            title: show.title,
            themes: req.themes,
            description: show.description,
        }),
    ))
}

// PUT /api/planetarium/astronomy_shows/{id}
async fn update_show(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ShowPayload>,
) -> AppResult<impl IntoResponse> {
    let req = req.validated()?;

    let mut tx = state.db.pool.begin().await?;
    let show = AstronomyShow::update(&mut *tx, id, &req.title, &req.description)
        .await?
        .ok_or_else(AppError::not_found)?;
    check_themes_exist(&mut tx, &req.themes).await?;
    AstronomyShow::replace_themes(&mut tx, show.id, &req.themes).await?;
    tx.commit().await?;

    Ok(Json(ShowWriteResponse {
        id: show.id,
        title: show.title,
        themes: req.themes,
        description: show.description,
    }))
}

/* ---------- image upload ---------- */

#[derive(Debug, Serialize)]
struct ImageResponse {
    id: i64,
    image: String,
}

// POST /api/planetarium/astronomy_shows/{id}/upload-image (multipart, поле "image")
async fn upload_image(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<i64>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let show = AstronomyShow::find(&state.db.pool, id)
        .await?
        .ok_or_else(AppError::not_found)?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::field("image", e.body_text()))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::field("image", e.body_text()))?;
            image = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = image.ok_or_else(|| AppError::field("image", "No file was submitted."))?;
    if bytes.len() > state.config.media.max_upload_bytes {
        return Err(AppError::field(
            "image",
            format!("File is larger than {} bytes.", state.config.media.max_upload_bytes),
        ));
    }

    let stored = state
        .media
        .save_show_image(&show.title, bytes)
        .await
        .map_err(|e| match e {
            MediaError::InvalidImage => AppError::field("image", e.to_string()),
            other => AppError::Internal(other.into()),
        })?;

    match AstronomyShow::replace_image(&state.db.pool, id, &stored).await {
        Ok(Some(previous)) => {
            if let Some(old) = previous {
                state.media.remove(&old).await;
            }
        }
        Ok(None) => {
            state.media.remove(&stored).await;
            return Err(AppError::not_found());
        }
        Err(e) => {
            state.media.remove(&stored).await;
            return Err(e.into());
        }
    }

    Ok(Json(ImageResponse {
        id,
        image: state.media.url_for(&stored),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_parses_comma_separated_ids() {
        assert_eq!(parse_id_list("1, 2,3").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(parse_id_list("").unwrap(), None);
    }

    #[test]
    fn id_list_rejects_garbage() {
        assert!(matches!(parse_id_list("1,x"), Err(AppError::Validation(_))));
    }

    #[test]
    fn payload_requires_themes() {
        let payload = ShowPayload {
            title: "Northern Lights".to_string(),
            description: "Aurora borealis".to_string(),
            themes: vec![],
        };
        assert!(payload.validated().is_err());
    }

    #[test]
    fn payload_dedups_themes() {
        let payload = ShowPayload {
            title: "  Northern Lights ".to_string(),
            description: "Aurora borealis".to_string(),
            themes: vec![3, 1, 3],
        }
        .validated()
        .unwrap();

        assert_eq!(payload.title, "Northern Lights");
        assert_eq!(payload.themes, vec![1, 3]);
    }
}

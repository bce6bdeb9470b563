use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{domes::DomeResponse, pagination::PageParams, ApiJson, ApiPath, ApiQuery};
use crate::{
    error::{AppError, AppResult},
    middleware::{AdminUser, CatalogReader},
    models::{
        session::TakenPlace, AstronomyShow, PlanetariumDome, SessionFilter, ShowSession,
        ShowSessionSummary,
    },
    services::{
        media::MediaStorage,
        reservations,
        sessions::{map_fk_violation, update_session, SessionChanges},
    },
    AppState,
};

const PAGE_SIZE: u32 = 4;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/show_sessions", get(list_sessions).post(create_session))
        .route(
            "/show_sessions/{id}",
            get(get_session)
                .put(replace_session)
                .patch(patch_session)
                .delete(delete_session),
        )
}

/// Списочное представление сеанса.
#[derive(Debug, Serialize)]
pub struct SessionListItem {
    pub id: i64,
    pub astronomy_show_title: String,
    pub astronomy_show_image: Option<String>,
    pub planetarium_dome_name: String,
    pub show_time: DateTime<Utc>,
    pub tickets_available: i64,
}

impl SessionListItem {
    pub fn new(summary: ShowSessionSummary, media: &MediaStorage) -> Self {
        SessionListItem {
            id: summary.id,
            astronomy_show_title: summary.astronomy_show_title,
            astronomy_show_image: summary.astronomy_show_image.as_deref().map(|p| media.url_for(p)),
            planetarium_dome_name: summary.planetarium_dome_name,
            show_time: summary.show_time,
            tickets_available: summary.tickets_available,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionShow {
    id: i64,
    title: String,
    themes: Vec<i64>,
    description: String,
}

#[derive(Debug, Serialize)]
struct SessionDetail {
    id: i64,
    astronomy_show: SessionShow,
    planetarium_dome: DomeResponse,
    taken_places: Vec<TakenPlace>,
    tickets_available: i64,
    show_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    id: i64,
    astronomy_show: i64,
    planetarium_dome: i64,
    show_time: DateTime<Utc>,
}

impl From<ShowSession> for SessionResponse {
    fn from(s: ShowSession) -> Self {
        SessionResponse {
            id: s.id,
            astronomy_show: s.astronomy_show_id,
            planetarium_dome: s.planetarium_dome_id,
            show_time: s.show_time,
        }
    }
}

/* ---------- list / retrieve ---------- */

#[derive(Debug, Deserialize)]
struct SessionsQuery {
    date: Option<String>,
    title: Option<String>,
}

impl SessionsQuery {
    fn into_filter(self) -> AppResult<SessionFilter> {
        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::field("date", "Date has wrong format. Use YYYY-MM-DD.")
            })?),
            None => None,
        };
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(SessionFilter { date, title })
    }
}

// GET /api/planetarium/show_sessions?date=2024-06-01&title=sun
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(query): ApiQuery<SessionsQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = query.into_filter()?;
    let pagination = page.resolve(PAGE_SIZE);

    let count = ShowSession::count(&state.db.pool, &filter).await?;
    pagination.check(count)?;
    let results: Vec<SessionListItem> =
        ShowSession::list(&state.db.pool, &filter, pagination.limit(), pagination.offset())
            .await?
            .into_iter()
            .map(|s| SessionListItem::new(s, &state.media))
            .collect();

    Ok(Json(pagination.into_page(count, results)))
}

// GET /api/planetarium/show_sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.db.pool;
    let session = ShowSession::find(pool, id)
        .await?
        .ok_or_else(AppError::not_found)?;

    let show = AstronomyShow::find(pool, session.astronomy_show_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let themes = AstronomyShow::theme_ids(pool, show.id).await?;
    let dome = PlanetariumDome::find(pool, session.planetarium_dome_id)
        .await?
        .ok_or_else(AppError::not_found)?;
    let taken_places = ShowSession::taken_places(pool, id).await?;
    let tickets_available = reservations::tickets_available(pool, id).await?;

    Ok(Json(SessionDetail {
        id: session.id,
        astronomy_show: SessionShow {
            id: show.id,
            title: show.title,
            themes,
            description: show.description,
        },
        planetarium_dome: DomeResponse::from(dome),
        taken_places,
        tickets_available,
        show_time: session.show_time,
    }))
}

/* ---------- write operations (admin) ---------- */

#[derive(Debug, Deserialize)]
struct SessionPayload {
    astronomy_show: i64,
    planetarium_dome: i64,
    show_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SessionPatch {
    astronomy_show: Option<i64>,
    planetarium_dome: Option<i64>,
    show_time: Option<DateTime<Utc>>,
}

// POST /api/planetarium/show_sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<SessionPayload>,
) -> AppResult<impl IntoResponse> {
    let session = ShowSession::create(&state.db.pool, req.astronomy_show, req.planetarium_dome, req.show_time)
        .await
        .map_err(|e| map_fk_violation(e, Some(req.astronomy_show), Some(req.planetarium_dome)))?;

    tracing::info!(
        "show session {} scheduled: show={} dome={} at {}",
        session.id, session.astronomy_show_id, session.planetarium_dome_id, session.show_time
    );

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

// PUT /api/planetarium/show_sessions/{id}
async fn replace_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<SessionPayload>,
) -> AppResult<impl IntoResponse> {
    let changes = SessionChanges {
        astronomy_show: Some(req.astronomy_show),
        planetarium_dome: Some(req.planetarium_dome),
        show_time: Some(req.show_time),
    };
    let session = update_session(&state.db.pool, id, changes).await?;
    Ok(Json(SessionResponse::from(session)))
}

// PATCH /api/planetarium/show_sessions/{id}
async fn patch_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<SessionPatch>,
) -> AppResult<impl IntoResponse> {
    let changes = SessionChanges {
        astronomy_show: req.astronomy_show,
        planetarium_dome: req.planetarium_dome,
        show_time: req.show_time,
    };
    let session = update_session(&state.db.pool, id, changes).await?;
    Ok(Json(SessionResponse::from(session)))
}

// DELETE /api/planetarium/show_sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    if !ShowSession::delete(&state.db.pool, id).await? {
        return Err(AppError::not_found());
    }
    tracing::info!("show session {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_date_and_trims_title() {
        let filter = SessionsQuery {
            date: Some("2024-06-21".to_string()),
            title: Some("  Solstice ".to_string()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2024, 6, 21));
        assert_eq!(filter.title.as_deref(), Some("Solstice"));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = SessionsQuery {
            date: Some(" ".to_string()),
            title: Some("".to_string()),
        }
        .into_filter()
        .unwrap();

        assert!(filter.date.is_none());
        assert!(filter.title.is_none());
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        let result = SessionsQuery {
            date: Some("21.06.2024".to_string()),
            title: None,
        }
        .into_filter();

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

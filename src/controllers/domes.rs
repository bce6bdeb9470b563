use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{pagination::PageParams, ApiJson, ApiQuery};
use crate::{
    error::AppResult,
    middleware::{AdminUser, CatalogReader},
    models::PlanetariumDome,
    AppState,
};

const PAGE_SIZE: u32 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/domes", get(list_domes).post(create_dome))
}

/// Купол вместе с вычисляемой вместимостью.
#[derive(Debug, Serialize)]
pub struct DomeResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

impl From<PlanetariumDome> for DomeResponse {
    fn from(dome: PlanetariumDome) -> Self {
        let capacity = dome.capacity();
        DomeResponse {
            id: dome.id,
            name: dome.name,
            rows: dome.rows,
            seats_in_row: dome.seats_in_row,
            capacity,
        }
    }
}

// GET /api/planetarium/domes
async fn list_domes(
    State(state): State<Arc<AppState>>,
    _reader: CatalogReader,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<impl IntoResponse> {
    let pagination = page.resolve(PAGE_SIZE);

    let count = PlanetariumDome::count(&state.db.pool).await?;
    pagination.check(count)?;
    let domes = PlanetariumDome::list(&state.db.pool, pagination.limit(), pagination.offset())
        .await?
        .into_iter()
        .map(DomeResponse::from)
        .collect();

    Ok(Json(pagination.into_page::<DomeResponse>(count, domes)))
}

// POST /api/planetarium/domes
#[derive(Debug, Deserialize, Validate)]
struct CreateDomeRequest {
    #[validate(length(min = 1, max = 63, message = "Name must be between 1 and 63 characters."))]
    name: String,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    rows: i32,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    seats_in_row: i32,
}

impl CreateDomeRequest {
    fn validated(mut self) -> AppResult<Self> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

async fn create_dome(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiJson(req): ApiJson<CreateDomeRequest>,
) -> AppResult<impl IntoResponse> {
    let req = req.validated()?;

    let dome = PlanetariumDome::create(&state.db.pool, &req.name, req.rows, req.seats_in_row).await?;
    tracing::info!("dome {} created: {}x{}", dome.id, dome.rows, dome.seats_in_row);

    Ok((StatusCode::CREATED, Json(DomeResponse::from(dome))))
}

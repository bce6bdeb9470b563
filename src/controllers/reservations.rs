use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use super::{pagination::PageParams, tickets::TicketListItem, ApiJson, ApiQuery};
use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{Reservation, Ticket, TicketPosition},
    services::reservations,
    AppState,
};

const PAGE_SIZE: u32 = 2;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
}

/* ---------- CREATE ---------- */

#[derive(Debug, Deserialize)]
struct CreateReservationRequest {
    tickets: Vec<TicketPosition>,
}

#[derive(Debug, Serialize)]
struct CreatedTicket {
    id: i64,
    row: i32,
    seat: i32,
    show_session: i64,
}

impl From<Ticket> for CreatedTicket {
    fn from(t: Ticket) -> Self {
        CreatedTicket {
            id: t.id,
            row: t.row,
            seat: t.seat,
            show_session: t.show_session_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateReservationResponse {
    id: i64,
    tickets: Vec<CreatedTicket>,
    created_at: DateTime<Utc>,
}

// POST /api/planetarium/reservations
async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateReservationRequest>,
) -> AppResult<impl IntoResponse> {
    let created = reservations::create_reservation(&state.db.pool, user.user_id, &req.tickets).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReservationResponse {
            id: created.reservation.id,
            tickets: created.tickets.into_iter().map(CreatedTicket::from).collect(),
            created_at: created.reservation.created_at,
        }),
    ))
}

/* ---------- LIST ---------- */

#[derive(Debug, Serialize)]
struct ReservationResponse {
    id: i64,
    tickets: Vec<TicketListItem>,
    created_at: DateTime<Utc>,
}

// GET /api/planetarium/reservations - только брони текущего пользователя
async fn list_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.db.pool;
    let pagination = page.resolve(PAGE_SIZE);

    let count = Reservation::count_for_user(pool, user.user_id).await?;
    pagination.check(count)?;
    let page_rows = Reservation::list_for_user(pool, user.user_id, pagination.limit(), pagination.offset()).await?;

    let ids: Vec<i64> = page_rows.iter().map(|r| r.id).collect();
    let tickets = Ticket::for_reservations(pool, &ids).await?;
    let items = TicketListItem::load(pool, tickets, &state.media).await?;

    let mut by_reservation: BTreeMap<i64, Vec<TicketListItem>> = BTreeMap::new();
    for (reservation_id, item) in items {
        by_reservation.entry(reservation_id).or_default().push(item);
    }

    let results: Vec<ReservationResponse> = page_rows
        .into_iter()
        .map(|r| ReservationResponse {
            id: r.id,
            tickets: by_reservation.remove(&r.id).unwrap_or_default(),
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(pagination.into_page(count, results)))
}

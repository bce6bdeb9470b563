use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};

use super::{pagination::PageParams, sessions::SessionListItem, ApiPath, ApiQuery};
use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{ShowSession, Ticket},
    services::media::MediaStorage,
    AppState,
};

const PAGE_SIZE: u32 = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}", get(get_ticket))
}

/// Билет со вложенным списочным представлением сеанса.
#[derive(Debug, Serialize)]
pub struct TicketListItem {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session: SessionListItem,
}

impl TicketListItem {
    /// Подгружает сеансы билетов. Возвращает пары (id брони, билет) в исходном порядке.
    pub async fn load(
        pool: &PgPool,
        tickets: Vec<Ticket>,
        media: &MediaStorage,
    ) -> AppResult<Vec<(i64, TicketListItem)>> {
        let mut session_ids: Vec<i64> = tickets.iter().map(|t| t.show_session_id).collect();
        session_ids.sort_unstable();
        session_ids.dedup();

        let sessions: HashMap<i64, _> = ShowSession::summaries(pool, &session_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        tickets
            .into_iter()
            .map(|t| -> AppResult<(i64, TicketListItem)> {
                let summary = sessions
                    .get(&t.show_session_id)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("session {} of ticket {} vanished", t.show_session_id, t.id))?;
                Ok((
                    t.reservation_id,
                    TicketListItem {
                        id: t.id,
                        row: t.row,
                        seat: t.seat,
                        show_session: SessionListItem::new(summary, media),
                    },
                ))
            })
            .collect()
    }
}

// GET /api/planetarium/tickets
async fn list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.db.pool;
    let pagination = page.resolve(PAGE_SIZE);

    let count = Ticket::count_for_user(pool, user.user_id).await?;
    pagination.check(count)?;
    let tickets = Ticket::list_for_user(pool, user.user_id, pagination.limit(), pagination.offset()).await?;
    let results: Vec<TicketListItem> = TicketListItem::load(pool, tickets, &state.media)
        .await?
        .into_iter()
        .map(|(_, item)| item)
        .collect();

    Ok(Json(pagination.into_page(count, results)))
}

// GET /api/planetarium/tickets/{id}
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<impl IntoResponse> {
    let ticket = Ticket::find_for_user(&state.db.pool, id, user.user_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    let item = TicketListItem::load(&state.db.pool, vec![ticket], &state.media)
        .await?
        .pop()
        .map(|(_, item)| item)
        .ok_or_else(AppError::not_found)?;

    Ok(Json(item))
}

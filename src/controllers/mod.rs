pub mod pagination;
pub mod themes;
pub mod shows;
pub mod domes;
pub mod sessions;
pub mod reservations;
pub mod tickets;
pub mod users;

use axum::{extract::FromRequest, extract::FromRequestParts, Router};
use std::sync::Arc;

use crate::{error::AppError, AppState};

/// `Json`, отклоняющий некорректное тело ответом 400 в формате `AppError`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path`: нечисловой id - это тот же 404, что и несуществующий.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `Query` с тем же форматом ошибок.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(themes::routes())
        .merge(shows::routes())
        .merge(domes::routes())
        .merge(sessions::routes())
        .merge(reservations::routes())
        .merge(tickets::routes())
}

pub fn user_routes() -> Router<Arc<AppState>> {
    users::routes()
}

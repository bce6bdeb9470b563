//! sessions.rs
//!
//! Изменение расписания сеансов.
//!
//! Перенос сеанса в другой купол допустим, только если все уже проданные
//! билеты помещаются в геометрию нового купола. Строка сеанса блокируется на
//! время проверки, а бронирование держит на ней `FOR SHARE`, так что новые
//! билеты не появятся между проверкой и обновлением.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    models::{PlanetariumDome, ShowSession},
};

/// Новые значения полей сеанса; `None` оставляет поле без изменений.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionChanges {
    pub astronomy_show: Option<i64>,
    pub planetarium_dome: Option<i64>,
    pub show_time: Option<DateTime<Utc>>,
}

fn missing_object(field: &str, id: Option<i64>) -> AppError {
    let id = id.map(|v| v.to_string()).unwrap_or_default();
    AppError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

/// Нарушение внешнего ключа превращается в ошибку валидации соответствующего поля.
pub fn map_fk_violation(error: sqlx::Error, show_id: Option<i64>, dome_id: Option<i64>) -> AppError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_foreign_key_violation() {
            return if db.constraint().unwrap_or_default().contains("planetarium_dome") {
                missing_object("planetarium_dome", dome_id)
            } else {
                missing_object("astronomy_show", show_id)
            };
        }
    }
    error.into()
}

pub async fn update_session(pool: &PgPool, id: i64, changes: SessionChanges) -> AppResult<ShowSession> {
    let mut tx = pool.begin().await?;

    let current = ShowSession::find_for_update(&mut *tx, id)
        .await?
        .ok_or_else(AppError::not_found)?;

    if let Some(dome_id) = changes.planetarium_dome.filter(|d| *d != current.planetarium_dome_id) {
        let dome = PlanetariumDome::find(&mut *tx, dome_id)
            .await?
            .ok_or_else(|| missing_object("planetarium_dome", Some(dome_id)))?;

        let stranded = ShowSession::tickets_outside(&mut *tx, id, dome.geometry()).await?;
        if stranded > 0 {
            warn!(
                "refused to move session {} to dome {} ({}x{}): {} ticket(s) would not fit",
                id, dome.id, dome.rows, dome.seats_in_row, stranded
            );
            return Err(AppError::field(
                "planetarium_dome",
                format!(
                    "{stranded} sold ticket(s) do not fit into dome \"{}\" ({} rows, {} seats in row).",
                    dome.name, dome.rows, dome.seats_in_row
                ),
            ));
        }
    }

    let session = ShowSession::update(
        &mut *tx,
        id,
        changes.astronomy_show,
        changes.planetarium_dome,
        changes.show_time,
    )
    .await
    .map_err(|e| map_fk_violation(e, changes.astronomy_show, changes.planetarium_dome))?
    .ok_or_else(AppError::not_found)?;

    tx.commit().await?;

    if session.planetarium_dome_id != current.planetarium_dome_id {
        info!(
            "show session {} moved from dome {} to dome {}",
            id, current.planetarium_dome_id, session.planetarium_dome_id
        );
    }
    Ok(session)
}

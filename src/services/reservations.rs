//! reservations.rs
//!
//! Бронирование мест на сеансы.
//!
//! Бронь и все её билеты создаются одной транзакцией: либо фиксируются все
//! билеты, либо ни один. Проверка границ ряда/места выполняется по геометрии
//! купола сеанса, а повторная продажа того же места отсекается уникальным
//! ограничением `tickets_show_session_row_seat_key` на стороне PostgreSQL.
//! Конкурентные попытки занять одно место разрешает сама база.

use sqlx::PgPool;
use std::collections::{hash_map::Entry, HashMap, HashSet};
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{DomeGeometry, Reservation, ShowSession, Ticket, TicketPosition},
};

const SEAT_UNIQUE_CONSTRAINT: &str = "tickets_show_session_row_seat_key";

/// Созданная бронь вместе с билетами.
#[derive(Debug, Clone)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub tickets: Vec<Ticket>,
}

/// Проверки запроса, не требующие базы: список не пуст и места в нём не повторяются.
pub fn check_request(tickets: &[TicketPosition]) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if tickets.is_empty() {
        errors.add("tickets", "At least one ticket is required.");
    }

    let mut seen = HashSet::with_capacity(tickets.len());
    for (i, ticket) in tickets.iter().enumerate() {
        if !seen.insert(ticket) {
            errors.add(
                format!("tickets[{i}]"),
                format!(
                    "Seat (row {}, seat {}) for show session {} is requested more than once.",
                    ticket.row, ticket.seat, ticket.show_session
                ),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Создаёт бронь пользователя со всеми запрошенными билетами.
pub async fn create_reservation(
    pool: &PgPool,
    user_id: i64,
    tickets: &[TicketPosition],
) -> AppResult<CreatedReservation> {
    check_request(tickets).map_err(AppError::Validation)?;

    let mut tx = pool.begin().await?;

    // Геометрия купола для каждого сеанса из запроса
    let mut geometries: HashMap<i64, Option<DomeGeometry>> = HashMap::new();
    let mut errors = FieldErrors::new();
    for (i, ticket) in tickets.iter().enumerate() {
        let geometry = match geometries.entry(ticket.show_session) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => *e.insert(ShowSession::geometry(&mut *tx, ticket.show_session).await?),
        };

        match geometry {
            None => errors.add(
                format!("tickets[{i}].show_session"),
                format!("Invalid pk \"{}\" - object does not exist.", ticket.show_session),
            ),
            Some(dome) => {
                if let Err(e) = Ticket::validate_position(ticket.row, ticket.seat, dome) {
                    errors.merge_prefixed(&format!("tickets[{i}]"), e);
                }
            }
        }
    }
    // Ошибки валидации: транзакция откатывается при drop
    errors.into_result()?;

    let reservation = Reservation::insert(&mut *tx, user_id).await.map_err(|e| {
        if is_missing_user(&e) {
            warn!("reservation refused: user {} no longer exists", user_id);
            AppError::Unauthorized
        } else {
            e.into()
        }
    })?;

    // Вставка в едином порядке (сеанс, ряд, место): встречные брони одних и
    // тех же мест ждут друг друга на уникальном индексе, а не взаимоблокируются
    let mut slots: Vec<Option<Ticket>> = vec![None; tickets.len()];
    for i in insertion_order(tickets) {
        let ticket = &tickets[i];
        match Ticket::insert(&mut *tx, ticket, reservation.id).await {
            Ok(t) => slots[i] = Some(t),
            Err(e) if is_seat_taken(&e) => {
                warn!(
                    "seat conflict: session={} row={} seat={} user={}",
                    ticket.show_session, ticket.row, ticket.seat, user_id
                );
                return Err(AppError::field(
                    format!("tickets[{i}]"),
                    format!(
                        "Seat (row {}, seat {}) is already taken for show session {}.",
                        ticket.row, ticket.seat, ticket.show_session
                    ),
                ));
            }
            Err(e) if is_lock_conflict(&e) => {
                warn!("booking for user {} lost a lock conflict: {}", user_id, e);
                return Err(AppError::field(
                    format!("tickets[{i}]"),
                    "Some of the requested seats were taken by a concurrent reservation.",
                ));
            }
            Err(e) if is_missing_session(&e) => {
                return Err(AppError::field(
                    format!("tickets[{i}].show_session"),
                    format!("Invalid pk \"{}\" - object does not exist.", ticket.show_session),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
    let created: Vec<Ticket> = slots.into_iter().flatten().collect();

    tx.commit().await?;

    info!(
        "reservation {} created for user {} with {} ticket(s)",
        reservation.id,
        user_id,
        created.len()
    );

    Ok(CreatedReservation {
        reservation,
        tickets: created,
    })
}

/// Количество свободных мест в сеансе: вместимость купола минус проданные билеты.
pub async fn tickets_available(pool: &PgPool, session_id: i64) -> AppResult<i64> {
    ShowSession::tickets_available(pool, session_id)
        .await?
        .ok_or_else(AppError::not_found)
}

fn is_seat_taken(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(SEAT_UNIQUE_CONSTRAINT)
        }
        _ => false,
    }
}

/// Индексы билетов в порядке вставки: по (сеанс, ряд, место).
fn insertion_order(tickets: &[TicketPosition]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..tickets.len()).collect();
    order.sort_by_key(|&i| (tickets[i].show_session, tickets[i].row, tickets[i].seat));
    order
}

// deadlock_detected / serialization_failure
fn is_lock_conflict(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40P01" | "40001")),
        _ => false,
    }
}

// Пользователя удалили, а его токен ещё действует
fn is_missing_user(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_foreign_key_violation(),
        _ => false,
    }
}

// Сеанс удалили между проверкой и вставкой билета
fn is_missing_session(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_foreign_key_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(row: i32, seat: i32, show_session: i64) -> TicketPosition {
        TicketPosition {
            row,
            seat,
            show_session,
        }
    }

    #[test]
    fn empty_request_is_rejected() {
        let errors = check_request(&[]).unwrap_err();
        assert!(errors.get("tickets").is_some());
    }

    #[test]
    fn same_seat_twice_in_one_request_is_rejected() {
        let tickets = [position(2, 3, 1), position(2, 4, 1), position(2, 3, 1)];

        let errors = check_request(&tickets).unwrap_err();

        assert!(errors.get("tickets[0]").is_none());
        assert!(errors.get("tickets[1]").is_none());
        assert!(errors.get("tickets[2]").is_some());
    }

    #[test]
    fn same_seat_in_different_sessions_is_fine() {
        let tickets = [position(2, 3, 1), position(2, 3, 2)];
        assert!(check_request(&tickets).is_ok());
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        assert!(!is_seat_taken(&sqlx::Error::RowNotFound));
        assert!(!is_lock_conflict(&sqlx::Error::RowNotFound));
        assert!(!is_missing_session(&sqlx::Error::PoolTimedOut));
        assert!(!is_missing_user(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn insertion_order_is_independent_of_request_order() {
        let forward = [position(1, 1, 7), position(1, 2, 7), position(3, 1, 2)];
        let backward = [position(3, 1, 2), position(1, 2, 7), position(1, 1, 7)];

        let seats = |tickets: &[TicketPosition]| -> Vec<TicketPosition> {
            insertion_order(tickets).into_iter().map(|i| tickets[i]).collect()
        };

        assert_eq!(insertion_order(&forward), vec![2, 0, 1]);
        assert_eq!(insertion_order(&backward), vec![0, 2, 1]);
        assert_eq!(seats(&forward), seats(&backward));
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use super::DomeGeometry;
use crate::error::FieldErrors;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session_id: i64,
    pub reservation_id: i64,
}

/// Запрошенное место: ряд, номер места и сеанс.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TicketPosition {
    pub row: i32,
    pub seat: i32,
    pub show_session: i64,
}

impl Ticket {
    /// Проверяет, что ряд и место лежат в пределах купола.
    ///
    /// Ряд должен быть в `[1, rows]`, место - в `[1, seats_in_row]`.
    /// Сообщение об ошибке называет поле и допустимый диапазон.
    pub fn validate_position(row: i32, seat: i32, dome: DomeGeometry) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (value, field, limit_name, limit) in [
            (row, "row", "rows", dome.rows),
            (seat, "seat", "seats_in_row", dome.seats_in_row),
        ] {
            if !(1..=limit).contains(&value) {
                errors.add(
                    field,
                    format!("{field} number must be in available range: (1, {limit_name}): (1, {limit})"),
                );
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub async fn insert(
        db: impl PgExecutor<'_>,
        position: &TicketPosition,
        reservation_id: i64,
    ) -> Result<Ticket, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets ("row", seat, show_session_id, reservation_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, "row", seat, show_session_id, reservation_id
            "#
        )
        .bind(position.row)
        .bind(position.seat)
        .bind(position.show_session)
        .bind(reservation_id)
        .fetch_one(db)
        .await
    }

    pub async fn for_reservations(
        db: impl PgExecutor<'_>,
        reservation_ids: &[i64],
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, "row", seat, show_session_id, reservation_id
            FROM tickets
            WHERE reservation_id = ANY($1)
            ORDER BY reservation_id, id
            "#
        )
        .bind(reservation_ids)
        .fetch_all(db)
        .await
    }

    pub async fn count_for_user(db: impl PgExecutor<'_>, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tickets t
            JOIN reservations r ON r.id = t.reservation_id
            WHERE r.user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn list_for_user(
        db: impl PgExecutor<'_>,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT t.id, t."row", t.seat, t.show_session_id, t.reservation_id
            FROM tickets t
            JOIN reservations r ON r.id = t.reservation_id
            WHERE r.user_id = $1
            ORDER BY t.id
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn find_for_user(
        db: impl PgExecutor<'_>,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT t.id, t."row", t.seat, t.show_session_id, t.reservation_id
            FROM tickets t
            JOIN reservations r ON r.id = t.reservation_id
            WHERE t.id = $1 AND r.user_id = $2
            "#
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOME: DomeGeometry = DomeGeometry {
        rows: 10,
        seats_in_row: 20,
    };

    #[test]
    fn corners_of_the_dome_are_valid() {
        assert!(Ticket::validate_position(1, 1, DOME).is_ok());
        assert!(Ticket::validate_position(10, 20, DOME).is_ok());
    }

    #[test]
    fn row_out_of_range_names_field_and_range() {
        let errors = Ticket::validate_position(11, 5, DOME).unwrap_err();

        assert_eq!(
            errors.get("row").unwrap(),
            ["row number must be in available range: (1, rows): (1, 10)".to_string()]
        );
        assert!(errors.get("seat").is_none());
    }

    #[test]
    fn zero_seat_is_rejected() {
        let errors = Ticket::validate_position(3, 0, DOME).unwrap_err();

        assert_eq!(
            errors.get("seat").unwrap(),
            ["seat number must be in available range: (1, seats_in_row): (1, 20)".to_string()]
        );
    }

    #[test]
    fn both_fields_reported_together() {
        let errors = Ticket::validate_position(-1, 21, DOME).unwrap_err();
        assert!(errors.get("row").is_some());
        assert!(errors.get("seat").is_some());
    }
}

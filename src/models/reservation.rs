use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Reservation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

impl Reservation {
    pub async fn insert(db: impl PgExecutor<'_>, user_id: i64) -> Result<Reservation, sqlx::Error> {
        sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations (user_id) VALUES ($1) RETURNING id, created_at, user_id"
        )
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn count_for_user(db: impl PgExecutor<'_>, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
    }

    // Новые брони первыми
    pub async fn list_for_user(
        db: impl PgExecutor<'_>,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reservation>, sqlx::Error> {
        sqlx::query_as::<_, Reservation>(
            r#"
            SELECT id, created_at, user_id
            FROM reservations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }
}

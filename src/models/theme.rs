use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowTheme {
    pub id: i64,
    pub name: String,
}

impl ShowTheme {
    pub async fn count(db: impl PgExecutor<'_>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM show_themes")
            .fetch_one(db)
            .await
    }

    pub async fn list(db: impl PgExecutor<'_>, limit: i64, offset: i64) -> Result<Vec<ShowTheme>, sqlx::Error> {
        sqlx::query_as::<_, ShowTheme>(
            "SELECT id, name FROM show_themes ORDER BY id LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn create(db: impl PgExecutor<'_>, name: &str) -> Result<ShowTheme, sqlx::Error> {
        sqlx::query_as::<_, ShowTheme>(
            "INSERT INTO show_themes (name) VALUES ($1) RETURNING id, name"
        )
        .bind(name)
        .fetch_one(db)
        .await
    }

    /// Возвращает те id из списка, которых нет в таблице тем.
    pub async fn missing_ids(db: impl PgExecutor<'_>, ids: &[i64]) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT requested.id
            FROM UNNEST($1::bigint[]) AS requested(id)
            LEFT JOIN show_themes t ON t.id = requested.id
            WHERE t.id IS NULL
            ORDER BY requested.id
            "#
        )
        .bind(ids)
        .fetch_all(db)
        .await
    }
}

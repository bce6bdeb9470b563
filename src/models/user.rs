use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "id, email, password_hash, is_staff, is_active, date_joined, last_login";

impl User {
    // Найти пользователя по email
    pub async fn find_by_email(email: &str, db: impl PgExecutor<'_>) -> Result<Option<User>, sqlx::Error> {
        let q = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, User>(&q)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(id: i64, db: impl PgExecutor<'_>) -> Result<Option<User>, sqlx::Error> {
        let q = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&q)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn create(
        email: &str,
        password_hash: &str,
        is_staff: bool,
        db: impl PgExecutor<'_>,
    ) -> Result<User, sqlx::Error> {
        let q = format!(
            "INSERT INTO users (email, password_hash, is_staff) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&q)
            .bind(email)
            .bind(password_hash)
            .bind(is_staff)
            .fetch_one(db)
            .await
    }

    pub async fn touch_last_login(id: i64, db: impl PgExecutor<'_>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

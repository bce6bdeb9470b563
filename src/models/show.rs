use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use super::ShowTheme;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AstronomyShow {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Путь к изображению относительно корня медиа-хранилища.
    pub image: Option<String>,
}

// Строка связи шоу с темой
#[derive(Debug, FromRow)]
struct ThemeLink {
    astronomy_show_id: i64,
    id: i64,
    name: String,
}

impl AstronomyShow {
    // Фильтр по темам: шоу попадает в выборку, если у него есть хотя бы одна из тем.
    // Каждое шоу возвращается один раз.
    pub async fn count(db: impl PgExecutor<'_>, theme_ids: Option<&[i64]>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM astronomy_shows s
            WHERE $1::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM astronomy_show_themes ast
                WHERE ast.astronomy_show_id = s.id AND ast.show_theme_id = ANY($1)
            )
            "#
        )
        .bind(theme_ids)
        .fetch_one(db)
        .await
    }

    pub async fn list(
        db: impl PgExecutor<'_>,
        theme_ids: Option<&[i64]>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AstronomyShow>, sqlx::Error> {
        sqlx::query_as::<_, AstronomyShow>(
            r#"
            SELECT s.id, s.title, s.description, s.image
            FROM astronomy_shows s
            WHERE $1::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM astronomy_show_themes ast
                WHERE ast.astronomy_show_id = s.id AND ast.show_theme_id = ANY($1)
            )
            ORDER BY s.id
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(theme_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn find(db: impl PgExecutor<'_>, id: i64) -> Result<Option<AstronomyShow>, sqlx::Error> {
        sqlx::query_as::<_, AstronomyShow>(
            "SELECT id, title, description, image FROM astronomy_shows WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Темы для набора шоу: пары (id шоу, тема), упорядоченные по id темы.
    pub async fn themes_for(
        db: impl PgExecutor<'_>,
        show_ids: &[i64],
    ) -> Result<Vec<(i64, ShowTheme)>, sqlx::Error> {
        let links = sqlx::query_as::<_, ThemeLink>(
            r#"
            SELECT ast.astronomy_show_id, t.id, t.name
            FROM astronomy_show_themes ast
            JOIN show_themes t ON t.id = ast.show_theme_id
            WHERE ast.astronomy_show_id = ANY($1)
            ORDER BY ast.astronomy_show_id, t.id
            "#
        )
        .bind(show_ids)
        .fetch_all(db)
        .await?;

        Ok(links
            .into_iter()
            .map(|l| (l.astronomy_show_id, ShowTheme { id: l.id, name: l.name }))
            .collect())
    }

    pub async fn theme_ids(db: impl PgExecutor<'_>, show_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT show_theme_id FROM astronomy_show_themes WHERE astronomy_show_id = $1 ORDER BY show_theme_id"
        )
        .bind(show_id)
        .fetch_all(db)
        .await
    }

    pub async fn insert(
        db: impl PgExecutor<'_>,
        title: &str,
        description: &str,
    ) -> Result<AstronomyShow, sqlx::Error> {
        sqlx::query_as::<_, AstronomyShow>(
            r#"
            INSERT INTO astronomy_shows (title, description)
            VALUES ($1, $2)
            RETURNING id, title, description, image
            "#
        )
        .bind(title)
        .bind(description)
        .fetch_one(db)
        .await
    }

    pub async fn update(
        db: impl PgExecutor<'_>,
        id: i64,
        title: &str,
        description: &str,
    ) -> Result<Option<AstronomyShow>, sqlx::Error> {
        sqlx::query_as::<_, AstronomyShow>(
            r#"
            UPDATE astronomy_shows SET title = $2, description = $3
            WHERE id = $1
            RETURNING id, title, description, image
            "#
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_optional(db)
        .await
    }

    /// Полностью заменяет набор тем шоу. Вызывать внутри транзакции.
    pub async fn replace_themes(
        tx: &mut sqlx::PgConnection,
        show_id: i64,
        theme_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM astronomy_show_themes WHERE astronomy_show_id = $1")
            .bind(show_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO astronomy_show_themes (astronomy_show_id, show_theme_id)
            SELECT $1, theme_id FROM UNNEST($2::bigint[]) AS t(theme_id)
            ON CONFLICT DO NOTHING
            "#
        )
        .bind(show_id)
        .bind(theme_ids)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    /// Сохраняет новый путь к изображению и возвращает предыдущий.
    /// `None` - шоу не найдено.
    pub async fn replace_image(
        db: impl PgExecutor<'_>,
        id: i64,
        image: &str,
    ) -> Result<Option<Option<String>>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE astronomy_shows s SET image = $2
            FROM (SELECT id, image FROM astronomy_shows WHERE id = $1 FOR UPDATE) prev
            WHERE s.id = prev.id
            RETURNING prev.image
            "#
        )
        .bind(id)
        .bind(image)
        .fetch_optional(db)
        .await
    }
}

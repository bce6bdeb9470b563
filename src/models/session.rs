use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

use super::DomeGeometry;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowSession {
    pub id: i64,
    pub astronomy_show_id: i64,
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}

/// Сеанс в списочном представлении, вместе с количеством свободных мест.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShowSessionSummary {
    pub id: i64,
    pub astronomy_show_title: String,
    pub astronomy_show_image: Option<String>,
    pub planetarium_dome_name: String,
    pub show_time: DateTime<Utc>,
    pub tickets_available: i64,
}

/// Занятое место в сеансе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct TakenPlace {
    pub row: i32,
    pub seat: i32,
}

/// Фильтры списка сеансов.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
}

impl SessionFilter {
    // Шаблон для ILIKE: спецсимволы из пользовательского ввода экранируются
    fn title_pattern(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(|t| format!("%{}%", escape_like(t)))
    }
}

/// Экранирует `\`, `%` и `_`, чтобы LIKE сравнивал их буквально.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// tickets_available = вместимость купола - количество проданных билетов
const SUMMARY_SELECT: &str = r#"
    SELECT
        ss.id,
        s.title AS astronomy_show_title,
        s.image AS astronomy_show_image,
        d.name AS planetarium_dome_name,
        ss.show_time,
        (d.rows::int8 * d.seats_in_row::int8
            - (SELECT COUNT(*) FROM tickets t WHERE t.show_session_id = ss.id)) AS tickets_available
    FROM show_sessions ss
    JOIN astronomy_shows s ON s.id = ss.astronomy_show_id
    JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
"#;

const FILTER_WHERE: &str = r#"
    WHERE ($1::date IS NULL OR (ss.show_time AT TIME ZONE 'UTC')::date = $1)
      AND ($2::text IS NULL OR s.title ILIKE $2)
"#;

impl ShowSession {
    pub async fn count(db: impl PgExecutor<'_>, filter: &SessionFilter) -> Result<i64, sqlx::Error> {
        let q = format!(
            r#"
            SELECT COUNT(*)
            FROM show_sessions ss
            JOIN astronomy_shows s ON s.id = ss.astronomy_show_id
            {FILTER_WHERE}
            "#
        );
        sqlx::query_scalar(&q)
            .bind(filter.date)
            .bind(filter.title_pattern())
            .fetch_one(db)
            .await
    }

    pub async fn list(
        db: impl PgExecutor<'_>,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ShowSessionSummary>, sqlx::Error> {
        let q = format!("{SUMMARY_SELECT} {FILTER_WHERE} ORDER BY ss.show_time, ss.id LIMIT $3 OFFSET $4");
        sqlx::query_as::<_, ShowSessionSummary>(&q)
            .bind(filter.date)
            .bind(filter.title_pattern())
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    /// Списочные представления для набора сеансов (для вложения в билеты).
    pub async fn summaries(
        db: impl PgExecutor<'_>,
        ids: &[i64],
    ) -> Result<Vec<ShowSessionSummary>, sqlx::Error> {
        let q = format!("{SUMMARY_SELECT} WHERE ss.id = ANY($1)");
        sqlx::query_as::<_, ShowSessionSummary>(&q)
            .bind(ids)
            .fetch_all(db)
            .await
    }

    pub async fn find(db: impl PgExecutor<'_>, id: i64) -> Result<Option<ShowSession>, sqlx::Error> {
        sqlx::query_as::<_, ShowSession>(
            "SELECT id, astronomy_show_id, planetarium_dome_id, show_time FROM show_sessions WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Геометрия купола, в котором проходит сеанс.
    ///
    /// Строка сеанса блокируется `FOR SHARE` до конца транзакции: перенос
    /// сеанса в другой купол ждёт, пока бронь не зафиксируется.
    pub async fn geometry(db: impl PgExecutor<'_>, id: i64) -> Result<Option<DomeGeometry>, sqlx::Error> {
        sqlx::query_as::<_, DomeGeometry>(
            r#"
            SELECT d.rows, d.seats_in_row
            FROM show_sessions ss
            JOIN planetarium_domes d ON d.id = ss.planetarium_dome_id
            WHERE ss.id = $1
            FOR SHARE OF ss
            "#
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn tickets_available(db: impl PgExecutor<'_>, id: i64) -> Result<Option<i64>, sqlx::Error> {
        let q = format!("{SUMMARY_SELECT} WHERE ss.id = $1");
        let summary = sqlx::query_as::<_, ShowSessionSummary>(&q)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(summary.map(|s| s.tickets_available))
    }

    pub async fn taken_places(db: impl PgExecutor<'_>, id: i64) -> Result<Vec<TakenPlace>, sqlx::Error> {
        sqlx::query_as::<_, TakenPlace>(
            r#"SELECT "row", seat FROM tickets WHERE show_session_id = $1 ORDER BY "row", seat"#
        )
        .bind(id)
        .fetch_all(db)
        .await
    }

    pub async fn create(
        db: impl PgExecutor<'_>,
        astronomy_show_id: i64,
        planetarium_dome_id: i64,
        show_time: DateTime<Utc>,
    ) -> Result<ShowSession, sqlx::Error> {
        sqlx::query_as::<_, ShowSession>(
            r#"
            INSERT INTO show_sessions (astronomy_show_id, planetarium_dome_id, show_time)
            VALUES ($1, $2, $3)
            RETURNING id, astronomy_show_id, planetarium_dome_id, show_time
            "#
        )
        .bind(astronomy_show_id)
        .bind(planetarium_dome_id)
        .bind(show_time)
        .fetch_one(db)
        .await
    }

    /// Сеанс с блокировкой строки до конца транзакции.
    pub async fn find_for_update(db: impl PgExecutor<'_>, id: i64) -> Result<Option<ShowSession>, sqlx::Error> {
        sqlx::query_as::<_, ShowSession>(
            r#"
            SELECT id, astronomy_show_id, planetarium_dome_id, show_time
            FROM show_sessions
            WHERE id = $1
            FOR UPDATE
            "#
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Сколько проданных билетов сеанса не поместятся в купол с такой геометрией.
    pub async fn tickets_outside(
        db: impl PgExecutor<'_>,
        id: i64,
        dome: DomeGeometry,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tickets
            WHERE show_session_id = $1 AND ("row" > $2 OR seat > $3)
            "#
        )
        .bind(id)
        .bind(dome.rows)
        .bind(dome.seats_in_row)
        .fetch_one(db)
        .await
    }

    /// Обновляет сеанс; поля со значением `None` остаются прежними.
    pub async fn update(
        db: impl PgExecutor<'_>,
        id: i64,
        astronomy_show_id: Option<i64>,
        planetarium_dome_id: Option<i64>,
        show_time: Option<DateTime<Utc>>,
    ) -> Result<Option<ShowSession>, sqlx::Error> {
        sqlx::query_as::<_, ShowSession>(
            r#"
            UPDATE show_sessions SET
                astronomy_show_id = COALESCE($2, astronomy_show_id),
                planetarium_dome_id = COALESCE($3, planetarium_dome_id),
                show_time = COALESCE($4, show_time)
            WHERE id = $1
            RETURNING id, astronomy_show_id, planetarium_dome_id, show_time
            "#
        )
        .bind(id)
        .bind(astronomy_show_id)
        .bind(planetarium_dome_id)
        .bind(show_time)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: impl PgExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM show_sessions WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralises_wildcards() {
        assert_eq!(escape_like("100%_moon\\"), "100\\%\\_moon\\\\");
        assert_eq!(escape_like("Sun"), "Sun");
    }

    #[test]
    fn title_pattern_wraps_in_percent() {
        let filter = SessionFilter {
            date: None,
            title: Some("dark_sky".to_string()),
        };
        assert_eq!(filter.title_pattern().as_deref(), Some("%dark\\_sky%"));
        assert!(SessionFilter::default().title_pattern().is_none());
    }
}

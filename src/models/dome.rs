use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PlanetariumDome {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

/// Геометрия зала: количество рядов и мест в ряду.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct DomeGeometry {
    pub rows: i32,
    pub seats_in_row: i32,
}

impl DomeGeometry {
    pub fn capacity(&self) -> i64 {
        i64::from(self.rows) * i64::from(self.seats_in_row)
    }
}

impl PlanetariumDome {
    pub fn geometry(&self) -> DomeGeometry {
        DomeGeometry {
            rows: self.rows,
            seats_in_row: self.seats_in_row,
        }
    }

    pub fn capacity(&self) -> i64 {
        self.geometry().capacity()
    }

    pub async fn count(db: impl PgExecutor<'_>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM planetarium_domes")
            .fetch_one(db)
            .await
    }

    pub async fn list(db: impl PgExecutor<'_>, limit: i64, offset: i64) -> Result<Vec<PlanetariumDome>, sqlx::Error> {
        sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes ORDER BY id LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn find(db: impl PgExecutor<'_>, id: i64) -> Result<Option<PlanetariumDome>, sqlx::Error> {
        sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: impl PgExecutor<'_>,
        name: &str,
        rows: i32,
        seats_in_row: i32,
    ) -> Result<PlanetariumDome, sqlx::Error> {
        sqlx::query_as::<_, PlanetariumDome>(
            r#"
            INSERT INTO planetarium_domes (name, rows, seats_in_row)
            VALUES ($1, $2, $3)
            RETURNING id, name, rows, seats_in_row
            "#
        )
        .bind(name)
        .bind(rows)
        .bind(seats_in_row)
        .fetch_one(db)
        .await
    }
}

use sqlx::{
    migrate::{MigrateError, Migrator},
    postgres::PgPoolOptions,
    PgPool,
};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Миграции схемы, встроенные в бинарник.
pub static MIGRATOR: Migrator = sqlx::migrate!("./src/migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Пул соединений с PostgreSQL.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config).connect(&config.url).await?;
        info!(pool_size = config.pool_size, "database pool ready");
        Ok(Database { pool })
    }

    /// Пул без соединений: первое подключение произойдёт при первом запросе.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config).connect_lazy(&config.url)?;
        Ok(Database { pool })
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        info!(known = MIGRATOR.iter().count(), "applying schema migrations");
        MIGRATOR.run(&self.pool).await?;
        info!("schema is up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_embedded_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn lazy_pool_respects_configured_size() {
        let config = DatabaseConfig {
            url: "postgres://planetarium@127.0.0.1:1/planetarium".to_string(),
            pool_size: 3,
        };
        let db = Database::connect_lazy(&config).unwrap();

        assert_eq!(db.pool.options().get_max_connections(), 3);
        assert_eq!(db.pool.size(), 0);
    }
}

use serde::Deserialize;
use std::{env, path::PathBuf, str::FromStr};
use thiserror::Error;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
    pub admin: Option<AdminConfig>,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_json: bool,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки JWT и хеширования паролей
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

// Хранилище загруженных изображений
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub base_url: String,
    pub max_upload_bytes: usize,
}

/// Учетная запись администратора, создаваемая при старте, если её ещё нет.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub allow_anonymous_read: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Собирает конфигурацию из произвольного источника переменных.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let admin = match (vars.get("ADMIN_EMAIL"), vars.get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminConfig { email, password }),
            _ => None,
        };

        Ok(Config {
            app: AppConfig {
                host: vars.or("HOST", "0.0.0.0"),
                port: vars.parse_or("PORT", 8000)?,
                environment: vars.or("ENVIRONMENT", "development"),
                rust_log: vars.or("RUST_LOG", "planetarium_api=debug,tower_http=debug"),
                log_json: match vars.or("LOG_FORMAT", "text").as_str() {
                    "text" => false,
                    "json" => true,
                    other => {
                        return Err(ConfigError::Invalid {
                            key: "LOG_FORMAT",
                            value: other.to_string(),
                        })
                    }
                },
            },
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                pool_size: vars.parse_or("DB_POOL_SIZE", 20)?,
            },
            jwt: JwtConfig {
                secret: vars.required("JWT_SECRET")?,
                expires_in_hours: vars.parse_or("JWT_EXPIRES_IN_HOURS", 24)?,
                bcrypt_cost: vars.parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            media: MediaConfig {
                root: PathBuf::from(vars.or("MEDIA_ROOT", "./media")),
                base_url: vars.or("MEDIA_URL", "/media").trim_end_matches('/').to_string(),
                max_upload_bytes: vars.parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            },
            admin,
            features: FeatureFlags {
                allow_anonymous_read: vars.parse_or("ALLOW_ANONYMOUS_READ", false)?,
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/planetarium"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.app.port, 8000);
        assert_eq!(config.database.pool_size, 20);
        assert_eq!(config.jwt.expires_in_hours, 24);
        assert_eq!(config.media.base_url, "/media");
        assert!(!config.app.log_json);
        assert!(!config.features.allow_anonymous_read);
        assert!(config.admin.is_none());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = load(&[("JWT_SECRET", "secret")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_port_is_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));

        let err = load(&pairs).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn admin_requires_both_email_and_password() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ADMIN_EMAIL", "admin@planetarium.test"));
        assert!(load(&pairs).unwrap().admin.is_none());

        pairs.push(("ADMIN_PASSWORD", "starlight"));
        let admin = load(&pairs).unwrap().admin.unwrap();
        assert_eq!(admin.email, "admin@planetarium.test");
    }

    #[test]
    fn media_url_trailing_slash_is_trimmed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MEDIA_URL", "https://cdn.example.com/media/"));
        pairs.push(("LOG_FORMAT", "json"));

        let config = load(&pairs).unwrap();
        assert_eq!(config.media.base_url, "https://cdn.example.com/media");
        assert!(config.app.log_json);
    }
}
